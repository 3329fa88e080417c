//! Publish stage.
//!
//! Reads a run's diff metadata, loads each partition's tagged records,
//! and applies them to the discussion platform: `Create` makes a topic,
//! `Update` rewrites it, `Delete` relabels its title, `Resurrect`
//! restores it. Every applied record is written to the durable publish
//! table, which becomes the "last published" snapshot the next run diffs
//! against.
//!
//! Partitions publish concurrently and independently, like the diff
//! stage; failures are collected and reported together while successful
//! partitions' writes stay durable. Because the publish table advances
//! row by row, re-running a partly-failed publish re-applies only the
//! records whose rows were not yet advanced by a later diff.

use futures::stream::{self, StreamExt};

use crate::error::{AppError, PartitionFailure, Result};
use crate::models::{
    DiffMetadata, PublishMetadata, RecordKind, Route, RowState, Stop, SyncConfig,
};
use crate::services::TopicPublisher;
use crate::storage::{
    DIFF_METADATA_TABLE, PUBLISH_METADATA_TABLE, TableStore, diff_table, publish_table,
};

/// Apply a run's diff output to the discussion platform and advance the
/// publish tables.
pub async fn run_publish<S: TableStore, P: TopicPublisher>(
    store: &S,
    publisher: &P,
    config: &SyncConfig,
    run_id: &str,
) -> Result<Vec<PublishMetadata>> {
    let diff_entries: Vec<DiffMetadata> = store
        .query_partition(DIFF_METADATA_TABLE, run_id)
        .await?;
    if diff_entries.is_empty() {
        log::info!("No diff metadata for run {run_id}; nothing to publish");
        return Ok(Vec::new());
    }

    let concurrency = config.max_concurrent_partitions.max(1);
    let mut results = stream::iter(diff_entries)
        .map(|entry| async move {
            let result = publish_partition(store, publisher, run_id, &entry).await;
            (entry, result)
        })
        .buffer_unordered(concurrency);

    let mut entries = Vec::new();
    let mut failures = Vec::new();
    while let Some((diff_entry, result)) = results.next().await {
        match result {
            Ok(metadata) => entries.push(metadata),
            Err(error) => {
                log::warn!(
                    "Publish failed for {} {}: {}",
                    diff_entry.kind,
                    diff_entry.partition_label(),
                    error
                );
                failures.push(PartitionFailure {
                    run_id: run_id.to_string(),
                    kind: diff_entry.kind.to_string(),
                    region_id: diff_entry.region_id,
                    agency_id: diff_entry.agency_id,
                    message: error.to_string(),
                });
            }
        }
    }

    if !failures.is_empty() {
        return Err(AppError::RunFailed { failures });
    }
    Ok(entries)
}

async fn publish_partition<S: TableStore, P: TopicPublisher>(
    store: &S,
    publisher: &P,
    run_id: &str,
    entry: &DiffMetadata,
) -> Result<PublishMetadata> {
    match entry.kind {
        RecordKind::Route => publish_routes(store, publisher, run_id, entry).await,
        RecordKind::Stop => publish_stops(store, publisher, run_id, entry).await,
        kind => Err(AppError::validation(format!(
            "{kind} records are catalog data and are not published"
        ))),
    }
}

async fn publish_routes<S: TableStore, P: TopicPublisher>(
    store: &S,
    publisher: &P,
    run_id: &str,
    entry: &DiffMetadata,
) -> Result<PublishMetadata> {
    let partition = Route::partition_for(&entry.region_id, &entry.agency_id);
    let routes: Vec<Route> = store
        .query_partition(&diff_table(run_id, RecordKind::Route), &partition)
        .await?;

    let mut metadata =
        PublishMetadata::new(run_id, &entry.region_id, &entry.agency_id, RecordKind::Route);
    let table = publish_table(RecordKind::Route);
    for route in routes {
        match route.state {
            RowState::Create => {
                publisher.create_route(&route).await?;
                metadata.added += 1;
            }
            RowState::Update => {
                publisher.update_route(&route).await?;
                metadata.updated += 1;
            }
            RowState::Delete => {
                publisher.delete_route(&route).await?;
                metadata.deleted += 1;
            }
            RowState::Resurrect => {
                publisher.resurrect_route(&route).await?;
                metadata.resurrected += 1;
            }
            RowState::Default => {
                return Err(AppError::validation(format!(
                    "diff row {} carries no change state",
                    route.row_key()
                )));
            }
        }
        // advance the last-published snapshot only after the platform
        // call succeeds, so a retry re-applies exactly the missed rows
        store.insert(&table, std::slice::from_ref(&route)).await?;
    }

    store
        .insert(PUBLISH_METADATA_TABLE, std::slice::from_ref(&metadata))
        .await?;
    Ok(metadata)
}

async fn publish_stops<S: TableStore, P: TopicPublisher>(
    store: &S,
    publisher: &P,
    run_id: &str,
    entry: &DiffMetadata,
) -> Result<PublishMetadata> {
    let stops: Vec<Stop> = store
        .query_partition(&diff_table(run_id, RecordKind::Stop), &entry.region_id)
        .await?;

    let mut metadata = PublishMetadata::new(run_id, &entry.region_id, "", RecordKind::Stop);
    let table = publish_table(RecordKind::Stop);
    for stop in stops {
        match stop.state {
            RowState::Create => {
                publisher.create_stop(&stop).await?;
                metadata.added += 1;
            }
            RowState::Update => {
                publisher.update_stop(&stop).await?;
                metadata.updated += 1;
            }
            RowState::Delete => {
                publisher.delete_stop(&stop).await?;
                metadata.deleted += 1;
            }
            RowState::Resurrect => {
                publisher.resurrect_stop(&stop).await?;
                metadata.resurrected += 1;
            }
            RowState::Default => {
                return Err(AppError::validation(format!(
                    "diff row {} carries no change state",
                    stop.row_key()
                )));
            }
        }
        store.insert(&table, std::slice::from_ref(&stop)).await?;
    }

    store
        .insert(PUBLISH_METADATA_TABLE, std::slice::from_ref(&metadata))
        .await?;
    Ok(metadata)
}
