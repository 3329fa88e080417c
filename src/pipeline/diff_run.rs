//! Diff run coordination.
//!
//! Discovers the partitions to diff from the run's downloaded region and
//! agency catalog, fans the diff engine out across them, and aggregates
//! the per-partition bookkeeping into a run report.
//!
//! Partitions are independent: each worker reads and writes only its own
//! partition keys, so they run concurrently without shared state. A failed
//! partition never blocks its siblings; their diffs stay durably written
//! and the run surfaces every failure at the end. Re-running the diff for
//! the same run id against the same publish tables is idempotent repair.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};

use crate::error::{AppError, PartitionFailure, Result};
use crate::models::{
    Agency, DiffMetadata, RecordKind, Region, Route, RunReport, Stop, SyncConfig,
};
use crate::pipeline::diff::{DiffKeys, diff_snapshots};
use crate::storage::{DIFF_METADATA_TABLE, TableStore, diff_table, download_table, publish_table};

/// One unit of independent diff work: a region for stops, a
/// (region, agency) pair for routes.
#[derive(Debug, Clone)]
pub struct DiffPartition {
    pub kind: RecordKind,
    pub region_id: String,
    /// Empty for stop partitions
    pub agency_id: String,
}

impl DiffPartition {
    fn label(&self) -> String {
        if self.agency_id.is_empty() {
            self.region_id.clone()
        } else {
            format!("{}/{}", self.region_id, self.agency_id)
        }
    }
}

fn route_keys() -> DiffKeys<Route> {
    DiffKeys {
        identity_key: |route| route.identity_key(),
        fingerprint: |route| route.fingerprint(),
    }
}

fn stop_keys() -> DiffKeys<Stop> {
    DiffKeys {
        identity_key: |stop| stop.identity_key(),
        fingerprint: |stop| stop.fingerprint(),
    }
}

/// Diff every partition of a run's download tables against the publish
/// tables and store the tagged records plus per-partition metadata.
///
/// The `cancel` flag is checked cooperatively before each partition
/// starts; partitions already in flight run to completion. All partition
/// failures are collected and reported together so operators can see the
/// full set of affected regions and agencies.
pub async fn run_diff<S: TableStore>(
    store: &S,
    config: &SyncConfig,
    run_id: &str,
    cancel: &AtomicBool,
) -> Result<RunReport> {
    let partitions = discover_partitions(store, run_id).await?;
    log::info!(
        "Diffing {} partition(s) for run {}",
        partitions.len(),
        run_id
    );

    let concurrency = config.max_concurrent_partitions.max(1);
    let mut results = stream::iter(partitions)
        .map(|partition| async move {
            if cancel.load(Ordering::Relaxed) {
                return (partition, Err(AppError::Cancelled));
            }
            let result = diff_partition(store, run_id, &partition).await;
            (partition, result)
        })
        .buffer_unordered(concurrency);

    let mut entries = Vec::new();
    let mut failures = Vec::new();
    while let Some((partition, result)) = results.next().await {
        match result {
            Ok(metadata) => {
                log::debug!(
                    "Diffed {} {}: {} change(s)",
                    partition.kind,
                    partition.label(),
                    metadata.added + metadata.updated + metadata.deleted + metadata.resurrected
                );
                entries.push(metadata);
            }
            Err(error) => {
                log::warn!(
                    "Diff failed for {} {}: {}",
                    partition.kind,
                    partition.label(),
                    error
                );
                failures.push(PartitionFailure {
                    run_id: run_id.to_string(),
                    kind: partition.kind.to_string(),
                    region_id: partition.region_id,
                    agency_id: partition.agency_id,
                    message: error.to_string(),
                });
            }
        }
    }

    if !failures.is_empty() {
        return Err(AppError::RunFailed { failures });
    }
    Ok(RunReport::new(run_id, entries))
}

/// Derive the diff partitions from the run's downloaded region and agency
/// catalog. A partition with no routes or stops on either side still gets
/// diffed so its zero-count metadata row is written.
async fn discover_partitions<S: TableStore>(
    store: &S,
    run_id: &str,
) -> Result<Vec<DiffPartition>> {
    let regions: Vec<Region> = store
        .query_partition(&download_table(run_id, RecordKind::Region), Region::PARTITION)
        .await?;

    let mut partitions = Vec::new();
    for region in &regions {
        let agencies: Vec<Agency> = store
            .query_partition(&download_table(run_id, RecordKind::Agency), &region.id)
            .await?;
        for agency in &agencies {
            partitions.push(DiffPartition {
                kind: RecordKind::Route,
                region_id: region.id.clone(),
                agency_id: agency.id.clone(),
            });
        }
        partitions.push(DiffPartition {
            kind: RecordKind::Stop,
            region_id: region.id.clone(),
            agency_id: String::new(),
        });
    }
    Ok(partitions)
}

async fn diff_partition<S: TableStore>(
    store: &S,
    run_id: &str,
    partition: &DiffPartition,
) -> Result<DiffMetadata> {
    match partition.kind {
        RecordKind::Route => {
            diff_routes(store, run_id, &partition.region_id, &partition.agency_id).await
        }
        RecordKind::Stop => diff_stops(store, run_id, &partition.region_id).await,
        kind => Err(AppError::validation(format!(
            "{kind} records are catalog data and are not diffed"
        ))),
    }
}

async fn diff_routes<S: TableStore>(
    store: &S,
    run_id: &str,
    region_id: &str,
    agency_id: &str,
) -> Result<DiffMetadata> {
    let partition = Route::partition_for(region_id, agency_id);
    let current: Vec<Route> = store
        .query_partition(&download_table(run_id, RecordKind::Route), &partition)
        .await?;
    let previous: Vec<Route> = store
        .query_partition(&publish_table(RecordKind::Route), &partition)
        .await?;

    let output = diff_snapshots(current, previous, &route_keys());

    let table = diff_table(run_id, RecordKind::Route);
    store.insert(&table, &output.created).await?;
    store.insert(&table, &output.updated).await?;
    store.insert(&table, &output.deleted).await?;
    store.insert(&table, &output.resurrected).await?;

    let metadata = output.metadata(RecordKind::Route, region_id, agency_id, run_id);
    store
        .insert(DIFF_METADATA_TABLE, std::slice::from_ref(&metadata))
        .await?;
    Ok(metadata)
}

async fn diff_stops<S: TableStore>(
    store: &S,
    run_id: &str,
    region_id: &str,
) -> Result<DiffMetadata> {
    let current: Vec<Stop> = store
        .query_partition(&download_table(run_id, RecordKind::Stop), region_id)
        .await?;
    let previous: Vec<Stop> = store
        .query_partition(&publish_table(RecordKind::Stop), region_id)
        .await?;

    let output = diff_snapshots(current, previous, &stop_keys());

    let table = diff_table(run_id, RecordKind::Stop);
    store.insert(&table, &output.created).await?;
    store.insert(&table, &output.updated).await?;
    store.insert(&table, &output.deleted).await?;
    store.insert(&table, &output.resurrected).await?;

    let metadata = output.metadata(RecordKind::Stop, region_id, "", run_id);
    store
        .insert(DIFF_METADATA_TABLE, std::slice::from_ref(&metadata))
        .await?;
    Ok(metadata)
}
