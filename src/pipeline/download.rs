//! Download stage.
//!
//! Fetches the full region/agency/route/stop catalog from the upstream
//! API and stores it in the run's download tables, with one bookkeeping
//! row per partition. All rows land with the `Default` state and their
//! raw upstream payload attached; classification happens later in the
//! diff stage.
//!
//! Regions gate everything else, so a failed regions fetch aborts the
//! stage. After that, partitions are independent: a region or agency
//! whose fetch fails is recorded and skipped while its siblings finish,
//! and the stage reports the full failure set at the end.

use std::collections::HashMap;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::error::{AppError, PartitionFailure, Result};
use crate::models::{
    Agency, DownloadMetadata, RecordKind, Region, Route, Stop, TransitConfig,
};
use crate::services::TransitSource;
use crate::storage::{DOWNLOAD_METADATA_TABLE, TableStore, download_table};

/// Download the whole upstream catalog into the run's download tables.
pub async fn run_download<C: TransitSource, S: TableStore>(
    client: &C,
    store: &S,
    config: &TransitConfig,
    run_id: &str,
) -> Result<Vec<DownloadMetadata>> {
    let delay = Duration::from_millis(config.request_delay_ms);
    let concurrency = config.max_concurrent.max(1);

    let mut entries = Vec::new();
    let mut failures = Vec::new();

    // the regions catalog gates everything else
    let regions = client.regions().await?;
    store
        .insert(&download_table(run_id, RecordKind::Region), &regions)
        .await?;
    entries.push(
        store_metadata(store, run_id, RecordKind::Region, "", "", regions.len()).await?,
    );
    log::info!("Downloaded {} region(s) for run {}", regions.len(), run_id);

    // agencies per region
    let mut agency_stream = stream::iter(regions)
        .map(|region| async move {
            let result = download_agencies(client, store, run_id, &region).await;
            (region, result)
        })
        .buffer_unordered(concurrency);

    let mut region_agencies: Vec<(Region, Vec<Agency>)> = Vec::new();
    while let Some((region, result)) = agency_stream.next().await {
        match result {
            Ok((agencies, metadata)) => {
                entries.push(metadata);
                region_agencies.push((region, agencies));
            }
            Err(error) => {
                log::warn!("Agency download failed for region {}: {}", region.id, error);
                failures.push(failure(run_id, RecordKind::Agency, &region.id, "", &error));
            }
        }
        pace(delay).await;
    }

    // routes per (region, agency)
    let route_jobs: Vec<(Region, Agency)> = region_agencies
        .iter()
        .flat_map(|(region, agencies)| {
            agencies
                .iter()
                .map(|agency| (region.clone(), agency.clone()))
        })
        .collect();

    let mut route_stream = stream::iter(route_jobs)
        .map(|(region, agency)| async move {
            let result = download_routes(client, store, run_id, &region, &agency).await;
            (region, agency, result)
        })
        .buffer_unordered(concurrency);

    let mut routes_by_region: HashMap<String, Vec<Route>> = HashMap::new();
    while let Some((region, agency, result)) = route_stream.next().await {
        match result {
            Ok((routes, metadata)) => {
                entries.push(metadata);
                routes_by_region
                    .entry(region.id.clone())
                    .or_default()
                    .extend(routes);
            }
            Err(error) => {
                log::warn!(
                    "Route download failed for agency {}/{}: {}",
                    region.id,
                    agency.id,
                    error
                );
                failures.push(failure(
                    run_id,
                    RecordKind::Route,
                    &region.id,
                    &agency.id,
                    &error,
                ));
            }
        }
        pace(delay).await;
    }

    // stops per region, deduplicated across the region's routes
    let stop_jobs: Vec<(Region, Vec<Route>)> = region_agencies
        .into_iter()
        .map(|(region, _)| {
            let routes = routes_by_region.remove(&region.id).unwrap_or_default();
            (region, routes)
        })
        .collect();

    let mut stop_stream = stream::iter(stop_jobs)
        .map(|(region, routes)| async move {
            let result = download_stops(client, store, run_id, &region, &routes).await;
            (region, result)
        })
        .buffer_unordered(concurrency);

    while let Some((region, result)) = stop_stream.next().await {
        match result {
            Ok(metadata) => entries.push(metadata),
            Err(error) => {
                log::warn!("Stop download failed for region {}: {}", region.id, error);
                failures.push(failure(run_id, RecordKind::Stop, &region.id, "", &error));
            }
        }
        pace(delay).await;
    }

    if !failures.is_empty() {
        return Err(AppError::RunFailed { failures });
    }
    Ok(entries)
}

async fn download_agencies<C: TransitSource, S: TableStore>(
    client: &C,
    store: &S,
    run_id: &str,
    region: &Region,
) -> Result<(Vec<Agency>, DownloadMetadata)> {
    let agencies = client.agencies(region).await?;
    store
        .insert(&download_table(run_id, RecordKind::Agency), &agencies)
        .await?;
    let metadata =
        store_metadata(store, run_id, RecordKind::Agency, &region.id, "", agencies.len()).await?;
    Ok((agencies, metadata))
}

async fn download_routes<C: TransitSource, S: TableStore>(
    client: &C,
    store: &S,
    run_id: &str,
    region: &Region,
    agency: &Agency,
) -> Result<(Vec<Route>, DownloadMetadata)> {
    let routes = client.routes(region, agency).await?;
    store
        .insert(&download_table(run_id, RecordKind::Route), &routes)
        .await?;
    let metadata = store_metadata(
        store,
        run_id,
        RecordKind::Route,
        &region.id,
        &agency.id,
        routes.len(),
    )
    .await?;
    Ok((routes, metadata))
}

async fn download_stops<C: TransitSource, S: TableStore>(
    client: &C,
    store: &S,
    run_id: &str,
    region: &Region,
    routes: &[Route],
) -> Result<DownloadMetadata> {
    // the same stop serves many routes; keep the first copy seen
    let mut by_id: HashMap<String, Stop> = HashMap::new();
    for route in routes {
        for stop in client.stops(region, route).await? {
            by_id.entry(stop.id.clone()).or_insert(stop);
        }
    }

    let stops: Vec<Stop> = by_id.into_values().collect();
    store
        .insert(&download_table(run_id, RecordKind::Stop), &stops)
        .await?;
    store_metadata(store, run_id, RecordKind::Stop, &region.id, "", stops.len()).await
}

async fn store_metadata<S: TableStore>(
    store: &S,
    run_id: &str,
    kind: RecordKind,
    region_id: &str,
    agency_id: &str,
    count: usize,
) -> Result<DownloadMetadata> {
    let metadata = DownloadMetadata {
        run_id: run_id.to_string(),
        region_id: region_id.to_string(),
        agency_id: agency_id.to_string(),
        kind,
        count,
    };
    store
        .insert(DOWNLOAD_METADATA_TABLE, std::slice::from_ref(&metadata))
        .await?;
    Ok(metadata)
}

fn failure(
    run_id: &str,
    kind: RecordKind,
    region_id: &str,
    agency_id: &str,
    error: &AppError,
) -> PartitionFailure {
    PartitionFailure {
        run_id: run_id.to_string(),
        kind: kind.to_string(),
        region_id: region_id.to_string(),
        agency_id: agency_id.to_string(),
        message: error.to_string(),
    }
}

async fn pace(delay: Duration) {
    if delay > Duration::ZERO {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RowState;
    use crate::storage::LocalTableStore;
    use crate::utils::generate_test_run_id;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StubSource {
        fail_region: Option<String>,
    }

    fn region(id: &str) -> Region {
        Region {
            id: id.to_string(),
            name: format!("Region {id}"),
            api_base_url: "https://api.example.org".to_string(),
            state: RowState::Default,
            raw: String::new(),
        }
    }

    fn stop(id: &str, region_id: &str) -> Stop {
        Stop {
            id: id.to_string(),
            name: format!("Stop {id}"),
            direction: "N".to_string(),
            code: String::new(),
            lat: 0.0,
            lon: 0.0,
            region_id: region_id.to_string(),
            state: RowState::Default,
            raw: String::new(),
        }
    }

    #[async_trait]
    impl TransitSource for StubSource {
        async fn regions(&self) -> Result<Vec<Region>> {
            Ok(vec![region("1"), region("2")])
        }

        async fn agencies(&self, region: &Region) -> Result<Vec<Agency>> {
            if self.fail_region.as_deref() == Some(&region.id) {
                return Err(AppError::fetch("agencies", "stubbed outage"));
            }
            Ok(vec![Agency {
                id: format!("a{}", region.id),
                region_id: region.id.clone(),
                name: "Agency".to_string(),
                url: String::new(),
                phone: String::new(),
                state: RowState::Default,
                raw: String::new(),
            }])
        }

        async fn routes(&self, region: &Region, agency: &Agency) -> Result<Vec<Route>> {
            Ok(vec![
                Route {
                    id: "r1".to_string(),
                    short_name: "44".to_string(),
                    long_name: "Ballard".to_string(),
                    description: String::new(),
                    url: String::new(),
                    agency_id: agency.id.clone(),
                    region_id: region.id.clone(),
                    state: RowState::Default,
                    raw: String::new(),
                },
                Route {
                    id: "r2".to_string(),
                    short_name: "45".to_string(),
                    long_name: "Loop".to_string(),
                    description: String::new(),
                    url: String::new(),
                    agency_id: agency.id.clone(),
                    region_id: region.id.clone(),
                    state: RowState::Default,
                    raw: String::new(),
                },
            ])
        }

        async fn stops(&self, region: &Region, route: &Route) -> Result<Vec<Stop>> {
            // both routes serve s1, so the region must deduplicate it
            match route.id.as_str() {
                "r1" => Ok(vec![stop("s1", &region.id), stop("s2", &region.id)]),
                _ => Ok(vec![stop("s1", &region.id), stop("s3", &region.id)]),
            }
        }
    }

    fn quick_config() -> TransitConfig {
        TransitConfig {
            request_delay_ms: 0,
            ..TransitConfig::default()
        }
    }

    #[tokio::test]
    async fn test_download_populates_all_tables() {
        let tmp = TempDir::new().unwrap();
        let store = LocalTableStore::new(tmp.path());
        let run_id = generate_test_run_id();
        let source = StubSource { fail_region: None };

        let entries = run_download(&source, &store, &quick_config(), &run_id)
            .await
            .unwrap();

        let regions: Vec<Region> = store
            .query_partition(&download_table(&run_id, RecordKind::Region), Region::PARTITION)
            .await
            .unwrap();
        assert_eq!(regions.len(), 2);

        let routes: Vec<Route> = store
            .query_partition(&download_table(&run_id, RecordKind::Route), "1_a1")
            .await
            .unwrap();
        assert_eq!(routes.len(), 2);
        assert!(routes.iter().all(|r| r.state == RowState::Default));

        // s1 appears on both routes but is stored once per region
        let stops: Vec<Stop> = store
            .query_partition(&download_table(&run_id, RecordKind::Stop), "1")
            .await
            .unwrap();
        assert_eq!(stops.len(), 3);

        // one regions row, two agency partitions, two route partitions,
        // two stop partitions
        assert_eq!(entries.len(), 7);
        let stop_entry = entries
            .iter()
            .find(|m| m.kind == RecordKind::Stop && m.region_id == "1")
            .unwrap();
        assert_eq!(stop_entry.count, 3);
    }

    #[tokio::test]
    async fn test_failed_region_does_not_abort_siblings() {
        let tmp = TempDir::new().unwrap();
        let store = LocalTableStore::new(tmp.path());
        let run_id = generate_test_run_id();
        let source = StubSource {
            fail_region: Some("1".to_string()),
        };

        let error = run_download(&source, &store, &quick_config(), &run_id)
            .await
            .unwrap_err();
        match error {
            AppError::RunFailed { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].region_id, "1");
                assert_eq!(failures[0].kind, "Agency");
            }
            other => panic!("expected RunFailed, got {other}"),
        }

        // region 2 downloaded in full despite region 1's outage
        let routes: Vec<Route> = store
            .query_partition(&download_table(&run_id, RecordKind::Route), "2_a2")
            .await
            .unwrap();
        assert_eq!(routes.len(), 2);
    }
}
