//! Upstream transit API client.
//!
//! Fetches the regions catalog and, per region, the agencies, routes, and
//! stops endpoints. Responses are JSON envelopes with the payload under
//! `data.list`; each list item is parsed into its model and also carried
//! verbatim in the model's `raw` field for audit.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Agency, Region, Route, Stop, TransitConfig};

/// Supplier of plain entity collections from the upstream schedule data;
/// the seam the download stage drives so it can be exercised without a
/// live API.
#[async_trait]
pub trait TransitSource: Send + Sync {
    /// Fetch the catalog of regions.
    async fn regions(&self) -> Result<Vec<Region>>;

    /// Fetch the agencies operating in a region.
    async fn agencies(&self, region: &Region) -> Result<Vec<Agency>>;

    /// Fetch the routes operated by an agency.
    async fn routes(&self, region: &Region, agency: &Agency) -> Result<Vec<Route>>;

    /// Fetch the stops served by a route.
    async fn stops(&self, region: &Region, route: &Route) -> Result<Vec<Stop>>;
}

/// Client for the upstream schedule API.
pub struct TransitClient {
    config: TransitConfig,
    client: reqwest::Client,
}

impl TransitClient {
    /// Create a client with the configured user agent and timeout.
    pub fn new(config: &TransitConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    fn endpoint(&self, region: &Region, path: &str) -> Result<Url> {
        let base = Url::parse(&region.api_base_url)?;
        let mut url = base.join(path)?;
        if !self.config.api_key.is_empty() {
            url.query_pairs_mut().append_pair("key", &self.config.api_key);
        }
        Ok(url)
    }

    async fn fetch_list(&self, url: Url, context: &str) -> Result<Vec<Value>> {
        let response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::fetch(context, e))?;
        let body: Value = response.json().await?;
        body.pointer("/data/list")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| AppError::fetch(context, "response has no data.list array"))
    }
}

#[async_trait]
impl TransitSource for TransitClient {
    async fn regions(&self) -> Result<Vec<Region>> {
        let url = Url::parse(&self.config.regions_uri)?;
        let list = self.fetch_list(url, "regions").await?;
        Ok(parse_regions(&list))
    }

    async fn agencies(&self, region: &Region) -> Result<Vec<Agency>> {
        let url = self.endpoint(region, "api/where/agencies-with-coverage.json")?;
        let context = format!("agencies for region {}", region.id);
        let list = self.fetch_list(url, &context).await?;
        Ok(parse_agencies(&list, &region.id))
    }

    async fn routes(&self, region: &Region, agency: &Agency) -> Result<Vec<Route>> {
        let url = self.endpoint(
            region,
            &format!("api/where/routes-for-agency/{}.json", agency.id),
        )?;
        let context = format!("routes for agency {}/{}", region.id, agency.id);
        let list = self.fetch_list(url, &context).await?;
        Ok(parse_routes(&list, &region.id, &agency.id))
    }

    async fn stops(&self, region: &Region, route: &Route) -> Result<Vec<Stop>> {
        let url = self.endpoint(
            region,
            &format!("api/where/stops-for-route/{}.json", route.id),
        )?;
        let context = format!("stops for route {}/{}", region.id, route.id);
        let list = self.fetch_list(url, &context).await?;
        Ok(parse_stops(&list, &region.id))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegionWire {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    api_base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgencyWire {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    phone: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteWire {
    #[serde(default)]
    id: String,
    #[serde(default)]
    short_name: String,
    #[serde(default)]
    long_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopWire {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    direction: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
}

/// Parse one list item, skipping records the upstream serves without an id.
fn parse_item<'a, W: Deserialize<'a>>(item: &'a Value, context: &str) -> Option<W> {
    match W::deserialize(item) {
        Ok(wire) => Some(wire),
        Err(error) => {
            log::warn!("Skipping malformed {context} record: {error}");
            None
        }
    }
}

fn parse_regions(list: &[Value]) -> Vec<Region> {
    list.iter()
        .filter_map(|item| {
            let wire: RegionWire = parse_item(item, "region")?;
            if wire.id.trim().is_empty() {
                log::warn!("Skipping region record with an empty id");
                return None;
            }
            Some(Region {
                id: wire.id,
                name: wire.name,
                api_base_url: wire.api_base_url,
                state: Default::default(),
                raw: item.to_string(),
            })
        })
        .collect()
}

fn parse_agencies(list: &[Value], region_id: &str) -> Vec<Agency> {
    list.iter()
        .filter_map(|item| {
            let wire: AgencyWire = parse_item(item, "agency")?;
            if wire.id.trim().is_empty() {
                log::warn!("Skipping agency record with an empty id in region {region_id}");
                return None;
            }
            Some(Agency {
                id: wire.id,
                region_id: region_id.to_string(),
                name: wire.name,
                url: wire.url,
                phone: wire.phone,
                state: Default::default(),
                raw: item.to_string(),
            })
        })
        .collect()
}

fn parse_routes(list: &[Value], region_id: &str, agency_id: &str) -> Vec<Route> {
    list.iter()
        .filter_map(|item| {
            let wire: RouteWire = parse_item(item, "route")?;
            if wire.id.trim().is_empty() {
                log::warn!("Skipping route record with an empty id in region {region_id}");
                return None;
            }
            Some(Route {
                id: wire.id,
                short_name: wire.short_name,
                long_name: wire.long_name,
                description: wire.description,
                url: wire.url,
                agency_id: agency_id.to_string(),
                region_id: region_id.to_string(),
                state: Default::default(),
                raw: item.to_string(),
            })
        })
        .collect()
}

fn parse_stops(list: &[Value], region_id: &str) -> Vec<Stop> {
    list.iter()
        .filter_map(|item| {
            let wire: StopWire = parse_item(item, "stop")?;
            if wire.id.trim().is_empty() {
                log::warn!("Skipping stop record with an empty id in region {region_id}");
                return None;
            }
            Some(Stop {
                id: wire.id,
                name: wire.name,
                direction: wire.direction,
                code: wire.code,
                lat: wire.lat,
                lon: wire.lon,
                region_id: region_id.to_string(),
                state: Default::default(),
                raw: item.to_string(),
            })
        })
        .collect()
}
