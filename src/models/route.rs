//! Route data structure.

use serde::{Deserialize, Serialize};

use crate::models::{DiffRecord, RecordKind, RowState};
use crate::storage::TableRow;
use crate::utils::{fingerprint, table_key};

/// A transit route, diffed per (region, agency) partition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    /// Route unique identifier (scoped to its region)
    pub id: String,

    /// Short display name, e.g. "44"
    pub short_name: String,

    /// Long display name, e.g. "Ballard - Montlake"
    pub long_name: String,

    /// Free-text description
    pub description: String,

    /// Route homepage URL
    pub url: String,

    /// Agency operating the route
    pub agency_id: String,

    /// Region the route belongs to
    pub region_id: String,

    /// Lifecycle state
    #[serde(default)]
    pub state: RowState,

    /// Original upstream payload, carried for audit only
    #[serde(default)]
    pub raw: String,
}

impl Route {
    /// Partition key for a (region, agency) pair. Each diff and publish
    /// worker owns exactly one of these, so concurrent workers never write
    /// the same partition.
    pub fn partition_for(region_id: &str, agency_id: &str) -> String {
        table_key(&format!("{region_id}_{agency_id}"))
    }

    pub fn partition_key(&self) -> String {
        Self::partition_for(&self.region_id, &self.agency_id)
    }

    /// Stable natural key correlating the same logical route across runs.
    pub fn identity_key(&self) -> String {
        table_key(&format!("{}_{}_{}", RecordKind::Route, self.region_id, self.id))
    }

    pub fn row_key(&self) -> String {
        self.identity_key()
    }

    /// Content fingerprint over the subset of fields the publisher renders.
    pub fn fingerprint(&self) -> u64 {
        fingerprint(&[&self.identity_key(), &self.short_name, &self.long_name])
    }
}

impl TableRow for Route {
    fn partition_key(&self) -> String {
        self.partition_key()
    }

    fn row_key(&self) -> String {
        self.row_key()
    }
}

impl DiffRecord for Route {
    fn state(&self) -> RowState {
        self.state
    }

    fn set_state(&mut self, state: RowState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_route() -> Route {
        Route {
            id: "40_100479".to_string(),
            short_name: "44".to_string(),
            long_name: "Ballard - Montlake".to_string(),
            description: "Weekday service".to_string(),
            url: "https://metro.example.org/44".to_string(),
            agency_id: "40".to_string(),
            region_id: "1".to_string(),
            state: RowState::Default,
            raw: String::new(),
        }
    }

    #[test]
    fn test_keys() {
        let route = sample_route();
        assert_eq!(route.partition_key(), "1_40");
        assert_eq!(route.identity_key(), "Route_1_40_100479");
    }

    #[test]
    fn test_fingerprint_tracks_published_fields_only() {
        let route = sample_route();
        let base = route.fingerprint();

        let mut renamed = route.clone();
        renamed.short_name = "44X".to_string();
        assert_ne!(base, renamed.fingerprint());

        // description, url, state, and raw are not published; changing them
        // must not change the fingerprint
        let mut cosmetic = route.clone();
        cosmetic.description = "Different".to_string();
        cosmetic.url = "https://elsewhere.example.org".to_string();
        cosmetic.state = RowState::Create;
        cosmetic.raw = "{}".to_string();
        assert_eq!(base, cosmetic.fingerprint());
    }
}
