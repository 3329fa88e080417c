//! Stop data structure.

use serde::{Deserialize, Serialize};

use crate::models::{DiffRecord, RecordKind, RowState};
use crate::storage::TableRow;
use crate::utils::{fingerprint, table_key};

/// A transit stop, diffed per region partition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stop {
    /// Stop unique identifier (scoped to its region)
    pub id: String,

    /// Stop display name
    pub name: String,

    /// Compass direction of travel, e.g. "N"
    pub direction: String,

    /// Rider-facing stop code
    pub code: String,

    /// Latitude
    pub lat: f64,

    /// Longitude
    pub lon: f64,

    /// Region the stop belongs to
    pub region_id: String,

    /// Lifecycle state
    #[serde(default)]
    pub state: RowState,

    /// Original upstream payload, carried for audit only
    #[serde(default)]
    pub raw: String,
}

impl Stop {
    pub fn partition_key(&self) -> String {
        table_key(&self.region_id)
    }

    /// Stable natural key correlating the same logical stop across runs.
    pub fn identity_key(&self) -> String {
        table_key(&format!("{}_{}_{}", RecordKind::Stop, self.region_id, self.id))
    }

    pub fn row_key(&self) -> String {
        self.identity_key()
    }

    /// Content fingerprint over the subset of fields the publisher renders.
    pub fn fingerprint(&self) -> u64 {
        fingerprint(&[&self.identity_key(), &self.name, &self.direction])
    }
}

impl TableRow for Stop {
    fn partition_key(&self) -> String {
        self.partition_key()
    }

    fn row_key(&self) -> String {
        self.row_key()
    }
}

impl DiffRecord for Stop {
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

    fn sample_stop() -> Stop {
        Stop {
            id: "1_75403".to_string(),
            name: "NE 45th St & Brooklyn Ave".to_string(),
            direction: "E".to_string(),
            code: "75403".to_string(),
            lat: 47.661,
            lon: -122.314,
            region_id: "1".to_string(),
            state: RowState::Default,
            raw: String::new(),
        }
    }

    #[test]
    fn test_keys() {
        let stop = sample_stop();
        assert_eq!(stop.partition_key(), "1");
        assert_eq!(stop.identity_key(), "Stop_1_1_75403");
    }

    #[test]
    fn test_fingerprint_ignores_position() {
        let stop = sample_stop();
        let base = stop.fingerprint();

        // coordinates are not rendered in topics, so a re-surveyed stop is
        // not an update
        let mut moved = stop.clone();
        moved.lat = 47.662;
        moved.lon = -122.315;
        assert_eq!(base, moved.fingerprint());

        let mut renamed = stop;
        renamed.direction = "W".to_string();
        assert_ne!(base, renamed.fingerprint());
    }
}
