//! Region data structure.

use serde::{Deserialize, Serialize};

use crate::models::{RecordKind, RowState};
use crate::storage::TableRow;
use crate::utils::table_key;

/// A transit region: one deployment of the upstream API covering a
/// metropolitan area. Regions are catalog data; they are downloaded and
/// stored but never diffed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Region {
    /// Region unique identifier
    pub id: String,

    /// Region display name
    pub name: String,

    /// Base URL of the region's schedule API
    pub api_base_url: String,

    /// Lifecycle state; always `Default` for catalog rows
    #[serde(default)]
    pub state: RowState,

    /// Original upstream payload, carried for audit only
    #[serde(default)]
    pub raw: String,
}

impl Region {
    /// All regions share one partition so the catalog can be listed in a
    /// single query.
    pub const PARTITION: &'static str = "regions";

    pub fn partition_key(&self) -> String {
        Self::PARTITION.to_string()
    }

    pub fn row_key(&self) -> String {
        table_key(&format!("{}_{}", RecordKind::Region, self.id))
    }
}

impl TableRow for Region {
    fn partition_key(&self) -> String {
        self.partition_key()
    }

    fn row_key(&self) -> String {
        self.row_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_key_is_kind_prefixed() {
        let region = Region {
            id: "1".to_string(),
            name: "Puget Sound".to_string(),
            api_base_url: "https://api.pugetsound.example.org".to_string(),
            state: RowState::Default,
            raw: String::new(),
        };
        assert_eq!(region.row_key(), "Region_1");
        assert_eq!(region.partition_key(), "regions");
    }
}
