//! Agency data structure.

use serde::{Deserialize, Serialize};

use crate::models::{RecordKind, RowState};
use crate::storage::TableRow;
use crate::utils::table_key;

/// A transit agency operating within a region. Agencies are catalog data;
/// together with regions they define the partitions that routes are
/// diffed under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agency {
    /// Agency unique identifier (scoped to its region)
    pub id: String,

    /// Region the agency belongs to
    pub region_id: String,

    /// Agency display name
    pub name: String,

    /// Agency homepage URL
    pub url: String,

    /// Agency phone number
    pub phone: String,

    /// Lifecycle state; always `Default` for catalog rows
    #[serde(default)]
    pub state: RowState,

    /// Original upstream payload, carried for audit only
    #[serde(default)]
    pub raw: String,
}

impl Agency {
    pub fn partition_key(&self) -> String {
        self.region_id.clone()
    }

    pub fn row_key(&self) -> String {
        table_key(&format!("{}_{}_{}", RecordKind::Agency, self.region_id, self.id))
    }
}

impl TableRow for Agency {
    fn partition_key(&self) -> String {
        self.partition_key()
    }

    fn row_key(&self) -> String {
        self.row_key()
    }
}
