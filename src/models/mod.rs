// src/models/mod.rs

//! Domain models for the sync service.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod agency;
mod config;
mod region;
mod report;
mod route;
mod state;
mod stop;

// Re-export all public types
pub use agency::Agency;
pub use config::{Config, PlatformConfig, SyncConfig, TransitConfig};
pub use region::Region;
pub use report::{ChangeTotals, DiffMetadata, DownloadMetadata, PublishMetadata, RunReport};
pub use route::Route;
pub use state::{DiffRecord, Observation, RowState, transition};
pub use stop::Stop;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of record stored in the download, diff, and publish tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Region,
    Agency,
    Route,
    Stop,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Region => "Region",
            RecordKind::Agency => "Agency",
            RecordKind::Route => "Route",
            RecordKind::Stop => "Stop",
        }
    }

    /// Suffix used when composing physical table names.
    pub fn table_suffix(self) -> &'static str {
        match self {
            RecordKind::Region => "regions",
            RecordKind::Agency => "agencies",
            RecordKind::Route => "routes",
            RecordKind::Stop => "stops",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
