//! Per-run bookkeeping records and the aggregated run report.
//!
//! Each stage writes one metadata row per (kind, partition) it touched, all
//! partitioned by run id so a whole run's bookkeeping can be read or purged
//! in one query. The diff stage's rows double as the run report consumed by
//! notification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::RecordKind;
use crate::storage::TableRow;
use crate::utils::table_key;

/// Bookkeeping record for one download partition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadMetadata {
    pub run_id: String,
    /// Region the partition belongs to; empty for the regions catalog itself
    pub region_id: String,
    /// Agency the partition belongs to; empty for region-wide partitions
    pub agency_id: String,
    pub kind: RecordKind,
    /// Number of records stored for this partition
    pub count: usize,
}

impl TableRow for DownloadMetadata {
    fn partition_key(&self) -> String {
        self.run_id.clone()
    }

    fn row_key(&self) -> String {
        table_key(&format!(
            "{}_{}_{}",
            self.kind, self.region_id, self.agency_id
        ))
    }
}

/// Bookkeeping record for one diffed partition: the four change counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiffMetadata {
    pub run_id: String,
    pub region_id: String,
    /// Empty for stop partitions, which span a whole region
    pub agency_id: String,
    pub kind: RecordKind,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub resurrected: usize,
}

impl DiffMetadata {
    /// Render the partition as `region` or `region/agency`.
    pub fn partition_label(&self) -> String {
        if self.agency_id.is_empty() {
            self.region_id.clone()
        } else {
            format!("{}/{}", self.region_id, self.agency_id)
        }
    }
}

impl TableRow for DiffMetadata {
    fn partition_key(&self) -> String {
        self.run_id.clone()
    }

    fn row_key(&self) -> String {
        table_key(&format!(
            "{}_{}_{}",
            self.kind, self.region_id, self.agency_id
        ))
    }
}

/// Bookkeeping record for one published partition: counts of applied actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishMetadata {
    pub run_id: String,
    pub region_id: String,
    pub agency_id: String,
    pub kind: RecordKind,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub resurrected: usize,
}

impl PublishMetadata {
    pub fn new(
        run_id: impl Into<String>,
        region_id: impl Into<String>,
        agency_id: impl Into<String>,
        kind: RecordKind,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            region_id: region_id.into(),
            agency_id: agency_id.into(),
            kind,
            added: 0,
            updated: 0,
            deleted: 0,
            resurrected: 0,
        }
    }
}

impl TableRow for PublishMetadata {
    fn partition_key(&self) -> String {
        self.run_id.clone()
    }

    fn row_key(&self) -> String {
        table_key(&format!(
            "{}_{}_{}",
            self.kind, self.region_id, self.agency_id
        ))
    }
}

/// Summed change counts across a set of diff metadata rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeTotals {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub resurrected: usize,
}

impl ChangeTotals {
    pub fn accumulate(&mut self, entry: &DiffMetadata) {
        self.added += entry.added;
        self.updated += entry.updated;
        self.deleted += entry.deleted;
        self.resurrected += entry.resurrected;
    }

    pub fn total(&self) -> usize {
        self.added + self.updated + self.deleted + self.resurrected
    }
}

/// Aggregated change counts for one run, one entry per diffed partition.
///
/// Zero entries is a valid report; it means nothing was diffed this run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<DiffMetadata>,
}

impl RunReport {
    pub fn new(run_id: impl Into<String>, entries: Vec<DiffMetadata>) -> Self {
        Self {
            run_id: run_id.into(),
            generated_at: Utc::now(),
            entries,
        }
    }

    /// Sum the change counts across every partition.
    pub fn totals(&self) -> ChangeTotals {
        self.totals_where(|_| true)
    }

    /// Sum the change counts across partitions of one kind.
    pub fn totals_for(&self, kind: RecordKind) -> ChangeTotals {
        self.totals_where(|entry| entry.kind == kind)
    }

    fn totals_where(&self, keep: impl Fn(&DiffMetadata) -> bool) -> ChangeTotals {
        let mut totals = ChangeTotals::default();
        for entry in self.entries.iter().filter(|e| keep(e)) {
            totals.accumulate(entry);
        }
        totals
    }

    pub fn has_changes(&self) -> bool {
        self.totals().total() > 0
    }

    /// Render a human-readable summary for logging and notification.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return format!("Run {}: nothing was diffed", self.run_id);
        }

        let mut lines = vec![format!(
            "Run {}: {} partition(s) diffed",
            self.run_id,
            self.entries.len()
        )];
        for entry in &self.entries {
            lines.push(format!(
                "  {} {}: {} added, {} updated, {} deleted, {} resurrected",
                entry.kind,
                entry.partition_label(),
                entry.added,
                entry.updated,
                entry.deleted,
                entry.resurrected
            ));
        }

        let totals = self.totals();
        lines.push(format!(
            "Total: {} added, {} updated, {} deleted, {} resurrected",
            totals.added, totals.updated, totals.deleted, totals.resurrected
        ));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: RecordKind, region: &str, agency: &str, counts: [usize; 4]) -> DiffMetadata {
        DiffMetadata {
            run_id: "20260805120000000".to_string(),
            region_id: region.to_string(),
            agency_id: agency.to_string(),
            kind,
            added: counts[0],
            updated: counts[1],
            deleted: counts[2],
            resurrected: counts[3],
        }
    }

    #[test]
    fn test_metadata_keys() {
        let meta = entry(RecordKind::Route, "1", "40", [1, 0, 0, 0]);
        assert_eq!(meta.partition_key(), "20260805120000000");
        assert_eq!(meta.row_key(), "Route_1_40");
        assert_eq!(meta.partition_label(), "1/40");

        let meta = entry(RecordKind::Stop, "1", "", [0, 0, 0, 0]);
        assert_eq!(meta.row_key(), "Stop_1_");
        assert_eq!(meta.partition_label(), "1");
    }

    #[test]
    fn test_report_totals() {
        let report = RunReport::new(
            "r1",
            vec![
                entry(RecordKind::Route, "1", "40", [2, 1, 0, 0]),
                entry(RecordKind::Route, "1", "41", [0, 0, 3, 1]),
                entry(RecordKind::Stop, "1", "", [5, 0, 0, 0]),
            ],
        );

        assert_eq!(
            report.totals(),
            ChangeTotals {
                added: 7,
                updated: 1,
                deleted: 3,
                resurrected: 1
            }
        );
        assert_eq!(report.totals_for(RecordKind::Stop).added, 5);
        assert_eq!(report.totals_for(RecordKind::Route).deleted, 3);
        assert!(report.has_changes());
    }

    #[test]
    fn test_report_tolerates_zero_entries() {
        let report = RunReport::new("r2", Vec::new());
        assert!(!report.has_changes());
        assert_eq!(report.totals().total(), 0);
        assert!(report.render().contains("nothing was diffed"));
    }

    #[test]
    fn test_render_lists_every_partition() {
        let report = RunReport::new(
            "r3",
            vec![
                entry(RecordKind::Route, "1", "40", [2, 0, 0, 0]),
                entry(RecordKind::Stop, "2", "", [0, 1, 0, 0]),
            ],
        );
        let rendered = report.render();
        assert!(rendered.contains("Route 1/40: 2 added"));
        assert!(rendered.contains("Stop 2: 0 added, 1 updated"));
        assert!(rendered.contains("Total: 2 added, 1 updated, 0 deleted, 0 resurrected"));
    }

    #[test]
    fn test_zero_count_entry_still_appears() {
        let report = RunReport::new("r4", vec![entry(RecordKind::Route, "3", "9", [0, 0, 0, 0])]);
        assert!(!report.has_changes());
        assert!(report.render().contains("Route 3/9: 0 added"));
    }
}
