//! Keyed table storage for download, diff, and publish data.
//!
//! Every record lives in a (table, partition, row key) coordinate, mirroring
//! a partition/row-keyed table service. Download and diff tables are scoped
//! to a run id so a run's data can be dropped in bulk; publish tables and
//! the metadata tables are durable across runs.
//!
//! ## Table layout
//!
//! ```text
//! download{run_id}_routes     per-run download snapshot, one table per kind
//! diff{run_id}_routes         per-run diff output, routes and stops only
//! publish_routes              durable last-published snapshot
//! downloadmetadata            bookkeeping, partitioned by run id
//! diffmetadata                bookkeeping, partitioned by run id
//! publishmetadata             bookkeeping, partitioned by run id
//! ```

pub mod local;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::models::RecordKind;

// Re-export for convenience
pub use local::LocalTableStore;

/// Bookkeeping table for download activity, partitioned by run id.
pub const DOWNLOAD_METADATA_TABLE: &str = "downloadmetadata";

/// Bookkeeping table for diff activity, partitioned by run id.
pub const DIFF_METADATA_TABLE: &str = "diffmetadata";

/// Bookkeeping table for publish activity, partitioned by run id.
pub const PUBLISH_METADATA_TABLE: &str = "publishmetadata";

/// Name of the download table for one kind in one run.
pub fn download_table(run_id: &str, kind: RecordKind) -> String {
    format!("download{}_{}", run_id, kind.table_suffix())
}

/// Name of the diff table for one kind in one run.
pub fn diff_table(run_id: &str, kind: RecordKind) -> String {
    format!("diff{}_{}", run_id, kind.table_suffix())
}

/// Name of the durable publish table for one kind.
pub fn publish_table(kind: RecordKind) -> String {
    format!("publish_{}", kind.table_suffix())
}

/// A record that knows its own storage coordinates.
pub trait TableRow: Clone + Send + Sync + Serialize + DeserializeOwned {
    /// Partition the row belongs to. Workers never share a partition, so
    /// concurrent writers never target the same partition.
    fn partition_key(&self) -> String;

    /// Key unique within the partition. Inserting a row with an existing
    /// row key replaces the stored row.
    fn row_key(&self) -> String;
}

/// Trait for keyed table storage backends.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Insert rows, replacing any stored row with an equal row key.
    async fn insert<T: TableRow + 'static>(&self, table: &str, rows: &[T]) -> Result<()>;

    /// Read every row in one partition. A missing table or partition reads
    /// as empty.
    async fn query_partition<T: TableRow + 'static>(
        &self,
        table: &str,
        partition: &str,
    ) -> Result<Vec<T>>;

    /// List the partitions present in a table.
    async fn partitions(&self, table: &str) -> Result<Vec<String>>;

    /// Delete one partition. Deleting a missing partition is a no-op.
    async fn delete_partition(&self, table: &str, partition: &str) -> Result<()>;

    /// Delete a whole table. Deleting a missing table is a no-op.
    async fn delete_table(&self, table: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert_eq!(
            download_table("20260805120000000", RecordKind::Route),
            "download20260805120000000_routes"
        );
        assert_eq!(
            diff_table("20260805120000000", RecordKind::Stop),
            "diff20260805120000000_stops"
        );
        assert_eq!(publish_table(RecordKind::Route), "publish_routes");
    }
}
