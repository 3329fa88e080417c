//! Run cleanup.
//!
//! Drops everything a run wrote that is scoped to its run id: the
//! download and diff tables plus the run's bookkeeping partitions. The
//! durable publish tables and publish bookkeeping are left alone; they
//! are the state later runs diff against, not per-run scratch data.

use crate::error::Result;
use crate::models::RecordKind;
use crate::storage::{
    DIFF_METADATA_TABLE, DOWNLOAD_METADATA_TABLE, TableStore, diff_table, download_table,
};

/// Delete a run's download and diff data in bulk.
pub async fn run_purge<S: TableStore>(store: &S, run_id: &str) -> Result<()> {
    for kind in [
        RecordKind::Region,
        RecordKind::Agency,
        RecordKind::Route,
        RecordKind::Stop,
    ] {
        store.delete_table(&download_table(run_id, kind)).await?;
    }
    for kind in [RecordKind::Route, RecordKind::Stop] {
        store.delete_table(&diff_table(run_id, kind)).await?;
    }
    store
        .delete_partition(DOWNLOAD_METADATA_TABLE, run_id)
        .await?;
    store.delete_partition(DIFF_METADATA_TABLE, run_id).await?;

    log::info!("Purged download and diff data for run {run_id}");
    Ok(())
}
