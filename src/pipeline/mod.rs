//! Pipeline stages for one sync run.
//!
//! - `run_download`: fetch the upstream catalog into the run's download tables
//! - `run_diff`: compare the download against the last published snapshot
//! - `run_publish`: apply the tagged diff to the discussion platform
//! - `run_purge`: drop a run's download and diff data in bulk

pub mod diff;
pub mod diff_run;
pub mod download;
pub mod publish;
pub mod purge;

pub use diff::{DiffKeys, DiffOutput, diff_snapshots};
pub use diff_run::{DiffPartition, run_diff};
pub use download::run_download;
pub use publish::run_publish;
pub use purge::run_purge;
