//! Local filesystem table store.
//!
//! Each (table, partition) pair is one JSON file holding an array of rows:
//!
//! ```text
//! {root}/tables/{table}/{partition}.json
//! ```
//!
//! Writes are atomic (write to temp, then rename), so a crashed run leaves
//! either the old file or the new file, never a torn one. Missing files
//! read as empty partitions.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{TableRow, TableStore};
use crate::utils::table_key;

/// Filesystem-backed table store.
#[derive(Debug, Clone)]
pub struct LocalTableStore {
    root_dir: PathBuf,
}

impl LocalTableStore {
    /// Create a store rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn table_dir(&self, table: &str) -> PathBuf {
        // table and partition names are sanitized so they are safe as
        // path components on every platform
        self.root_dir.join("tables").join(table_key(table))
    }

    fn partition_path(&self, table: &str, partition: &str) -> PathBuf {
        self.table_dir(table)
            .join(format!("{}.json", table_key(partition)))
    }

    async fn read_rows<T: TableRow>(&self, table: &str, partition: &str) -> Result<Vec<T>> {
        let path = self.partition_path(table, partition);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write a partition file atomically (write to temp, then rename).
    async fn write_rows<T: TableRow>(
        &self,
        table: &str,
        partition: &str,
        rows: &[T],
    ) -> Result<()> {
        let path = self.partition_path(table, partition);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(rows)?;
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl TableStore for LocalTableStore {
    async fn insert<T: TableRow + 'static>(&self, table: &str, rows: &[T]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut by_partition: HashMap<String, Vec<&T>> = HashMap::new();
        for row in rows {
            by_partition
                .entry(row.partition_key())
                .or_default()
                .push(row);
        }

        for (partition, rows) in by_partition {
            let mut stored: Vec<T> = self.read_rows(table, &partition).await?;
            for row in rows {
                let key = row.row_key();
                match stored.iter_mut().find(|r| r.row_key() == key) {
                    Some(slot) => *slot = row.clone(),
                    None => stored.push(row.clone()),
                }
            }
            self.write_rows(table, &partition, &stored).await?;
        }
        Ok(())
    }

    async fn query_partition<T: TableRow + 'static>(
        &self,
        table: &str,
        partition: &str,
    ) -> Result<Vec<T>> {
        self.read_rows(table, partition).await
    }

    async fn partitions(&self, table: &str) -> Result<Vec<String>> {
        let dir = self.table_dir(table);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut partitions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    partitions.push(stem.to_string());
                }
            }
        }
        partitions.sort();
        Ok(partitions)
    }

    async fn delete_partition(&self, table: &str, partition: &str) -> Result<()> {
        let path = self.partition_path(table, partition);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn delete_table(&self, table: &str) -> Result<()> {
        let dir = self.table_dir(table);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}
