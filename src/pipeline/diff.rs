//! Snapshot diffing.
//!
//! Compares the current download snapshot of one partition against the
//! previously published snapshot and splits the result into four disjoint
//! sets: created, updated, deleted, resurrected. Records matched by
//! identity key with equal content fingerprints emit nothing.
//!
//! The engine is pure: no I/O, no retries, and re-running it over the same
//! two snapshots produces the same output.

use std::collections::{HashMap, HashSet};

use crate::models::{DiffMetadata, DiffRecord, Observation, RecordKind, RowState, transition};

/// Identity and content extraction for one record kind, passed to the
/// engine as an explicit strategy.
pub struct DiffKeys<T> {
    /// Stable natural key correlating the same logical entity across runs
    pub identity_key: fn(&T) -> String,
    /// Digest of the fields the publisher renders
    pub fingerprint: fn(&T) -> u64,
}

/// The four change sets produced by diffing one (kind, partition) pair.
#[derive(Debug, Clone)]
pub struct DiffOutput<T> {
    pub created: Vec<T>,
    pub updated: Vec<T>,
    pub deleted: Vec<T>,
    pub resurrected: Vec<T>,
}

impl<T> Default for DiffOutput<T> {
    fn default() -> Self {
        DiffOutput {
            created: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            resurrected: Vec::new(),
        }
    }
}

impl<T> DiffOutput<T> {
    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }

    pub fn change_count(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len() + self.resurrected.len()
    }

    /// Bookkeeping row summarizing this output.
    pub fn metadata(
        &self,
        kind: RecordKind,
        region_id: &str,
        agency_id: &str,
        run_id: &str,
    ) -> DiffMetadata {
        DiffMetadata {
            run_id: run_id.to_string(),
            region_id: region_id.to_string(),
            agency_id: agency_id.to_string(),
            kind,
            added: self.created.len(),
            updated: self.updated.len(),
            deleted: self.deleted.len(),
            resurrected: self.resurrected.len(),
        }
    }
}

/// Diff a current download snapshot against the previously published one.
///
/// Classification per identity key, relative to the published record:
/// - absent from published: `Create`
/// - published live, absent from current: `Delete`
/// - published `Delete`, present in current: `Resurrect`, even when the
///   content also changed
/// - published live, present with a different fingerprint: `Update`
/// - published `Delete`, still absent: nothing; it is not deleted again
/// - published live, present with an equal fingerprint: nothing
///
/// Created, updated, and resurrected records are taken from `current`;
/// deleted records are taken from `previous`.
///
/// # Panics
///
/// Panics when a record has an empty identity key or a snapshot contains
/// two records with the same identity key. Both indicate a caller bug, not
/// a condition to retry.
pub fn diff_snapshots<T: DiffRecord + Clone>(
    current: Vec<T>,
    previous: Vec<T>,
    keys: &DiffKeys<T>,
) -> DiffOutput<T> {
    let mut current = index_by_identity(current, keys, "current");
    let mut previous = index_by_identity(previous, keys, "previous");

    // Most content does not change between runs, so first drop the records
    // whose fingerprint already appears in the live published set. The
    // fingerprint covers the identity key, so an equal fingerprint means
    // the same record with the same published content; removal is by
    // identity key. This step only shrinks the work below, it never
    // changes the classification.
    let published_fingerprints: HashSet<u64> = previous
        .values()
        .filter(|record| !record.state().is_delete())
        .map(|record| (keys.fingerprint)(record))
        .collect();
    let unchanged_keys: Vec<String> = current
        .iter()
        .filter(|&(_, record)| published_fingerprints.contains(&(keys.fingerprint)(record)))
        .map(|(key, _)| key.clone())
        .collect();
    for key in &unchanged_keys {
        current.remove(key);
        previous.remove(key);
    }

    let mut output = DiffOutput::default();

    for (key, mut record) in current {
        let published = previous.remove(&key);
        let previous_state = published.as_ref().map(|p| p.state());
        let observation = match &published {
            Some(p) if (keys.fingerprint)(p) == (keys.fingerprint)(&record) => {
                Observation::Unchanged
            }
            _ => Observation::Changed,
        };

        match transition(previous_state, observation) {
            Some(state @ (RowState::Create | RowState::Update | RowState::Resurrect)) => {
                record.set_state(state);
                match state {
                    RowState::Create => output.created.push(record),
                    RowState::Update => output.updated.push(record),
                    RowState::Resurrect => output.resurrected.push(record),
                    _ => unreachable!(),
                }
            }
            Some(_) => unreachable!("observed records never transition to Delete"),
            None => {}
        }
    }

    // whatever is left in previous was not observed this run
    for (_, mut record) in previous {
        if transition(Some(record.state()), Observation::Missing) == Some(RowState::Delete) {
            record.set_state(RowState::Delete);
            output.deleted.push(record);
        }
    }

    output
}

fn index_by_identity<T>(
    records: Vec<T>,
    keys: &DiffKeys<T>,
    side: &str,
) -> HashMap<String, T> {
    let mut indexed = HashMap::with_capacity(records.len());
    for record in records {
        let key = (keys.identity_key)(&record);
        assert!(!key.is_empty(), "{side} snapshot record has an empty identity key");
        if indexed.insert(key.clone(), record).is_some() {
            panic!("duplicate identity key {key} in {side} snapshot");
        }
    }
    indexed
}
