//! Row lifecycle states and the transition rules the diff stage applies.
//!
//! Every record in the download, diff, and publish tables carries a
//! [`RowState`]. Raw downloads are always `Default`; the diff stage assigns
//! the other four states and the publish stage switches on them to pick a
//! platform action.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reflects the state of a row in the download, diff, or publish tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RowState {
    /// Used only in the download tables; carries no special meaning.
    #[default]
    Default,

    /// In the diff tables, a new route or stop that needs a topic created.
    /// In the publish tables, a topic that has been created.
    Create,

    /// In the diff tables, a route or stop whose details changed.
    /// In the publish tables, a topic that has been updated.
    Update,

    /// In the diff tables, a route or stop that disappeared upstream.
    /// In the publish tables, a topic relabeled to show it is gone.
    Delete,

    /// In the diff tables, a route or stop that reappeared upstream.
    /// In the publish tables, a topic restored after a deletion.
    Resurrect,
}

impl RowState {
    pub fn as_str(self) -> &'static str {
        match self {
            RowState::Default => "Default",
            RowState::Create => "Create",
            RowState::Update => "Update",
            RowState::Delete => "Delete",
            RowState::Resurrect => "Resurrect",
        }
    }

    pub fn is_delete(self) -> bool {
        self == RowState::Delete
    }
}

impl fmt::Display for RowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that carries a lifecycle state the diff engine can read and tag.
pub trait DiffRecord {
    fn state(&self) -> RowState;
    fn set_state(&mut self, state: RowState);
}

/// What one run observed for a single identity key, relative to the
/// previously published record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Present in the current download with an equal content fingerprint.
    Unchanged,
    /// Present in the current download with a different content fingerprint.
    Changed,
    /// Absent from the current download.
    Missing,
}

/// Next lifecycle state for a record, given its previously published state
/// (`None` if the key was never published) and this run's observation.
///
/// `None` means the record emits nothing this run: either nothing changed,
/// or it is already recorded as deleted and is still gone. There is no
/// terminal state; a key can cycle between `Delete` and the live states for
/// as long as the upstream keeps discontinuing and reinstating it.
pub fn transition(previous: Option<RowState>, observation: Observation) -> Option<RowState> {
    match (previous, observation) {
        // never seen before, now observed
        (None, Observation::Unchanged | Observation::Changed) => Some(RowState::Create),
        (None, Observation::Missing) => None,

        // previously deleted: reappearance wins regardless of content
        (Some(RowState::Delete), Observation::Unchanged | Observation::Changed) => {
            Some(RowState::Resurrect)
        }
        (Some(RowState::Delete), Observation::Missing) => None,

        // previously live
        (Some(_), Observation::Changed) => Some(RowState::Update),
        (Some(_), Observation::Missing) => Some(RowState::Delete),
        (Some(_), Observation::Unchanged) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_creates() {
        assert_eq!(
            transition(None, Observation::Unchanged),
            Some(RowState::Create)
        );
        assert_eq!(
            transition(None, Observation::Changed),
            Some(RowState::Create)
        );
    }

    #[test]
    fn test_live_states_update_on_change() {
        for previous in [RowState::Create, RowState::Update, RowState::Resurrect] {
            assert_eq!(
                transition(Some(previous), Observation::Changed),
                Some(RowState::Update)
            );
        }
    }

    #[test]
    fn test_live_states_delete_when_missing() {
        for previous in [RowState::Create, RowState::Update, RowState::Resurrect] {
            assert_eq!(
                transition(Some(previous), Observation::Missing),
                Some(RowState::Delete)
            );
        }
    }

    #[test]
    fn test_unchanged_live_record_emits_nothing() {
        for previous in [RowState::Create, RowState::Update, RowState::Resurrect] {
            assert_eq!(transition(Some(previous), Observation::Unchanged), None);
        }
    }

    #[test]
    fn test_deleted_record_resurrects_even_when_changed() {
        assert_eq!(
            transition(Some(RowState::Delete), Observation::Unchanged),
            Some(RowState::Resurrect)
        );
        // resurrection takes precedence over update
        assert_eq!(
            transition(Some(RowState::Delete), Observation::Changed),
            Some(RowState::Resurrect)
        );
    }

    #[test]
    fn test_deleted_record_is_not_deleted_again() {
        assert_eq!(transition(Some(RowState::Delete), Observation::Missing), None);
    }

    #[test]
    fn test_state_round_trips_through_its_name() {
        assert_eq!(RowState::Resurrect.as_str(), "Resurrect");
        assert_eq!(RowState::Resurrect.to_string(), "Resurrect");
        assert!(RowState::Delete.is_delete());
        assert!(!RowState::Update.is_delete());
    }
}
