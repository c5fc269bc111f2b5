//! Lifecycle state filtering
//!
//! Applied after all pages are accumulated, so the fetch layer can serve both
//! the "everything" and "running only" views.

use super::record::ResourceRecord;
use super::registry::ResourceFamily;

/// Which lifecycle states to keep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateFilter {
    pub include_terminated: bool,
    pub running_only: bool,
}

impl StateFilter {
    pub fn new(include_terminated: bool, running_only: bool) -> Self {
        Self {
            include_terminated,
            running_only,
        }
    }

    pub fn running() -> Self {
        Self::new(false, true)
    }

    /// Whether `record` survives. Families without a lifecycle keep everything.
    pub fn keeps(&self, family: &ResourceFamily, record: &ResourceRecord) -> bool {
        let Some(lifecycle) = &family.lifecycle else {
            return true;
        };

        let state = record.get_str(&lifecycle.state_path);

        if self.running_only {
            return state.is_some_and(|s| lifecycle.active.iter().any(|a| a == s));
        }

        self.include_terminated || state != Some(lifecycle.terminal.as_str())
    }

    pub fn apply(&self, family: &ResourceFamily, records: Vec<ResourceRecord>) -> Vec<ResourceRecord> {
        if family.lifecycle.is_none() {
            return records;
        }

        let before = records.len();
        let kept: Vec<ResourceRecord> = records
            .into_iter()
            .filter(|r| self.keeps(family, r))
            .collect();

        tracing::debug!(
            "state filter on {}: kept {} of {} ({:?})",
            family.key,
            kept.len(),
            before,
            self
        );
        kept
    }
}
