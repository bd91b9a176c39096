//! The executable stage graph: construction, worker pool wiring, and
//! execution/cancellation.

pub mod builder;
pub mod runtime;
pub mod worker;

pub use runtime::Pipeline;

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::stage::{Stage, StageId};

/// `(stageId, itemId) -> seen` dedup set, consulted by every stage worker
/// before it processes an item. Read-heavy; the fast path is a read-lock.
#[derive(Default)]
pub struct ProcessedSet {
    seen: RwLock<std::collections::HashSet<(StageId, String)>>,
}

impl ProcessedSet {
    /// Returns `true` if this is the first time `(stage_id, item_id)` has
    /// been seen (and records it), `false` if it was already present.
    pub fn mark_if_new(&self, stage_id: &str, item_id: &str) -> bool {
        {
            let seen = self.seen.read();
            if seen.contains(&(stage_id.to_string(), item_id.to_string())) {
                return false;
            }
        }
        let mut seen = self.seen.write();
        seen.insert((stage_id.to_string(), item_id.to_string()))
    }
}

pub type StageMap = HashMap<StageId, Stage>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_if_new_is_true_only_once_per_stage_and_item() {
        let seen = ProcessedSet::default();
        assert!(seen.mark_if_new("fetch", "item-1"));
        assert!(!seen.mark_if_new("fetch", "item-1"));
    }

    #[test]
    fn same_item_id_is_independent_per_stage() {
        let seen = ProcessedSet::default();
        assert!(seen.mark_if_new("fetch", "item-1"));
        assert!(seen.mark_if_new("extract", "item-1"));
    }
}
