use std::collections::HashMap;

use crate::foundation::core::{Position, ProcessId};

/// Per-process spatial anchors, keyed by rank.
///
/// Entries are inserted or overwritten; there is no removal. Completeness for a given group
/// size is not enforced here, it is checked when an order is computed.
#[derive(Clone, Debug, Default)]
pub struct CentroidRegistry {
    anchors: HashMap<ProcessId, Position>,
}

impl CentroidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the anchor for `id`.
    pub fn set_centroid(&mut self, id: ProcessId, position: Position) {
        self.anchors.insert(id, position);
    }

    /// Register anchors for ranks `0..n` in sequence.
    pub fn set_centroids<I>(&mut self, positions: I)
    where
        I: IntoIterator<Item = Position>,
    {
        for (i, p) in positions.into_iter().enumerate() {
            self.set_centroid(ProcessId(i as u32), p);
        }
    }

    pub fn get(&self, id: ProcessId) -> Option<Position> {
        self.anchors.get(&id).copied()
    }

    pub fn contains(&self, id: ProcessId) -> bool {
        self.anchors.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// First rank in `[0, group_size)` without an anchor, if any.
    pub fn first_missing(&self, group_size: u32) -> Option<ProcessId> {
        (0..group_size)
            .map(ProcessId)
            .find(|id| !self.contains(*id))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/registry/centroids.rs"]
mod tests;
