//! Caller-to-lane partitioning.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;

use crate::http::CallerId;

/// Index of a worker lane, `0..lane_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaneId(usize);

impl LaneId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lane-{}", self.0)
    }
}

/// Deterministic caller → lane mapping.
///
/// `DefaultHasher::new()` uses fixed keys, so a caller maps to the same lane
/// for the life of the process. The hash is unsigned, so the modulo can never
/// go negative.
#[derive(Debug, Clone, Copy)]
pub struct PartitionRouter {
    lanes: NonZeroUsize,
}

impl PartitionRouter {
    pub fn new(lanes: NonZeroUsize) -> Self {
        Self { lanes }
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.get()
    }

    /// Lane responsible for `caller`.
    pub fn route(&self, caller: &CallerId) -> LaneId {
        let mut hasher = DefaultHasher::new();
        caller.as_str().hash(&mut hasher);
        let index = hasher.finish() % self.lanes.get() as u64;
        LaneId(index as usize)
    }
}
