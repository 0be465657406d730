use serde::{Deserialize, Serialize};

/// Whether a read of a non-resident block should promote it into the
/// local cache. Decided per open, never re-evaluated mid-stream.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ReadType {
    /// Never promote; the cache state is left untouched.
    NoCache,
    /// Promote fetched bytes into the local cache, quota permitting.
    Cache,
}

impl ReadType {
    pub fn should_cache(&self) -> bool { matches!(self, ReadType::Cache) }
}

/// Where freshly written blocks land.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum WriteType {
    /// Cache only; failing to cache fails the write.
    MustCache,
    /// Persist to the under-store and cache opportunistically.
    CacheThrough,
}

impl WriteType {
    pub fn must_cache(&self) -> bool { matches!(self, WriteType::MustCache) }

    pub fn is_through(&self) -> bool { matches!(self, WriteType::CacheThrough) }
}
