// Copyright 2026 hikari-fs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    collections::HashMap,
    fmt::{Debug, Formatter},
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use hikari_common::{BlockId, UserId, DEFAULT_QUOTA_UNIT_BYTES};
use hikari_types::block::BlockHandle;
use hikari_utils::readable_size::ReadableSize;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    err::{BlockLengthMismatchSnafu, Result},
    quota::QuotaLedger,
};

/// Which entries the cache may remove under pressure.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Eviction {
    /// Never evict; a full cache rejects promotions outright.
    Disable,
    /// Evict unpinned entries in least-recently-used order, ties broken
    /// by insertion order (oldest first).
    LeastRecentlyUsed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Per-user cache quota, one unit applied uniformly.
    pub quota_unit: ReadableSize,
    pub eviction: Eviction,
    /// When set, eviction may remove other users' entries as well.
    pub evict_any_owner: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quota_unit: ReadableSize(DEFAULT_QUOTA_UNIT_BYTES),
            eviction: Eviction::LeastRecentlyUsed,
            evict_any_owner: false,
        }
    }
}

/// Outcome of a committed promotion attempt.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Promotion {
    Promoted,
    /// Lost a race against a concurrent promotion of the same block;
    /// the winner's bytes are the ones served.
    AlreadyResident,
}

struct CacheEntry {
    data: Bytes,
    owner: UserId,
    // an entry with pin_count > 0 is never evicted or removed
    pin_count: u32,
    last_access: u64,
    insert_seq: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<BlockId, CacheEntry>,
    // logical clock for recency; bumped on every pinning lookup
    clock: u64,
    next_seq: u64,
}

impl CacheInner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn pick_victim(&self, owner: UserId, any_owner: bool) -> Option<BlockId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.pin_count == 0 && (any_owner || e.owner == owner))
            .min_by_key(|(_, e)| (e.last_access, e.insert_seq))
            .map(|(id, _)| *id)
    }
}

pub type LocalBlockCacheRef = Arc<LocalBlockCache>;

/// The in-memory block tier.
///
/// Holds fully materialized block buffers, keyed by block id. All
/// mutation goes through [`promote`], [`evict`] and [`remove`]; a
/// resident buffer is immutable and never partially visible. Open
/// streams pin their entry, and pinned entries outlive any eviction
/// decision.
///
/// [`promote`]: LocalBlockCache::promote
/// [`evict`]: LocalBlockCache::evict
/// [`remove`]: LocalBlockCache::remove
pub struct LocalBlockCache {
    eviction: Eviction,
    evict_any_owner: bool,
    ledger: QuotaLedger,
    inner: Arc<Mutex<CacheInner>>,
}

impl Debug for LocalBlockCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocalBlockCache")
    }
}

impl LocalBlockCache {
    pub fn new(config: Config) -> LocalBlockCacheRef {
        debug!(
            "create local block cache, quota unit {}, eviction {:?}",
            config.quota_unit, config.eviction
        );
        Arc::new(Self {
            eviction: config.eviction,
            evict_any_owner: config.evict_any_owner,
            ledger: QuotaLedger::new(config.quota_unit),
            inner: Arc::new(Mutex::new(CacheInner::default())),
        })
    }

    /// Look up a resident block and pin it, as one atomic step relative
    /// to concurrent eviction. The returned guard releases the pin
    /// exactly once when dropped.
    pub fn get(&self, block_id: BlockId) -> Option<PinnedBlock> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let tick = inner.tick();
        let entry = inner.entries.get_mut(&block_id)?;
        entry.pin_count += 1;
        entry.last_access = tick;
        Some(PinnedBlock {
            inner: self.inner.clone(),
            block_id,
            data: entry.data.clone(),
        })
    }

    pub fn contains(&self, block_id: BlockId) -> bool {
        let inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.contains_key(&block_id)
    }

    /// Commit fully materialized block bytes as a new cache entry,
    /// reserving their length against `owner`'s quota first and evicting
    /// if the reservation needs room.
    ///
    /// Either the whole block becomes resident or nothing does: a failed
    /// reservation leaves no partial state, and losing a race against a
    /// concurrent promotion of the same block returns
    /// [`Promotion::AlreadyResident`] with the reservation rolled back.
    /// Zero-length blocks never occupy cache space and commit trivially.
    pub fn promote(
        &self,
        handle: &BlockHandle,
        data: Bytes,
        owner: UserId,
    ) -> Result<Promotion> {
        snafu::ensure!(
            data.len() as u64 == handle.length(),
            BlockLengthMismatchSnafu {
                block_id: handle.block_id(),
                expected: handle.length(),
                actual: data.len() as u64,
            }
        );
        if handle.is_empty() {
            return Ok(Promotion::AlreadyResident);
        }
        let block_id = handle.block_id();
        if self.contains(block_id) {
            return Ok(Promotion::AlreadyResident);
        }

        let len = handle.length();
        if let Err(first) = self.ledger.reserve(owner, len) {
            if matches!(self.eviction, Eviction::Disable) {
                return Err(first);
            }
            let shortfall = len.saturating_sub(self.ledger.available(owner));
            let freed = self.evict(shortfall, owner);
            debug!(
                "cache pressure for {}: freed {} of {} wanted bytes",
                handle, freed, shortfall
            );
            self.ledger.reserve(owner, len)?;
        }
        // roll the reservation back unless the entry commits below
        let reservation = scopeguard::guard((), |_| self.ledger.release(owner, len));

        let mut inner = self.inner.lock().expect("cache lock poisoned");
        if inner.entries.contains_key(&block_id) {
            return Ok(Promotion::AlreadyResident);
        }
        let tick = inner.tick();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            block_id,
            CacheEntry {
                data,
                owner,
                pin_count: 0,
                last_access: tick,
                insert_seq: seq,
            },
        );
        scopeguard::ScopeGuard::into_inner(reservation);
        Ok(Promotion::Promoted)
    }

    /// Remove unpinned entries until `bytes_needed` is freed or nothing
    /// evictable remains, returning the bytes actually freed. Freed
    /// bytes are released back to the owning users' quota.
    pub fn evict(&self, bytes_needed: u64, owner: UserId) -> u64 {
        if matches!(self.eviction, Eviction::Disable) {
            return 0;
        }
        let mut freed = 0u64;
        let mut evicted = Vec::new();
        {
            let mut inner = self.inner.lock().expect("cache lock poisoned");
            while freed < bytes_needed {
                let victim = match inner.pick_victim(owner, self.evict_any_owner) {
                    Some(id) => id,
                    None => break,
                };
                let entry = inner
                    .entries
                    .remove(&victim)
                    .expect("victim vanished under the cache lock");
                freed += entry.data.len() as u64;
                evicted.push((victim, entry.owner, entry.data.len() as u64));
            }
        }
        for (block_id, entry_owner, len) in evicted {
            debug!("evicted block {} ({} bytes)", block_id, len);
            self.ledger.release(entry_owner, len);
        }
        freed
    }

    /// Explicitly drop an unpinned entry. Returns false when the block
    /// is absent or currently pinned by an open stream.
    pub fn remove(&self, block_id: BlockId) -> bool {
        let removed = {
            let mut inner = self.inner.lock().expect("cache lock poisoned");
            match inner.entries.get(&block_id) {
                Some(e) if e.pin_count == 0 => inner.entries.remove(&block_id),
                Some(_) => {
                    warn!("refusing to remove pinned block {}", block_id);
                    None
                }
                None => None,
            }
        };
        match removed {
            Some(entry) => {
                self.ledger
                    .release(entry.owner, entry.data.len() as u64);
                true
            }
            None => false,
        }
    }

    pub fn entry_count(&self) -> usize {
        let inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.len()
    }

    pub fn used_bytes(&self, owner: UserId) -> u64 { self.ledger.used(owner) }

    pub fn ledger(&self) -> &QuotaLedger { &self.ledger }
}

/// A pinned, non-owning view of a resident block.
///
/// Holding one guarantees the entry is neither evicted nor removed.
/// The pin is released exactly once, on drop, which also covers error
/// paths that abandon a stream without closing it.
pub struct PinnedBlock {
    inner: Arc<Mutex<CacheInner>>,
    block_id: BlockId,
    data: Bytes,
}

impl PinnedBlock {
    pub fn block_id(&self) -> BlockId { self.block_id }

    pub fn data(&self) -> &Bytes { &self.data }

    pub fn len(&self) -> usize { self.data.len() }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }
}

impl Debug for PinnedBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PinnedBlock({}, {}B)", self.block_id, self.data.len())
    }
}

impl Drop for PinnedBlock {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(entry) = inner.entries.get_mut(&self.block_id) {
                entry.pin_count = entry.pin_count.saturating_sub(1);
            }
        }
    }
}
