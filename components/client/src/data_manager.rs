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

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use hikari_common::{BlockIndex, FileId, UserId};
use hikari_storage::{LocalBlockCacheRef, UnderStoreRef};
use hikari_types::{
    block::{BlockHandle, BlockTier},
    policy::{ReadType, WriteType},
};
use snafu::{ensure, OptionExt};
use tracing::{debug, warn};

use crate::{
    err::{BlockIndexOutOfBoundsSnafu, FetchedLengthMismatchSnafu, Result},
    handle::{FileHandle, FileHandleRef},
    stream::{BlockInStream, EmptyBlockInStream, LocalBlockInStream, RemoteBlockInStream},
    Config,
};

pub type DataManagerRef = Arc<DataManager>;

/// Decides, per open, whether a block read is served from the local
/// cache or the under-store, and owns the write-through path that seeds
/// residency.
pub struct DataManager {
    block_size: usize,
    cache: LocalBlockCacheRef,
    under_store: UnderStoreRef,
    files: DashMap<FileId, FileHandleRef>,
}

impl DataManager {
    pub fn new(
        config: Config,
        cache: LocalBlockCacheRef,
        under_store: UnderStoreRef,
    ) -> DataManagerRef {
        Arc::new(Self {
            block_size: config.block_size,
            cache,
            under_store,
            files: DashMap::new(),
        })
    }

    pub fn cache(&self) -> &LocalBlockCacheRef { &self.cache }

    /// Seal `content` into blocks owned by `owner`.
    ///
    /// [`WriteType::CacheThrough`] persists every block to the
    /// under-store and caches opportunistically: a quota rejection only
    /// costs locality. [`WriteType::MustCache`] keeps the bytes in cache
    /// alone, so there a quota rejection fails the write.
    pub async fn create_file(
        &self,
        owner: UserId,
        content: &[u8],
        write_type: WriteType,
    ) -> Result<FileHandleRef> {
        let file_id = hikari_utils::random_id();
        let mut blocks = Vec::new();
        if content.is_empty() {
            // an empty file still carries one sealed zero-length block
            blocks.push(BlockHandle::seal(hikari_utils::random_id(), file_id, 0));
        }
        for chunk in content.chunks(self.block_size) {
            let handle =
                BlockHandle::seal(hikari_utils::random_id(), file_id, chunk.len() as u64);
            let data = Bytes::copy_from_slice(chunk);
            if write_type.is_through() {
                self.under_store.put(handle.block_id(), data.clone()).await?;
            }
            match self.cache.promote(&handle, data, owner) {
                Ok(_) => {}
                Err(e) if e.is_quota_exceeded() && !write_type.must_cache() => {
                    warn!("leaving {} uncached: {}", handle, e);
                }
                Err(e) => return Err(e.into()),
            }
            blocks.push(handle);
        }
        let file = FileHandle::seal(file_id, owner, blocks, self.cache.clone());
        debug!("sealed {:?} ({} bytes)", file, content.len());
        self.files.insert(file_id, file.clone());
        Ok(file)
    }

    pub fn open_file(&self, file_id: FileId) -> Option<FileHandleRef> {
        self.files.get(&file_id).map(|f| f.value().clone())
    }

    /// Open a read stream over one block of `file`.
    ///
    /// The variant decision happens here, once: zero-length blocks read
    /// as [`BlockInStream::Empty`]; a resident block is pinned (atomic
    /// with the residency check) and reads as [`BlockInStream::Local`];
    /// otherwise the under-store produces the bytes and the read
    /// proceeds as [`BlockInStream::Remote`]. A remote read under
    /// [`ReadType::Cache`] also promotes the fetched bytes; a quota
    /// rejection is logged and the read simply stays uncached.
    pub async fn open_block_stream(
        &self,
        file: &FileHandle,
        block_index: BlockIndex,
        read_type: ReadType,
    ) -> Result<BlockInStream> {
        let handle = file
            .blocks()
            .get(block_index)
            .copied()
            .context(BlockIndexOutOfBoundsSnafu {
                index: block_index,
                blocks: file.blocks().len(),
            })?;

        if handle.is_empty() {
            return Ok(BlockInStream::Empty(EmptyBlockInStream::new()));
        }
        if let Some(pinned) = self.cache.get(handle.block_id()) {
            return Ok(BlockInStream::Local(LocalBlockInStream::new(pinned)));
        }

        let data = self.under_store.fetch(handle.block_id()).await?;
        ensure!(
            data.len() as u64 == handle.length(),
            FetchedLengthMismatchSnafu {
                block_id: handle.block_id(),
                expected: handle.length(),
                actual: data.len() as u64,
            }
        );
        if read_type.should_cache() {
            match self.cache.promote(&handle, data.clone(), file.quota_owner()) {
                Ok(outcome) => debug!("promoted {}: {:?}", handle, outcome),
                Err(e) if e.is_quota_exceeded() => {
                    warn!("read of {} proceeds uncached: {}", handle, e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(BlockInStream::Remote(RemoteBlockInStream::new(data)))
    }

    /// Where the block's bytes currently live. Zero-length blocks are
    /// trivially local.
    pub async fn tier_of(&self, handle: &BlockHandle) -> Result<BlockTier> {
        if handle.is_empty() || self.cache.contains(handle.block_id()) {
            return Ok(BlockTier::Local);
        }
        if self.under_store.contains(handle.block_id()).await? {
            Ok(BlockTier::Remote)
        } else {
            Ok(BlockTier::Unresident)
        }
    }
}
