use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
};

use hikari_common::{FileId, UserId};
use hikari_storage::LocalBlockCacheRef;
use hikari_types::block::BlockHandle;

pub type FileHandleRef = Arc<FileHandle>;

/// One logical file: an ordered sequence of sealed blocks.
///
/// The block list is fixed at seal time. Residency is not: it moves
/// under promotion and eviction, so [`is_fully_local`] recomputes from
/// the cache on every call.
///
/// [`is_fully_local`]: FileHandle::is_fully_local
pub struct FileHandle {
    file_id: FileId,
    quota_owner: UserId,
    blocks: Vec<BlockHandle>,
    cache: LocalBlockCacheRef,
}

impl FileHandle {
    pub(crate) fn seal(
        file_id: FileId,
        quota_owner: UserId,
        blocks: Vec<BlockHandle>,
        cache: LocalBlockCacheRef,
    ) -> FileHandleRef {
        Arc::new(Self {
            file_id,
            quota_owner,
            blocks,
            cache,
        })
    }

    pub fn file_id(&self) -> FileId { self.file_id }

    pub fn quota_owner(&self) -> UserId { self.quota_owner }

    pub fn blocks(&self) -> &[BlockHandle] { &self.blocks }

    pub fn length(&self) -> u64 { self.blocks.iter().map(|b| b.length()).sum() }

    /// Snapshot of whole-file cache residency: true iff every block is
    /// locally resident at the instant of the call. Zero-length blocks
    /// count as resident. Re-query after operations that may promote or
    /// evict.
    pub fn is_fully_local(&self) -> bool {
        self.blocks
            .iter()
            .all(|b| b.is_empty() || self.cache.contains(b.block_id()))
    }
}

impl Debug for FileHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FileHandle(file-{}, {} blocks, owner {})",
            self.file_id,
            self.blocks.len(),
            self.quota_owner
        )
    }
}
