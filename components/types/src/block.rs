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

use std::fmt::{Display, Formatter};

use hikari_common::{BlockId, FileId};
use serde::{Deserialize, Serialize};

/// Identity and immutable metadata of one sealed block.
///
/// The length is fixed at seal time and never changes. Where the
/// block's bytes currently live is not part of the handle, residency
/// moves under promotion and eviction; query [`BlockTier`] for it.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockHandle {
    block_id: BlockId,
    file_id: FileId,
    length: u64,
}

impl BlockHandle {
    pub fn seal(block_id: BlockId, file_id: FileId, length: u64) -> Self {
        Self {
            block_id,
            file_id,
            length,
        }
    }

    pub fn block_id(&self) -> BlockId { self.block_id }

    pub fn file_id(&self) -> FileId { self.file_id }

    pub fn length(&self) -> u64 { self.length }

    /// A zero-length block is a permanent special case, it never
    /// occupies cache space and always reads as end-of-stream.
    pub fn is_empty(&self) -> bool { self.length == 0 }
}

impl Display for BlockHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "block-{}(file-{}, {}B)",
            self.block_id, self.file_id, self.length
        )
    }
}

/// Where a block's bytes currently live.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum BlockTier {
    /// Resident in the local block cache.
    Local,
    /// Only in the under-store.
    Remote,
    /// Neither locally cached nor known to the under-store.
    Unresident,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_metadata() {
        let handle = BlockHandle::seal(7, 3, 128);
        assert_eq!(handle.block_id(), 7);
        assert_eq!(handle.file_id(), 3);
        assert_eq!(handle.length(), 128);
        assert!(!handle.is_empty());
        assert!(BlockHandle::seal(8, 3, 0).is_empty());
    }
}
