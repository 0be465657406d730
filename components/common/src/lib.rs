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

// The unit of caching: blocks are sealed at this size, except the
// last block of a file which may be shorter.
pub const BLOCK_SIZE: usize = 4 << 20; // 4 MiB

// Per-user ceiling on bytes resident in the local cache. One unit size
// applied uniformly to every user; not tunable per file.
pub const DEFAULT_QUOTA_UNIT_BYTES: u64 = 512 << 20; // 512 MiB

pub const HIKARI_SERVER_CONF_DIR_ENV: &str = "HIKARI_SERVER_CONF_DIR";
pub const HIKARI_CLIENT_CONF_DIR_ENV: &str = "HIKARI_CLIENT_CONF_DIR";

pub type BlockId = u64;
pub type FileId = u64;
pub type UserId = u32;
pub type BlockIndex = usize;
