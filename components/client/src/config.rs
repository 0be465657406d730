use hikari_common::BLOCK_SIZE;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Files are split into blocks of this size at write time; the last
    /// block of a file may be shorter.
    pub block_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE, // 4MiB
        }
    }
}
