pub mod cache;
pub mod err;
pub mod quota;
pub mod under_store;

pub use cache::{Config, Eviction, LocalBlockCache, LocalBlockCacheRef, PinnedBlock, Promotion};
pub use quota::QuotaLedger;
pub use under_store::{ObjectUnderStore, UnderStore, UnderStoreRef};
