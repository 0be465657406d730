use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use hikari_common::BlockId;
use object_store::ObjectStore;
use hikari_utils::object_storage::{
    is_not_found_error, new_memory_object_store, ObjectStorage, ObjectStoragePath,
};
use snafu::ResultExt;

use crate::err::{BlockNotFoundSnafu, Result, UnderStoreFetchSnafu, UnderStorePutSnafu};

pub type UnderStoreRef = Arc<dyn UnderStore>;

/// The persistent tier below the cache.
///
/// The read path only relies on `fetch` returning the full byte
/// sequence of a sealed block, or failing; `put` serves the
/// write-through path that seeds residency before reads begin.
#[async_trait]
pub trait UnderStore: Send + Sync + Debug + 'static {
    async fn fetch(&self, block_id: BlockId) -> Result<Bytes>;

    async fn contains(&self, block_id: BlockId) -> Result<bool>;

    async fn put(&self, block_id: BlockId, data: Bytes) -> Result<()>;
}

/// Object-storage backed under-store, one object per sealed block.
pub struct ObjectUnderStore {
    storage: ObjectStorage,
}

impl Debug for ObjectUnderStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectUnderStore")
    }
}

impl ObjectUnderStore {
    pub fn new(storage: ObjectStorage) -> UnderStoreRef { Arc::new(Self { storage }) }

    pub fn new_memory() -> UnderStoreRef { Self::new(new_memory_object_store()) }

    fn block_path(block_id: BlockId) -> ObjectStoragePath {
        ObjectStoragePath::from(format!("blocks/{}", block_id))
    }
}

#[async_trait]
impl UnderStore for ObjectUnderStore {
    async fn fetch(&self, block_id: BlockId) -> Result<Bytes> {
        let path = Self::block_path(block_id);
        let result = match self.storage.get(&path).await {
            Ok(r) => r,
            Err(e) if is_not_found_error(&e) => {
                return BlockNotFoundSnafu { block_id }.fail();
            }
            Err(e) => return Err(e).context(UnderStoreFetchSnafu { block_id }),
        };
        result
            .bytes()
            .await
            .context(UnderStoreFetchSnafu { block_id })
    }

    async fn contains(&self, block_id: BlockId) -> Result<bool> {
        match self.storage.head(&Self::block_path(block_id)).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found_error(&e) => Ok(false),
            Err(e) => Err(e).context(UnderStoreFetchSnafu { block_id }),
        }
    }

    async fn put(&self, block_id: BlockId, data: Bytes) -> Result<()> {
        self.storage
            .put(&Self::block_path(block_id), data)
            .await
            .context(UnderStorePutSnafu { block_id })?;
        Ok(())
    }
}
