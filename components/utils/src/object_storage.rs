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

use std::{path::Path, sync::Arc};

use object_store::ObjectStore;

pub type ObjectStorage = Arc<dyn ObjectStore>;

pub type ObjectStorageError = object_store::Error;

pub type ObjectStoragePath = object_store::path::Path;

pub fn is_not_found_error(e: &ObjectStorageError) -> bool {
    matches!(e, ObjectStorageError::NotFound { .. })
}

pub fn new_memory_object_store() -> ObjectStorage {
    Arc::new(object_store::memory::InMemory::new())
}

pub fn new_local_object_store<P: AsRef<Path>>(
    path: P,
) -> Result<ObjectStorage, ObjectStorageError> {
    let path = path.as_ref();
    std::fs::create_dir_all(path).map_err(|source| ObjectStorageError::Generic {
        store: "LocalFileSystem",
        source: Box::new(source),
    })?;
    let object_sto: Arc<dyn ObjectStore> = Arc::new(
        object_store::local::LocalFileSystem::new_with_prefix(path)?,
    );
    Ok(object_sto)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use object_store::path::Path;

    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let object_sto = new_memory_object_store();

        let bytes = Bytes::from_static(b"hello");
        let path = Path::from("data/small_file");
        object_sto.put(&path, bytes).await.unwrap();

        let got = object_sto.get(&path).await.unwrap();
        let result = got.bytes().await.unwrap();
        assert_eq!(result.as_ref(), b"hello".as_slice());

        let missing = object_sto.get(&Path::from("data/other")).await;
        assert!(matches!(missing, Err(e) if is_not_found_error(&e)));
    }
}
