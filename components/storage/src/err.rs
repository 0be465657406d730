use hikari_common::{BlockId, UserId};
use hikari_utils::object_storage::ObjectStorageError;
use snafu::{Location, Snafu};

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display(
        "quota exceeded for user {owner}: requested {requested} bytes, used {used} of {limit}"
    ))]
    QuotaExceeded {
        owner: UserId,
        requested: u64,
        used: u64,
        limit: u64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("block {block_id} sealed at {expected} bytes, got {actual}"))]
    BlockLengthMismatch {
        block_id: BlockId,
        expected: u64,
        actual: u64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("block {block_id} is not in the under-store"))]
    BlockNotFound {
        block_id: BlockId,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("under-store fetch failed for block {block_id}"))]
    UnderStoreFetch {
        block_id: BlockId,
        #[snafu(implicit)]
        location: Location,
        source: ObjectStorageError,
    },

    #[snafu(display("under-store write failed for block {block_id}"))]
    UnderStorePut {
        block_id: BlockId,
        #[snafu(implicit)]
        location: Location,
        source: ObjectStorageError,
    },
}

impl Error {
    pub fn is_quota_exceeded(&self) -> bool { matches!(self, Error::QuotaExceeded { .. }) }

    pub fn is_not_found(&self) -> bool { matches!(self, Error::BlockNotFound { .. }) }
}

pub type Result<T> = std::result::Result<T, Error>;
