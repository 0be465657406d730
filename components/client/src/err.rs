use hikari_common::BlockId;
use snafu::{Location, Snafu};

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display(
        "invalid buffer range: offset {offset} + len {len} exceeds buffer of {buf_len} bytes"
    ))]
    InvalidBufferRange {
        offset: usize,
        len: usize,
        buf_len: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("seek position {pos} is negative"))]
    NegativeSeekPosition {
        pos: i64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("seek position {pos} is past buffer limit {limit}"))]
    SeekPastBufferLimit {
        pos: u64,
        limit: u64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("operation on closed stream"))]
    StreamClosed {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("block index {index} out of bounds for a file of {blocks} blocks"))]
    BlockIndexOutOfBounds {
        index: usize,
        blocks: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("fetched block {block_id} has {actual} bytes, sealed length is {expected}"))]
    FetchedLengthMismatch {
        block_id: BlockId,
        expected: u64,
        actual: u64,
        #[snafu(implicit)]
        location: Location,
    },

    StorageError {
        source: hikari_storage::err::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<hikari_storage::err::Error> for Error {
    fn from(value: hikari_storage::err::Error) -> Self { Self::StorageError { source: value } }
}
