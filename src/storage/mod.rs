//! Local blob storage
//!
//! Flat directories of files named by opaque identifier, plus the chunked
//! streaming used to deliver them.

mod blob_store;
mod stream;
mod types;

pub use blob_store::BlobStore;
pub use stream::{stream, ChunkSink, SinkClosed, StreamError};
pub use types::StorageError;
