//! Upload ingestion
//!
//! Accepts uploaded PDFs, stores the bytes under a freshly generated opaque
//! name, counts its pages and records the document in the catalog.

mod ingest;
mod names;

pub use ingest::{IngestError, Ingestor, Upload, PDF_CONTENT_TYPE};
pub use names::{NameGenerator, TimestampNameGenerator, OPAQUE_NAME_LEN};
