//! Folio Server
//!
//! A self-hosted PDF repository. Users upload PDFs, and pages are rendered
//! to PNG the first time they are viewed and kept on disk afterwards.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod pdf;
pub mod pool;
pub mod routes;
pub mod state;
pub mod storage;
pub mod upload;
