//! End-to-end probes for the ZO log service HTTP API.
//!
//! A [`session::Session`] is opened from a [`config::HarnessConfig`] and handed to the
//! scenarios in [`scenarios`], which drive the roles resource and the encrypted JSON
//! ingestion endpoint and fail on the first unexpected status code.

pub mod api;
pub mod config;
pub mod ingest;
pub mod roles;
pub mod scenarios;
pub mod security;
pub mod session;

pub use api::response::{ApiResponse, StatusMismatch};
pub use config::HarnessConfig;
pub use security::crypto::{CipherVariant, FieldEncryptor};
pub use session::session::Session;
