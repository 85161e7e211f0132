//! Business logic layer.
//!
//! The upload pipeline and its building blocks: content encryption, block
//! planning, retry policies, the chunked blob uploader, the commit state
//! machine and app record management. `upload_engine` ties them together.
//! HTTP goes through the `api` traits only.

pub mod app_records;
pub mod blob_uploader;
pub mod chunk_manager;
pub mod commit_coordinator;
pub mod encryptor;
pub mod retry_engine;
pub mod upload_engine;
