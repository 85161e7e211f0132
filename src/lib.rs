//! Publishes macOS installer packages as Intune line-of-business apps.
//!
//! The pipeline creates or updates the app record, encrypts the package,
//! uploads it in blocks to the storage target the backend hands out, commits
//! it and points the app at the new content version.

pub mod api;
pub mod commands;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
