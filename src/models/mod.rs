//! Data models shared across the crate.
//!
//! Typed versions of every payload exchanged with the backend, plus the local
//! package and settings types. Fields the backend may omit are `Option`s and are
//! checked where they are consumed.

pub mod app;
pub mod content;
pub mod encryption;
pub mod file;
pub mod settings;
pub mod upload;
