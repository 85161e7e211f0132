//! Local persistence layer.
//!
//! Upload settings are read from a JSON file on disk. The file is optional;
//! anything it leaves out keeps its default.

pub mod settings;
