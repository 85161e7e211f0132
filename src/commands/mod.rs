//! Command-line entry points.
//!
//! Commands parse arguments, load configuration and hand off to the
//! `services` layer. They hold no pipeline logic of their own.

pub mod upload;
