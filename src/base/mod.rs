//! Base types and error handling.
//!
//! Provides the error taxonomy shared by every layer:
//! - [`LookupError`]: typed failures surfaced through the worker protocol

pub mod error;

pub use error::LookupError;
