//! # tachyon-core
//!
//! Core types for the tachyon evaluation client.
//!
//! This crate provides the wire models exchanged with the evaluation backend,
//! the error taxonomy surfaced to hosts, and the shared defaults and logging
//! field names the other crates depend on. It performs no I/O.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod usecase;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use usecase::validate_usecase_id;
