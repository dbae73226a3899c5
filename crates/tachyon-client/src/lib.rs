//! # tachyon-client
//!
//! REST client for the tachyon evaluation backend.
//!
//! This crate provides:
//! - [`ApiClient`]: tenant-scoped dataset, golden and evaluation operations
//!   with TTL response caching, transient-failure retries and bearer auth
//! - Host capabilities for credentials and 401 handling
//! - Golden import parsing and export
//! - Evaluation history projection and sorting
//! - A cancellable history poller for in-flight runs
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tachyon_client::{ApiClient, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> tachyon_client::Result<()> {
//!     let client = Arc::new(ApiClient::with_config(ClientConfig::from_env())?);
//!     for dataset in client.get_datasets().await? {
//!         println!("{} ({} goldens)", dataset.alias, dataset.num_goldens);
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod goldens;
pub mod history;
pub mod poller;

pub use auth::{CredentialStore, LogUnauthorized, MemoryCredentialStore, UnauthorizedHandler};
pub use cache::CacheStats;
pub use client::{ApiClient, SharedClient};
pub use config::ClientConfig;
pub use goldens::{export_goldens, parse_golden_import, validate_new_goldens};
pub use history::{project_rows, sort_rows, HistoryRow, SortField, SortOrder, SortState};
pub use poller::{HistoryPoller, HistorySnapshot, PollHandle, StatusGuard};

// Re-export core types so hosts depend on one crate
pub use tachyon_core::*;
