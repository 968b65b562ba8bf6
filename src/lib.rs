// ABOUTME: Library entry point for the school platform sync engine
// ABOUTME: Aggregates timetable, substitution, message, and homework data for parents
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

//! # Schulsync
//!
//! Sync engine that pulls timetable, substitution, message, and homework data
//! from German school platforms (WebUntis, IServ, Schulmanager Online,
//! Moodle, Sdui) into one canonical schema, on behalf of parents.
//!
//! Each sync is one call: the caller supplies platform config and ephemeral
//! credentials, the engine logs in, fetches all data categories concurrently,
//! logs out, and returns a [`models::SyncResult`]. A failed category never
//! fails the sync; it comes back empty with a [`models::SyncDiagnostic`]
//! describing what went wrong. Credentials are zeroized when the call
//! returns and never reach logs or storage.
//!
//! ## Example
//!
//! ```rust,no_run
//! use schulsync::config::EngineConfig;
//! use schulsync::models::PlatformCredentials;
//! use schulsync::providers::{PlatformConfig, PlatformId};
//! use schulsync::sync::SyncOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> schulsync::errors::AppResult<()> {
//!     let orchestrator = SyncOrchestrator::new(&EngineConfig::from_env());
//!
//!     let mut config = PlatformConfig::new();
//!     config.insert("server".into(), "hepta.webuntis.com".into());
//!     config.insert("school".into(), "gym-musterstadt".into());
//!
//!     let result = orchestrator
//!         .sync(
//!             "parent-42",
//!             PlatformId::WebUntis,
//!             &config,
//!             PlatformCredentials::new("parent", "secret"),
//!         )
//!         .await?;
//!     println!("{} lessons, {} anomalies", result.lessons.len(), result.diagnostics.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Providers**: one [`providers::PlatformAdapter`] per platform, looked
//!   up through the [`providers::AdapterRegistry`]
//! - **Models**: the canonical data schema all platforms map into
//! - **Diagnostics**: per-category failure capture that keeps syncs partial
//!   instead of fatal
//! - **SSRF guard**: validates user-supplied instance URLs before first use
//! - **Rate limiting**: sliding-window gate keyed by caller identity

pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod mapping;
pub mod models;
pub mod providers;
pub mod rate_limiting;
pub mod ssrf;
pub mod sync;

pub use errors::{AppError, AppResult, ErrorCode};
pub use models::{SyncDiagnostic, SyncResult};
pub use sync::SyncOrchestrator;
