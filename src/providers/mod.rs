// ABOUTME: Platform adapter implementations for all supported school platforms
// ABOUTME: One module per platform plus the shared trait, registry, and HTTP helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Platform Adapters
//!
//! One adapter per school-management platform, all implementing
//! [`core::PlatformAdapter`]. Adapters are stateless between calls; all
//! per-sync state (session cookies, bearer tokens) lives inside a single
//! `sync` invocation and is invalidated before it returns.

/// Shared adapter trait and declarative config-field schema
pub mod core;

/// HTTP client construction and JSON decoding shared by adapters
pub mod http;

/// Adapter registry mapping platform ids to instances and field schemas
pub mod registry;

/// WebUntis adapter (JSON-RPC session API)
pub mod webuntis;

/// IServ adapter (self-hosted instances, form login)
pub mod iserv;

/// Schulmanager Online adapter (bundled module-call API)
pub mod schulmanager;

/// Moodle adapter (mobile-service token API)
pub mod moodle;

/// Sdui adapter (bearer-token REST API)
pub mod sdui;

pub use core::{ConfigField, PlatformAdapter, PlatformConfig, PlatformId};
pub use registry::{global_registry, AdapterRegistry};
