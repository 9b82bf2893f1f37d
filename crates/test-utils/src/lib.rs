//! Shared test utilities for the trackme-load workspace.
//!
//! This crate provides common testing infrastructure including:
//! - An in-process mock of the TrackMe REST API
//! - Canned server payloads and scenario files
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../../crates/test-utils" }
//! ```
//!
//! Then start a server in an async test:
//!
//! ```ignore
//! let api = test_utils::MockApi::start().await;
//! let host = api.base_url();
//! ```

pub mod fixtures;
pub mod mock_api;

pub use fixtures::*;
pub use mock_api::{MockApi, RecordedRequest, API_PREFIX};
