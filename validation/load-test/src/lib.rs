//! Synthetic traffic generator for the TrackMe REST API.
//!
//! This crate provides tools to:
//! - Simulate standard and privileged users with weighted task mixes
//! - Spawn actors at a controlled rate for a fixed duration
//! - Collect per-request latency and failure statistics
//! - Output results in multiple formats (console, JSON, CSV)

pub mod actors;
pub mod api;
pub mod config;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod recorder;
pub mod report;
pub mod runner;
pub mod session;
pub mod tasks;

pub use actors::{Actor, ActorContext, ActorKind, PrivilegedActor, StandardActor};
pub use api::{ApiClient, ApiResponse};
pub use config::{ActorMix, ActorProfile, LoadStage, TestConfig, Thresholds};
pub use error::TaskFailure;
pub use metrics::{EndpointStats, MetricsRegistry, TestResults};
pub use recorder::Recorder;
pub use report::ResultsReport;
pub use runner::LoadRunner;
pub use session::Session;
pub use tasks::{TaskSet, WaitTime};
