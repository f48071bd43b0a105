//! nfdeploy Control Plane Library
//!
//! This crate provides the control plane for deploying 5G network functions:
//! a task runner for toolchain processes, component action tracking on top
//! of it, durable action history, and the HTTP API that exposes them.

pub mod config;
pub mod http;
pub mod metrics;
pub mod registry;
pub mod runner;
pub mod state;
pub mod store;
pub mod tracker;

pub use config::Config;
pub use registry::Registry;
pub use runner::{CompletionHook, Runner, RunnerConfig, RunnerError};
pub use state::AppState;
pub use store::{FileStore, MemoryStore, Store, StoreError};
pub use tracker::{ActionRequest, ActionTracker, Toolchain, TrackerError};
