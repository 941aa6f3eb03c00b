//! EnvMon dashboard - series alignment and bulk-insert batching for the
//! environmental monitoring backend.
//!
//! This library exposes the core modules for testing and reuse.

pub mod backend;
pub mod common;
pub mod config;
pub mod error;
pub mod insertion;
pub mod series;
pub mod services;
