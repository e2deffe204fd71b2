//! Test utilities for the benchmark.
//!
//! This crate provides utilities to facilitate end-to-end testing of the benchmark binary. See the
//! modules for all available utilities.

pub mod server;
pub mod tracing;
