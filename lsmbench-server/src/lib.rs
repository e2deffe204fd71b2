//! The benchmark binary.
//!
//! This wires the [`lsmbench_workload`] writers to a [`lsmbench_engine`] backend, exposes the
//! benchmark counters over HTTP and handles configuration, logging and shutdown.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod bench;
pub mod cli;
pub mod config;
pub mod exporter;
pub mod observability;
