//! The HTTP endpoint exposing benchmark metrics for scraping.
//!
//! The routes are assembled in [`Exporter`], which can serve any listener. To bind the configured
//! address and serve in the background, use [`spawn()`].
//!
//! # Testing
//!
//! For end-to-end tests, see the `lsmbench-test` crate, which runs an exporter on a random local
//! port.

mod app;
mod middleware;
mod server;

pub use app::Exporter;
pub use server::{listen, spawn};
