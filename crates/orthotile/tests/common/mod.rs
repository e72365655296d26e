//! Shared utilities for orthotile integration tests.
//!
//! This module provides:
//! - `TestHarness` for running the service against temp directories
//! - `ScriptedRunner`, a stand-in for the GDAL command-line tools
//! - `FlakyStore` for injecting remote store failures

pub mod harness;
pub mod store;
pub mod tools;

pub use harness::TestHarness;
pub use store::FlakyStore;
pub use tools::{HillshadeScript, ScriptedRunner, TilingScript};
