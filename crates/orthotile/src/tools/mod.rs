//! Subprocess adapter for the raster toolchain.
//!
//! The GDAL tools are opaque executables: success is exit code zero,
//! failure detail is whatever they print on stderr. Everything the
//! pipeline runs goes through [`ToolRunner`] so tests can script the
//! toolchain without installing it.

pub mod error;
pub mod runner;

pub use error::{stderr_excerpt, ToolError, STDERR_EXCERPT_CHARS};
pub use runner::{ProcessRunner, ToolInvocation, ToolOutput, ToolRunner};
