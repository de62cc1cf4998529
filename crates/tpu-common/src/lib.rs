//! TPU Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared building blocks for the Task Processing Unit workspace.
//!
//! # Overview
//!
//! - **Logging**: the single process-wide `tracing` sink, configured once at startup
//! - **Properties**: loading of `key=value` configuration files
//! - **Error Handling**: the error type for both of the above
//!
//! # Example
//!
//! ```no_run
//! use tpu_common::properties::Properties;
//!
//! fn threads(path: &str) -> tpu_common::Result<usize> {
//!     let props = Properties::load(path)?;
//!     Ok(props.parse::<usize>("engine.threads")?.unwrap_or(1))
//! }
//! ```

pub mod error;
pub mod logging;
pub mod properties;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use properties::Properties;
