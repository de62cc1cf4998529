//! API client module
//!
//! Access to the remote metadata-management service.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::{HttpServiceClient, RemoteServiceClient, ServiceResult};
pub use types::*;
