//! TSN Adapters Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the TSN adapters
//! workspace.
//!
//! # Overview
//!
//! This crate provides common functionality used across all workspace
//! members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Logging**: Centralized tracing setup (console/file, text/JSON)
//! - **Stream IDs**: Deterministic TSN stream identifier derivation
//!
//! # Example
//!
//! ```no_run
//! use tsn_common::{Result, stream_id::StreamId};
//!
//! fn stream_for(name: &str) -> Result<StreamId> {
//!     let id = StreamId::generate(name);
//!     println!("Stream id: {}", id);
//!     Ok(id)
//! }
//! ```

pub mod error;
pub mod logging;
pub mod stream_id;

// Re-export commonly used types
pub use error::{Result, TsnError};
pub use stream_id::StreamId;
