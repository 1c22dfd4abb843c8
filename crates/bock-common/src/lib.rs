//! # bock-common
//!
//! Shared utilities and types for the Bock container ecosystem.
//!
//! This crate provides common functionality used across all Bock crates:
//! - Container ID generation
//! - Standard filesystem paths
//! - Annotation keys recorded on containers
//! - Common error types

#![warn(missing_docs)]

pub mod error;
pub mod id;
pub mod labels;
pub mod paths;

pub use error::{BockError, BockResult};
pub use id::ContainerId;
pub use paths::BockPaths;
