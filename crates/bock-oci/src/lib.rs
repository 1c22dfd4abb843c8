//! # bock-oci
//!
//! OCI (Open Container Initiative) specification types for Bock.
//!
//! This crate provides Rust types for:
//! - OCI Runtime Specification (config.json)
//! - Deferred spec edits recorded during container creation
//! - Container state management

#![warn(missing_docs)]

pub mod opts;
pub mod runtime;
pub mod state;

pub use opts::{SpecMutation, apply_all};
pub use runtime::Spec;
pub use state::ContainerState;
