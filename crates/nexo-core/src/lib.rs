//! # nexo-core
//!
//! Core types, traits, and abstractions for nexograph.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the other nexograph crates depend on: the job record
//! lifecycle, content-addressed fingerprinting, the typed-entity view over
//! the external store, and shared defaults.

pub mod defaults;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use fingerprint::{canonical_json, content_hash, fingerprint};
pub use models::{
    EdgeFilter, Entity, JobKind, JobRecord, JobStatus, NewJob, NodeFilter, ATTR_MEMBER_ONE,
    ATTR_MEMBER_TWO, ATTR_PRIMARY_ID, ATTR_SOURCE_ID, ATTR_TARGET_ID, ATTR_TYPE,
};
pub use traits::{EntityStore, JobStore};
