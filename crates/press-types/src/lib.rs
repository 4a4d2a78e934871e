//! Common types module for the press production workflow.
//!
//! This module defines the core data types shared by the storage, configuration
//! and workflow crates. It provides a centralized location for the order model,
//! the manufacturing checklist, the audit timeline and the print queue
//! projection so that every component agrees on a single representation.

/// Operator identity and catalog reference value types.
pub mod actor;
/// Manufacturing checklist item types.
pub mod checklist;
/// Order aggregate, stages, statuses and per-stage payloads.
pub mod order;
/// Print queue projection types.
pub mod queue;
/// Implementation registry trait for pluggable backends.
pub mod registry;
/// Storage table names for persisted collections.
pub mod storage;
/// Audit timeline entry types.
pub mod timeline;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use actor::*;
pub use checklist::*;
pub use order::*;
pub use queue::*;
pub use registry::*;
pub use storage::*;
pub use timeline::*;
pub use validation::*;
