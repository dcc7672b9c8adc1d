//! # Repository Implementations
//!
//! One repository per durable concern:
//!
//! - [`document`] - opaque cached remote documents (projects / inventory /
//!   engineering partitions)
//! - [`queue`] - the pending mutation queue and its dead-letter log
//!
//! Repositories are thin, cloneable wrappers over the shared pool; they own
//! all SQL. Callers never see sqlx types.

pub mod document;
pub mod queue;
