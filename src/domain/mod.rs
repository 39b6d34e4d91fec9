//! Domain layer types and invariants.

pub mod context;
pub mod entities;
pub mod error;
pub mod types;
