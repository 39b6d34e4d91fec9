//! Multi-tenant backend core: paginated listings with allow-list projection,
//! a cached query layer, and a role-gated operational API.

pub mod application;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
