//! Application services layer.

pub mod auth;
pub mod compare;
pub mod error;
pub mod healthcheck;
pub mod lifecycle;
pub mod projection;
pub mod query;
pub mod registry;
pub mod repos;
pub mod users;
