//! Rejections raised while reading caller-supplied domain values.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("sort order must be `asc` or `desc`, got `{0}`")]
    InvalidSortOrder(String),
    #[error("unknown role `{0}`")]
    UnknownRole(String),
}
