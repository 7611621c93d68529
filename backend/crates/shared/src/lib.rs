//! Shared Kernel - Domain-crossing minimal core
//!
//! This crate contains the "smallest core" of vocabulary shared by every
//! other crate:
//! - The fault type [`error::app_error::AppError`] and its [`error::kind::ErrorKind`]
//! - Typed entity ids
//! - The `{success, message, data}` reply envelope and paged listings
//!
//! **Design Principle**: Only include things that are "hard to change"
//! and have consistent meaning across all domains.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
pub mod response;
