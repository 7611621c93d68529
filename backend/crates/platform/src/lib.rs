//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Password hashing (Argon2id) and password policy
//! - JWT issuing and verification
//! - Response cache (in-process, TTL and pattern eviction)
//! - Request pipeline (mediator, authorization, validation, caching)
//! - Domain event publishing and consumption
//! - Outgoing email (SMTP)

pub mod cache;
pub mod mail;
pub mod messaging;
pub mod password;
pub mod pipeline;
pub mod token;
