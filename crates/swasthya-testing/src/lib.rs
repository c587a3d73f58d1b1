//! Test utilities for Swasthyalink services.
//!
//! For `[dev-dependencies]` only.

pub mod auth;
