//! Domain types shared across all Swasthyalink services.
//!
//! This crate contains only pure types with no framework dependencies.
//! Import in `usecase/` and `domain/` layers; never in `infra/` or `handlers/`.

pub mod contact;
pub mod pagination;
pub mod role;
