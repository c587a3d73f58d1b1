//! Caller identity types shared by every service behind the gateway.

pub mod identity;
