pub mod account;
pub mod connection;
pub mod expiry;
pub mod notification;
pub mod relationship;
pub mod resolve;
