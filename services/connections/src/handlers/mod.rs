pub mod account;
pub mod connection;
pub mod health;
pub mod notification;
pub mod relationship;
