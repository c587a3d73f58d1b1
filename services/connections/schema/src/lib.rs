pub mod accounts;
pub mod connection_requests;
pub mod notifications;
pub mod outbox_events;
pub mod relationships;
