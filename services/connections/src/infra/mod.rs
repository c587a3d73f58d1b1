pub mod db;
pub mod outbox;
