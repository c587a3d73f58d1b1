use sea_orm_migration::prelude::*;

mod m20261001_000001_create_accounts;
mod m20261001_000002_create_connection_requests;
mod m20261001_000003_create_relationships;
mod m20261001_000004_create_notifications;
mod m20261001_000005_create_outbox_events;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_accounts::Migration),
            Box::new(m20261001_000002_create_connection_requests::Migration),
            Box::new(m20261001_000003_create_relationships::Migration),
            Box::new(m20261001_000004_create_notifications::Migration),
            Box::new(m20261001_000005_create_outbox_events::Migration),
        ]
    }
}
