use sea_orm_migration::prelude::*;

use swasthya_connections_migration::Migrator;

#[tokio::main]
async fn main() {
    cli::run_cli(Migrator).await;
}
