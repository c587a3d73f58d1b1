use sea_orm::Database;
use tracing::info;

use swasthya_connections::config::ConnectionsConfig;
use swasthya_connections::router::build_router;
use swasthya_connections::state::AppState;
use swasthya_connections::sweeper::run_expiry_sweeper;
use swasthya_core::tracing::init_tracing;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = ConnectionsConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let state = AppState {
        db,
        store_timeout: config.store_timeout,
    };

    tokio::spawn(run_expiry_sweeper(
        state.request_repo(),
        config.expiry_sweep_interval,
    ));

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.connections_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("connections service listening on {addr}");
    axum::serve(listener, router).await.expect("server error");
}
