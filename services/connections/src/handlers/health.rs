use axum::extract::State;
use axum::http::StatusCode;

use swasthya_core::health::readiness;

use crate::infra::db::bounded;
use crate::state::AppState;

/// Handler for `GET /readyz`: pings the database under the store timeout.
pub async fn readyz(State(state): State<AppState>) -> StatusCode {
    readiness(bounded(state.store_timeout, "ping database", state.db.ping()).await)
}
