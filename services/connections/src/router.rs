use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use swasthya_core::health::healthz;
use swasthya_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::{
    account::{get_account, register_account},
    connection::{accept_request, create_request, pending_requests, reject_request, resend_otp},
    health::readyz,
    notification::{
        disable_notification, list_notifications, mark_all_read, mark_read, unread_count,
    },
    relationship::{
        connected_doctors, connected_patients, terminate_relationship, update_permissions,
    },
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Accounts
        .route("/accounts", post(register_account))
        .route("/accounts/{id}", get(get_account))
        // Connection requests
        .route("/connections/requests", post(create_request))
        .route("/connections/requests/pending", get(pending_requests))
        .route("/connections/requests/{id}/accept", post(accept_request))
        .route("/connections/requests/{id}/reject", post(reject_request))
        .route("/connections/requests/{id}/otp", post(resend_otp))
        // Relationships
        .route("/connections/doctors", get(connected_doctors))
        .route("/connections/patients", get(connected_patients))
        .route(
            "/connections/relationships/{id}/permissions",
            patch(update_permissions),
        )
        .route(
            "/connections/relationships/{id}",
            delete(terminate_relationship),
        )
        // Notifications
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{id}/read", patch(mark_read))
        .route("/notifications/{id}", delete(disable_notification))
        .layer(
            ServiceBuilder::new()
                .layer(request_id_layer())
                .layer(TraceLayer::new_for_http())
                .layer(propagate_request_id_layer()),
        )
        .with_state(state)
}
