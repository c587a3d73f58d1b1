//! Tagged success/failure response envelope.
//!
//! Every operation answers with `{"success": true, ...payload}` or
//! `{"success": false, "kind": ..., "message": ...}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Successful response wrapping a payload whose fields are flattened next to `success`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    payload: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            success: true,
            payload,
        }
    }
}

impl Envelope<Map<String, Value>> {
    /// Bare acknowledgement: `{"success": true}`.
    pub fn ack() -> Self {
        Self::ok(Map::new())
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Build a failure body. `extra` fields (if an object) are merged in.
pub fn failure(status: StatusCode, kind: &str, message: &str, extra: Option<Value>) -> Response {
    let mut body = json!({
        "success": false,
        "kind": kind,
        "message": message,
    });
    if let (Some(Value::Object(extra)), Value::Object(target)) = (extra, &mut body) {
        target.extend(extra);
    }
    (status, Json(body)).into_response()
}
