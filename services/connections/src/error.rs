use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use swasthya_core::envelope;

use crate::domain::otp::OtpError;

/// Connections service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionsServiceError {
    #[error("account not found")]
    AccountNotFound,
    #[error("connection request not found")]
    RequestNotFound,
    #[error("relationship not found")]
    RelationshipNotFound,
    #[error("notification not found")]
    NotificationNotFound,
    #[error("account already exists")]
    AccountAlreadyExists,
    #[error("connection already exists")]
    ConnectionAlreadyExists,
    #[error("request no longer pending")]
    RequestNoLongerPending,
    #[error("relationship not active")]
    RelationshipNotActive,
    #[error("caller does not own this resource")]
    Unauthorized,
    #[error("otp required")]
    OtpRequired,
    #[error("invalid otp")]
    OtpInvalid { attempts_remaining: u32 },
    #[error("otp expired")]
    OtpExpired,
    #[error("otp attempts exceeded")]
    OtpAttemptsExceeded,
    #[error("otp already used")]
    OtpAlreadyUsed,
    #[error("otp not applicable to direct requests")]
    OtpNotApplicable,
    #[error("missing identifier")]
    MissingIdentifier,
    #[error("unsupported connection method")]
    UnsupportedConnectionMethod,
    #[error("{0}")]
    Validation(&'static str),
    #[error("storage unavailable")]
    Unavailable,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ConnectionsServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND",
            Self::RequestNotFound => "REQUEST_NOT_FOUND",
            Self::RelationshipNotFound => "RELATIONSHIP_NOT_FOUND",
            Self::NotificationNotFound => "NOTIFICATION_NOT_FOUND",
            Self::AccountAlreadyExists => "ACCOUNT_ALREADY_EXISTS",
            Self::ConnectionAlreadyExists => "CONNECTION_ALREADY_EXISTS",
            Self::RequestNoLongerPending => "REQUEST_NO_LONGER_PENDING",
            Self::RelationshipNotActive => "RELATIONSHIP_NOT_ACTIVE",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::OtpRequired => "OTP_REQUIRED",
            Self::OtpInvalid { .. } => "OTP_INVALID",
            Self::OtpExpired => "OTP_EXPIRED",
            Self::OtpAttemptsExceeded => "OTP_ATTEMPTS_EXCEEDED",
            Self::OtpAlreadyUsed => "OTP_ALREADY_USED",
            Self::OtpNotApplicable => "OTP_NOT_APPLICABLE",
            Self::MissingIdentifier => "MISSING_IDENTIFIER",
            Self::UnsupportedConnectionMethod => "UNSUPPORTED_CONNECTION_METHOD",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unavailable => "UNAVAILABLE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::AccountNotFound
            | Self::RequestNotFound
            | Self::RelationshipNotFound
            | Self::NotificationNotFound => StatusCode::NOT_FOUND,
            Self::AccountAlreadyExists
            | Self::ConnectionAlreadyExists
            | Self::RequestNoLongerPending
            | Self::RelationshipNotActive
            | Self::OtpAlreadyUsed => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::OtpRequired
            | Self::OtpInvalid { .. }
            | Self::OtpExpired
            | Self::OtpAttemptsExceeded
            | Self::OtpNotApplicable
            | Self::MissingIdentifier
            | Self::UnsupportedConnectionMethod
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<OtpError> for ConnectionsServiceError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::Invalid { attempts_remaining } => Self::OtpInvalid { attempts_remaining },
            OtpError::Expired => Self::OtpExpired,
            OtpError::AttemptsExceeded => Self::OtpAttemptsExceeded,
            OtpError::AlreadyUsed => Self::OtpAlreadyUsed,
        }
    }
}

impl IntoResponse for ConnectionsServiceError {
    fn into_response(self) -> Response {
        // Only 500s are logged here.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = ?e, kind = "INTERNAL", "internal error");
        }
        let extra = match self {
            Self::OtpInvalid { attempts_remaining } => {
                Some(json!({ "attempts_remaining": attempts_remaining }))
            }
            _ => None,
        };
        envelope::failure(self.status(), self.kind(), &self.to_string(), extra)
    }
}
