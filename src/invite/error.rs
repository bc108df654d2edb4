use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Domain failures of the invite lifecycle. Each variant carries a stable
/// machine code distinct from the transport status, so the JSON entry points
/// and the browser redirect entry point can render the same failure
/// differently.
#[derive(Debug, Error)]
pub enum InviteError {
    #[error("invite token not found")]
    InvalidToken,
    #[error("this invite is bound to a different email address")]
    InvalidEmail,
    #[error("invite token has expired")]
    TokenExpired,
    #[error("invite token has no remaining uses")]
    TokenExhausted,
    #[error("insufficient permissions")]
    InsufficientPermissions,
    #[error("not allowed to accept this invite")]
    CantAcceptInvite,
    #[error("this invite cannot be rejected")]
    CantRejectInvite,
    #[error("no invitation delivery function is configured")]
    EmailNotEnabled,
    #[error("error sending the invitation email: {0}")]
    Delivery(String),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl InviteError {
    pub fn code(&self) -> &'static str {
        match self {
            InviteError::InvalidToken => "INVALID_TOKEN",
            InviteError::InvalidEmail => "INVALID_EMAIL",
            InviteError::TokenExpired => "INVITE_TOKEN_HAS_EXPIRED",
            InviteError::TokenExhausted => "INVITE_TOKEN_EXHAUSTED",
            InviteError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            InviteError::CantAcceptInvite => "CANT_ACCEPT_INVITE",
            InviteError::CantRejectInvite => "CANT_REJECT_INVITE",
            InviteError::EmailNotEnabled => "INVITATION_EMAIL_IS_NOT_ENABLED",
            InviteError::Delivery(_) => "ERROR_SENDING_THE_INVITATION_EMAIL",
            InviteError::Storage(_) => "STORAGE_ERROR",
            InviteError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            InviteError::InvalidToken
            | InviteError::InvalidEmail
            | InviteError::TokenExpired
            | InviteError::TokenExhausted => StatusCode::BAD_REQUEST,
            InviteError::InsufficientPermissions
            | InviteError::CantAcceptInvite
            | InviteError::CantRejectInvite => StatusCode::FORBIDDEN,
            InviteError::EmailNotEnabled
            | InviteError::Delivery(_)
            | InviteError::Storage(_)
            | InviteError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this failure is a terminal verdict on the token (as opposed
    /// to a transient infrastructure problem). Terminal failures during
    /// cookie resumption clear the pending cookie.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InviteError::Storage(_) | InviteError::Internal(_))
    }
}

impl IntoResponse for InviteError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "status": false,
            "code": self.code(),
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
