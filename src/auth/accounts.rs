use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::jwt;
use crate::db::models::User;
use crate::db::users;
use crate::invite::cookie;
use crate::invite::error::InviteError;
use crate::invite::redeem::{self, RedeemOutcome};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Invite resumption result embedded in an auth response when a pending
/// cookie was in flight. Authentication itself succeeds either way.
#[derive(Debug, Serialize)]
pub struct InviteOutcomeBody {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inviter_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user_id: String,
    pub email: String,
    pub role: String,
    pub session_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite: Option<InviteOutcomeBody>,
}

fn invite_outcome_body(result: &Result<RedeemOutcome, InviteError>) -> InviteOutcomeBody {
    match result {
        Ok(outcome) => InviteOutcomeBody {
            status: true,
            code: None,
            message: "invite accepted".to_string(),
            redirect_to: Some(outcome.redirect_to.clone()),
            inviter_name: outcome.inviter_name.clone(),
        },
        Err(err) => InviteOutcomeBody {
            status: false,
            code: Some(err.code().to_string()),
            message: err.to_string(),
            redirect_to: None,
            inviter_name: None,
        },
    }
}

/// Run the post-auth invite resumption and assemble the response: fresh
/// session token (reflecting any role granted during resumption), the invite
/// outcome if one was in flight, and a cookie-clear header when the pending
/// cookie is done.
async fn finish_auth(
    state: &AppState,
    request_headers: &HeaderMap,
    user: User,
    new_account: bool,
) -> Result<(HeaderMap, Json<AuthResponse>), (StatusCode, String)> {
    let resume = redeem::resume_pending_invite(state, request_headers, &user, new_account).await;

    // Adopt the redeemed record only when it is the authenticating account;
    // a before-accept transform may have granted the role elsewhere, and the
    // session issued here must stay the caller's.
    let final_user = match &resume.outcome {
        Some(Ok(outcome)) if outcome.user.id == user.id => outcome.user.clone(),
        _ => user,
    };

    let session_token = jwt::issue_session_token(&state.secret, &final_user)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Session token: {e}")))?;

    let mut headers = HeaderMap::new();
    if resume.clear_cookie {
        headers.append(
            header::SET_COOKIE,
            cookie::clear_cookie(&state.invites.cookie_name),
        );
    }

    Ok((
        headers,
        Json(AuthResponse {
            user_id: final_user.id,
            email: final_user.email,
            role: final_user.role,
            session_token,
            invite: resume.outcome.as_ref().map(invite_outcome_body),
        }),
    ))
}

/// POST /api/auth/signup — Create an account and fire invite resumption.
pub async fn sign_up(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    Json(req): Json<SignUpRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), (StatusCode, String)> {
    if req.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Name cannot be empty".to_string()));
    }
    if !req.email.contains('@') {
        return Err((StatusCode::BAD_REQUEST, "Invalid email address".to_string()));
    }
    if req.password.len() < 8 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let db = state.db.clone();
    let email = req.email.clone();
    let name = req.name.clone();
    let password = req.password.clone();
    let role = match state.bootstrap_admin_email.as_deref() {
        Some(admin_email) if admin_email == req.email => "admin".to_string(),
        _ => state.default_role.clone(),
    };

    let user = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let existing = users::find_by_email(&conn, &email)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Lookup: {e}")))?;
        if existing.is_some() {
            return Err((StatusCode::CONFLICT, "Email already registered".to_string()));
        }

        let password_hash = hash(&password, DEFAULT_COST)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Hash: {e}")))?;

        let now = Utc::now().to_rfc3339();
        let user = User {
            id: Uuid::now_v7().to_string(),
            email,
            name,
            password_hash,
            role,
            created_at: now.clone(),
            updated_at: now,
        };
        users::insert(&conn, &user)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert user: {e}")))?;
        Ok::<_, (StatusCode, String)>(user)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {e}")))??;

    finish_auth(&state, &request_headers, user, true).await
}

/// POST /api/auth/signin — Authenticate and fire invite resumption.
pub async fn sign_in(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    Json(req): Json<SignInRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), (StatusCode, String)> {
    let db = state.db.clone();
    let email = req.email.clone();
    let password = req.password.clone();

    let user = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let user = users::find_by_email(&conn, &email)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Lookup: {e}")))?
            .ok_or((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()))?;

        let valid = verify(&password, &user.password_hash)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Verify: {e}")))?;
        if !valid {
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()));
        }
        Ok::<_, (StatusCode, String)>(user)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {e}")))??;

    finish_auth(&state, &request_headers, user, false).await
}
