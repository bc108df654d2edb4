use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::db::models::Invitation;
use crate::invite::error::InviteError;
use crate::invite::hooks::{InvitedUser, LifecycleHookCtx};
use crate::invite::policy::{CancelInviteCtx, RejectInviteCtx};
use crate::invite::store::InviteStore;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: bool,
    pub message: String,
}

/// Raw lookup shared by cancel/reject: no exhaustion or expiry checks —
/// an expired invite can still be cancelled, and a second cancel of an
/// already-deleted token reports INVALID_TOKEN rather than success.
async fn find_invitation(state: &AppState, token: &str) -> Result<Invitation, InviteError> {
    let db = state.db.clone();
    let config = state.invites.clone();
    let token = token.to_string();
    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| InviteError::Internal("db lock".to_string()))?;
        let store = InviteStore::new(config.schema.clone());
        store
            .find_invitation(&conn, &token)?
            .ok_or(InviteError::InvalidToken)
    })
    .await
    .map_err(|e| InviteError::Internal(format!("task join: {e}")))?
}

/// Delete the usage ledger and the invitation row together.
async fn delete_with_uses(state: &AppState, invitation: &Invitation) -> Result<(), InviteError> {
    let db = state.db.clone();
    let config = state.invites.clone();
    let invite_id = invitation.id.clone();
    let token = invitation.token.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| InviteError::Internal("db lock".to_string()))?;
        let store = InviteStore::new(config.schema.clone());
        // Uses first: no FK cascade is relied upon.
        store.delete_invitation_uses(&conn, &invite_id)?;
        store.delete_invitation(&conn, &token)?;
        Ok::<_, InviteError>(())
    })
    .await
    .map_err(|e| InviteError::Internal(format!("task join: {e}")))?
}

fn caller_from_claims(claims: &Claims) -> InvitedUser {
    InvitedUser {
        id: claims.sub.clone(),
        email: claims.email.clone(),
        name: claims.name.clone(),
        role: claims.role.clone(),
    }
}

/// POST /api/invites/cancel — Creator withdraws an invitation.
/// Ownership is enforced before the policy runs: the cancel policy can only
/// narrow, never bypass, the creator-only rule.
pub async fn cancel_invite(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<TokenRequest>,
) -> Result<Json<StatusResponse>, InviteError> {
    let config = state.invites.clone();
    let invitation = find_invitation(&state, &req.token).await?;

    if invitation.created_by.as_deref() != Some(claims.sub.as_str()) {
        return Err(InviteError::InsufficientPermissions);
    }

    let caller = caller_from_claims(&claims);
    let ctx = CancelInviteCtx {
        invitation: invitation.clone(),
        caller: caller.clone(),
    };
    if !config.can_cancel_invite.evaluate(ctx).await {
        return Err(InviteError::InsufficientPermissions);
    }

    if let Some(hook) = config.hooks.before_cancel_invite.as_ref() {
        hook(LifecycleHookCtx {
            invitation: invitation.clone(),
            caller: caller.clone(),
        })
        .await;
    }

    delete_with_uses(&state, &invitation).await?;

    if let Some(hook) = config.hooks.after_cancel_invite.as_ref() {
        hook(LifecycleHookCtx { invitation, caller }).await;
    }

    Ok(Json(StatusResponse {
        status: true,
        message: "invite cancelled".to_string(),
    }))
}

/// POST /api/invites/reject — Invitee declines a private invitation.
/// Public invites have no designated invitee and cannot be rejected.
pub async fn reject_invite(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<TokenRequest>,
) -> Result<Json<StatusResponse>, InviteError> {
    let config = state.invites.clone();
    let invitation = find_invitation(&state, &req.token).await?;

    match invitation.email.as_deref() {
        Some(bound) if bound == claims.email => {}
        _ => return Err(InviteError::CantRejectInvite),
    }

    let caller = caller_from_claims(&claims);
    let ctx = RejectInviteCtx {
        invitation: invitation.clone(),
        caller: caller.clone(),
    };
    if !config.can_reject_invite.evaluate(ctx).await {
        return Err(InviteError::CantRejectInvite);
    }

    if let Some(hook) = config.hooks.before_reject_invite.as_ref() {
        hook(LifecycleHookCtx {
            invitation: invitation.clone(),
            caller: caller.clone(),
        })
        .await;
    }

    delete_with_uses(&state, &invitation).await?;

    if let Some(hook) = config.hooks.after_reject_invite.as_ref() {
        hook(LifecycleHookCtx { invitation, caller }).await;
    }

    Ok(Json(StatusResponse {
        status: true,
        message: "invite rejected".to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct InviteSummary {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: String,
    /// None = unbounded.
    pub max_uses: Option<i64>,
    pub uses: i64,
    pub redirect_after_upgrade: String,
    pub share_inviter_name: bool,
    pub created_at: String,
    pub expires_at: String,
}

#[derive(Debug, Serialize)]
pub struct InviteListResponse {
    pub invites: Vec<InviteSummary>,
}

/// GET /api/invites — The caller's own invitations, with use counts.
pub async fn list_invites(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<InviteListResponse>, InviteError> {
    let db = state.db.clone();
    let config = state.invites.clone();
    let user_id = claims.sub.clone();

    let invites = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| InviteError::Internal("db lock".to_string()))?;
        let store = InviteStore::new(config.schema.clone());
        let rows = store.list_invitations_by_creator(&conn, &user_id)?;
        Ok::<_, InviteError>(
            rows.into_iter()
                .map(|(invitation, uses)| InviteSummary {
                    token: invitation.token,
                    email: invitation.email,
                    role: invitation.role,
                    max_uses: invitation.max_uses.to_sql(),
                    uses,
                    redirect_after_upgrade: invitation.redirect_after_upgrade,
                    share_inviter_name: invitation.share_inviter_name,
                    created_at: invitation.created_at,
                    expires_at: invitation.expires_at,
                })
                .collect(),
        )
    })
    .await
    .map_err(|e| InviteError::Internal(format!("task join: {e}")))??;

    Ok(Json(InviteListResponse { invites }))
}
