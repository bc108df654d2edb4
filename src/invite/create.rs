use axum::{extract::State, Json};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::db::models::{NewInvite, User};
use crate::db::users;
use crate::invite::error::InviteError;
use crate::invite::options::{InvitationEmail, SenderResponse, SenderResponseRedirect};
use crate::invite::policy::{CreateInviteCtx, PolicyUser};
use crate::invite::store::InviteStore;
use crate::invite::token::{self, TokenType};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateInviteRequest {
    /// Role granted on redemption.
    pub role: String,
    /// Binds the invite to one address (private). Absent = public.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub token_type: Option<TokenType>,
    #[serde(default)]
    pub max_uses: Option<u32>,
    #[serde(default)]
    pub expires_in_secs: Option<i64>,
    #[serde(default)]
    pub redirect_after_upgrade: Option<String>,
    #[serde(default)]
    pub share_inviter_name: Option<bool>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub sender_response: Option<SenderResponse>,
    #[serde(default)]
    pub sender_response_redirect: Option<SenderResponseRedirect>,
}

#[derive(Debug, Serialize)]
pub struct CreateInviteResponse {
    pub status: bool,
    /// Confirmation text, the raw token/code, or a full activation URL,
    /// depending on the resolved sender-response mode.
    pub message: String,
    /// Which page a public activation ultimately targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// POST /api/invites — Mint an invitation.
pub async fn create_invite(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<CreateInviteRequest>,
) -> Result<Json<CreateInviteResponse>, InviteError> {
    let config = state.invites.clone();

    // A private invite nobody can receive is refused, not silently degraded.
    if req.email.is_some() && config.delivery().is_none() {
        return Err(InviteError::EmailNotEnabled);
    }

    let create_ctx = CreateInviteCtx {
        invited: PolicyUser {
            email: req.email.clone(),
            role: Some(req.role.clone()),
            ..Default::default()
        },
        inviter: PolicyUser {
            id: Some(claims.sub.clone()),
            email: Some(claims.email.clone()),
            name: Some(claims.name.clone()),
            role: Some(claims.role.clone()),
        },
    };
    if !config.can_create_invite.evaluate(create_ctx).await {
        return Err(InviteError::InsufficientPermissions);
    }

    let token_type = req.token_type.unwrap_or(config.default_token_type);
    let token = token::generate(token_type, config.custom_token.as_ref());

    let now = config.now();
    let expires_in = req
        .expires_in_secs
        .map(Duration::seconds)
        .unwrap_or(config.default_expires_in);
    let new_invite = NewInvite {
        token: token.clone(),
        created_by: Some(claims.sub.clone()),
        email: req.email.clone(),
        role: req.role.clone(),
        max_uses: config.resolve_max_uses(req.max_uses, req.email.as_deref()),
        redirect_after_upgrade: req
            .redirect_after_upgrade
            .clone()
            .unwrap_or_else(|| config.default_redirect_after_upgrade.clone()),
        share_inviter_name: req
            .share_inviter_name
            .unwrap_or(config.default_share_inviter_name),
        created_at: now.to_rfc3339(),
        expires_at: (now + expires_in).to_rfc3339(),
    };

    // Persist, and for private invites resolve the recipient account in the
    // same closure. A token collision surfaces here as a storage error.
    let db = state.db.clone();
    let blocking_config = config.clone();
    let (invitation, recipient): (_, Option<User>) = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| InviteError::Internal("db lock".to_string()))?;
        let store = InviteStore::new(blocking_config.schema.clone());
        let invitation = store.create_invite(&conn, &new_invite)?;
        let recipient = match invitation.email.as_deref() {
            Some(email) => users::find_by_email(&conn, email)?,
            None => None,
        };
        Ok::<_, InviteError>((invitation, recipient))
    })
    .await
    .map_err(|e| InviteError::Internal(format!("task join: {e}")))??;

    if let Some(email) = invitation.email.clone() {
        // Presence of an account decides provisioning vs upgrade wording.
        let new_account = recipient.is_none();
        let payload = InvitationEmail {
            email,
            name: recipient.map(|u| u.name),
            role: invitation.role.clone(),
            url: config.activation_url(&token, req.callback_url.as_deref()),
            token: token.clone(),
            new_account,
        };
        let deliver = config.delivery().ok_or(InviteError::EmailNotEnabled)?;
        if let Err(e) = deliver(payload).await {
            // The row is deliberately not rolled back: at-least-persisted,
            // best-effort-delivered.
            tracing::error!(error = %e, "invitation email delivery failed");
            return Err(InviteError::Delivery(e.to_string()));
        }
        return Ok(Json(CreateInviteResponse {
            status: true,
            message: "invitation sent".to_string(),
            action: None,
        }));
    }

    let redirect = req
        .sender_response_redirect
        .unwrap_or(config.default_sender_response_redirect);
    let action = match redirect {
        SenderResponseRedirect::SignUp => "sign-up",
        SenderResponseRedirect::SignIn => "sign-in",
    };
    let message = match req.sender_response.unwrap_or(config.default_sender_response) {
        SenderResponse::Confirmation => "invite created".to_string(),
        SenderResponse::Token => token,
        SenderResponse::Url => config.activation_url(&token, req.callback_url.as_deref()),
    };
    Ok(Json(CreateInviteResponse {
        status: true,
        message,
        action: Some(action.to_string()),
    }))
}
