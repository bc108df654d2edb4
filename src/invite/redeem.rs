use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::jwt;
use crate::auth::middleware::MaybeClaims;
use crate::db::models::{Invitation, User};
use crate::db::users;
use crate::invite::cookie;
use crate::invite::error::InviteError;
use crate::invite::hooks::{AcceptHookCtx, InvitationUsedCtx, InvitedUser};
use crate::invite::options::SenderResponseRedirect;
use crate::invite::policy::AcceptInviteCtx;
use crate::invite::store::InviteStore;
use crate::state::AppState;

/// Result of a committed redemption.
#[derive(Debug, Clone)]
pub struct RedeemOutcome {
    /// The redeemed account, re-read after the role mutation.
    pub user: User,
    pub redirect_to: String,
    pub inviter_name: Option<String>,
    /// True when this was the last permitted use and the invitation row
    /// (plus its usage ledger) is gone.
    pub invitation_deleted: bool,
}

/// Shared validation core for both activation entry shapes.
/// Order matters: exhaustion is checked before expiry so a fully-used token
/// reports the same error whether or not it has also expired.
pub async fn validate_token(state: &AppState, token: &str) -> Result<Invitation, InviteError> {
    let db = state.db.clone();
    let config = state.invites.clone();
    let token = token.to_string();

    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| InviteError::Internal("db lock".to_string()))?;
        let store = InviteStore::new(config.schema.clone());

        let invitation = store
            .find_invitation(&conn, &token)?
            .ok_or(InviteError::InvalidToken)?;

        let uses = store.count_invitation_uses(&conn, &invitation.id)?;
        if !invitation.max_uses.allows(uses) {
            return Err(InviteError::TokenExhausted);
        }
        if invitation.is_expired(config.now()) {
            return Err(InviteError::TokenExpired);
        }
        Ok(invitation)
    })
    .await
    .map_err(|e| InviteError::Internal(format!("task join: {e}")))?
}

/// The Consume transition: email binding, accept policy, before-hook
/// (which may substitute the invited-user record), role mutation, usage
/// accounting, after-hook, and the best-effort used-notification.
///
/// The count-recheck, role mutation, and use-insert-or-delete all run inside
/// one blocking closure holding the connection lock, so two concurrent
/// redemptions of the same invitation serialize and the loser sees the
/// exhaustion error.
pub async fn consume(
    state: &AppState,
    invitation: Invitation,
    user: User,
    new_account: bool,
) -> Result<RedeemOutcome, InviteError> {
    // A private invite is bound to exactly one address. A valid token in the
    // wrong hands must not upgrade a different identity.
    if let Some(bound) = invitation.email.as_deref() {
        if bound != user.email {
            return Err(InviteError::InvalidEmail);
        }
    }

    let config = state.invites.clone();
    let mut invited = InvitedUser {
        id: user.id.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role.clone(),
    };

    let accept_ctx = AcceptInviteCtx {
        invited: invited.clone(),
        new_account,
    };
    if !config.can_accept_invite.evaluate(accept_ctx).await {
        return Err(InviteError::CantAcceptInvite);
    }

    if let Some(hook) = config.hooks.before_accept_invite.as_ref() {
        let ctx = AcceptHookCtx {
            invitation: invitation.clone(),
            user: invited.clone(),
            new_account,
        };
        if let Some(replacement) = hook(ctx).await {
            invited = replacement;
        }
    }

    let db = state.db.clone();
    let blocking_config = config.clone();
    let blocking_invitation = invitation.clone();
    let blocking_invited = invited.clone();
    let (updated_user, invitation_deleted, inviter_name) = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| InviteError::Internal("db lock".to_string()))?;
        let store = InviteStore::new(blocking_config.schema.clone());
        let now = blocking_config.now();

        // Re-fetch and re-check under the lock: validation ran before we
        // held it, and the terminal path deletes the row together with its
        // ledger, so a stale copy plus a zero count would read as fresh.
        // A vanished row means the last permitted use already committed.
        let current = store
            .find_invitation(&conn, &blocking_invitation.token)?
            .ok_or(InviteError::TokenExhausted)?;
        let uses_before = store.count_invitation_uses(&conn, &current.id)?;
        if !current.max_uses.allows(uses_before) {
            return Err(InviteError::TokenExhausted);
        }
        if current.is_expired(now) {
            return Err(InviteError::TokenExpired);
        }

        let now_str = now.to_rfc3339();
        users::update_role(&conn, &blocking_invited.id, &current.role, &now_str)?;

        let deleted = if current.max_uses.is_last_use(uses_before) {
            // Terminal: the invitation never persists past its last use.
            store.delete_invitation_uses(&conn, &current.id)?;
            store.delete_invitation(&conn, &current.token)?;
            true
        } else {
            store.create_invitation_use(
                &conn,
                &current.id,
                Some(&blocking_invited.id),
                &now_str,
            )?;
            false
        };

        let inviter_name = if current.share_inviter_name {
            current
                .created_by
                .as_deref()
                .and_then(|id| users::find_by_id(&conn, id).ok().flatten())
                .map(|u| u.name)
        } else {
            None
        };

        let updated = users::find_by_id(&conn, &blocking_invited.id)?
            .ok_or_else(|| InviteError::Internal("redeemed account no longer exists".to_string()))?;
        Ok::<_, InviteError>((updated, deleted, inviter_name))
    })
    .await
    .map_err(|e| InviteError::Internal(format!("task join: {e}")))??;

    if let Some(hook) = config.hooks.after_accept_invite.as_ref() {
        let ctx = AcceptHookCtx {
            invitation: invitation.clone(),
            user: invited.clone(),
            new_account,
        };
        hook(ctx).await;
    }

    // Best-effort: the role upgrade has committed and a notification failure
    // must never undo it.
    if let Some(callback) = config.hooks.on_invitation_used.as_ref() {
        let ctx = InvitationUsedCtx {
            invitation: invitation.clone(),
            user: invited.clone(),
            invitation_deleted,
        };
        if let Err(e) = callback(ctx).await {
            tracing::error!(error = %e, token = %invitation.token, "on_invitation_used callback failed");
        }
    }

    Ok(RedeemOutcome {
        user: updated_user,
        redirect_to: invitation.redirect_after_upgrade,
        inviter_name,
        invitation_deleted,
    })
}

async fn load_session_user(state: &AppState, user_id: &str) -> Result<User, InviteError> {
    let db = state.db.clone();
    let id = user_id.to_string();
    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| InviteError::Internal("db lock".to_string()))?;
        users::find_by_id(&conn, &id)?
            .ok_or_else(|| InviteError::Internal("session account no longer exists".to_string()))
    })
    .await
    .map_err(|e| InviteError::Internal(format!("task join: {e}")))?
}

/// Where an anonymous redeemer is sent to authenticate: private invites pick
/// sign-in when the bound address already has an account, sign-up otherwise;
/// public invites follow the configured default.
async fn anonymous_target(
    state: &AppState,
    invitation: &Invitation,
) -> Result<(&'static str, String), InviteError> {
    let config = &state.invites;

    let page = match invitation.email.clone() {
        Some(email) => {
            let db = state.db.clone();
            let exists = tokio::task::spawn_blocking(move || {
                let conn = db
                    .lock()
                    .map_err(|_| InviteError::Internal("db lock".to_string()))?;
                Ok::<_, InviteError>(users::find_by_email(&conn, &email)?.is_some())
            })
            .await
            .map_err(|e| InviteError::Internal(format!("task join: {e}")))??;
            if exists {
                SenderResponseRedirect::SignIn
            } else {
                SenderResponseRedirect::SignUp
            }
        }
        None => config.default_sender_response_redirect,
    };

    Ok(match page {
        SenderResponseRedirect::SignUp => ("sign-up", config.sign_up_path.clone()),
        SenderResponseRedirect::SignIn => ("sign-in", config.sign_in_path.clone()),
    })
}

fn append_query(target: &str, pairs: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    let query = serializer.finish();
    if target.contains('?') {
        format!("{target}&{query}")
    } else {
        format!("{target}?{query}")
    }
}

/// Browser-flow failures surface as redirect query params, not JSON.
fn error_redirect(callback_url: Option<&str>, err: &InviteError) -> Response {
    let target = callback_url.unwrap_or("/");
    let location = append_query(target, &[("error", err.code()), ("message", &err.to_string())]);
    Redirect::to(&location).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub token: String,
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActivateResponse {
    pub status: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inviter_name: Option<String>,
    /// Fresh session token after a committed role change, so the caller
    /// never holds a stale-role session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

/// POST /api/invites/activate — Direct (JSON) activation.
/// Authenticated callers consume immediately; anonymous callers get the
/// pending-redemption cookie and are told where to authenticate.
pub async fn activate_invite(
    State(state): State<AppState>,
    MaybeClaims(claims): MaybeClaims,
    Json(req): Json<ActivateRequest>,
) -> Result<Response, InviteError> {
    let invitation = validate_token(&state, &req.token).await?;

    match claims {
        Some(claims) => {
            let user = load_session_user(&state, &claims.sub).await?;
            let outcome = consume(&state, invitation, user.clone(), false).await?;
            // The before-accept transform may have granted the role to a
            // different account; the refreshed session stays the caller's.
            let session_user = if outcome.user.id == user.id {
                &outcome.user
            } else {
                &user
            };
            let session_token = jwt::issue_session_token(&state.secret, session_user)
                .map_err(|e| InviteError::Internal(format!("session token: {e}")))?;
            Ok(Json(ActivateResponse {
                status: true,
                message: "invite accepted".to_string(),
                action: None,
                redirect_to: Some(outcome.redirect_to),
                inviter_name: outcome.inviter_name,
                session_token: Some(session_token),
            })
            .into_response())
        }
        None => {
            let (action, redirect_to) = anonymous_target(&state, &invitation).await?;
            let config = &state.invites;
            let mut response = Json(ActivateResponse {
                status: true,
                message: "authentication required to accept this invite".to_string(),
                action: Some(action.to_string()),
                redirect_to: Some(redirect_to),
                inviter_name: None,
                session_token: None,
            })
            .into_response();
            response.headers_mut().append(
                header::SET_COOKIE,
                cookie::pending_cookie(
                    &config.cookie_name,
                    &state.secret,
                    &invitation.token,
                    config.cookie_max_age_secs,
                ),
            );
            Ok(response)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub callback_url: Option<String>,
}

/// GET /api/invites/activate/{token} — Browser activation callback.
/// Same validation core as the direct shape, but every outcome is an HTTP
/// redirect: failures carry error/message query params.
pub async fn activate_invite_callback(
    State(state): State<AppState>,
    MaybeClaims(claims): MaybeClaims,
    Path(token): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let callback = query.callback_url.as_deref();

    let invitation = match validate_token(&state, &token).await {
        Ok(invitation) => invitation,
        Err(err) => return error_redirect(callback, &err),
    };

    match claims {
        Some(claims) => {
            let user = match load_session_user(&state, &claims.sub).await {
                Ok(user) => user,
                Err(err) => return error_redirect(callback, &err),
            };
            match consume(&state, invitation, user, false).await {
                Ok(outcome) => {
                    let target = match outcome.inviter_name.as_deref() {
                        Some(name) => append_query(&outcome.redirect_to, &[("inviter", name)]),
                        None => outcome.redirect_to,
                    };
                    Redirect::to(&target).into_response()
                }
                Err(err) => error_redirect(callback, &err),
            }
        }
        None => {
            let (_, redirect_to) = match anonymous_target(&state, &invitation).await {
                Ok(target) => target,
                Err(err) => return error_redirect(callback, &err),
            };
            let config = &state.invites;
            let mut response = Redirect::to(&redirect_to).into_response();
            response.headers_mut().append(
                header::SET_COOKIE,
                cookie::pending_cookie(
                    &config.cookie_name,
                    &state.secret,
                    &invitation.token,
                    config.cookie_max_age_secs,
                ),
            );
            response
        }
    }
}

/// Outcome of the post-auth resumption hook.
pub struct ResumeReport {
    /// None = no pending cookie (the common path for ordinary auth events).
    pub outcome: Option<Result<RedeemOutcome, InviteError>>,
    /// Whether the pending cookie should be expired in the response.
    pub clear_cookie: bool,
}

/// Post-auth resumption: fires after sign-up and sign-in. Re-runs the
/// validation core (time may have passed since activation) and then Consume.
/// The cookie is cleared on success and on any terminal failure; transient
/// storage failures keep it so a retry within the cookie's lifetime can
/// still succeed.
pub async fn resume_pending_invite(
    state: &AppState,
    headers: &HeaderMap,
    user: &User,
    new_account: bool,
) -> ResumeReport {
    let config = &state.invites;
    let Some(token) = cookie::read_pending(headers, &config.cookie_name, &state.secret) else {
        return ResumeReport {
            outcome: None,
            clear_cookie: false,
        };
    };

    let result = match validate_token(state, &token).await {
        Ok(invitation) => consume(state, invitation, user.clone(), new_account).await,
        Err(err) => Err(err),
    };

    let clear_cookie = match &result {
        Ok(_) => true,
        Err(err) => err.is_terminal(),
    };
    if let Err(err) = &result {
        tracing::debug!(code = err.code(), "pending invite resumption failed");
    }

    ResumeReport {
        outcome: Some(result),
        clear_cookie,
    }
}
