use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::db::models::Invitation;

/// The account a redemption is applied to, as seen by hooks and policies.
#[derive(Debug, Clone)]
pub struct InvitedUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct AcceptHookCtx {
    pub invitation: Invitation,
    pub user: InvitedUser,
    pub new_account: bool,
}

/// Context for the cancel/reject hook pairs.
#[derive(Debug, Clone)]
pub struct LifecycleHookCtx {
    pub invitation: Invitation,
    pub caller: InvitedUser,
}

#[derive(Debug, Clone)]
pub struct InvitationUsedCtx {
    pub invitation: Invitation,
    pub user: InvitedUser,
    /// Whether this use was the last permitted one (the row is gone).
    pub invitation_deleted: bool,
}

pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// before_accept_invite is a transform: returning Some substitutes the
/// invited-user record before the role mutation; None means no change.
pub type AcceptTransform =
    Arc<dyn Fn(AcceptHookCtx) -> BoxFuture<'static, Option<InvitedUser>> + Send + Sync>;

pub type Observer<Ctx> = Arc<dyn Fn(Ctx) -> BoxFuture<'static, ()> + Send + Sync>;

/// Best-effort notification after a committed use. Failures are logged and
/// never surfaced; the committed state change stands.
pub type UsedCallback =
    Arc<dyn Fn(InvitationUsedCtx) -> BoxFuture<'static, Result<(), HookError>> + Send + Sync>;

/// Ordered before/after callbacks around accept, cancel, and reject.
#[derive(Clone, Default)]
pub struct InviteHooks {
    pub before_accept_invite: Option<AcceptTransform>,
    pub after_accept_invite: Option<Observer<AcceptHookCtx>>,
    pub before_cancel_invite: Option<Observer<LifecycleHookCtx>>,
    pub after_cancel_invite: Option<Observer<LifecycleHookCtx>>,
    pub before_reject_invite: Option<Observer<LifecycleHookCtx>>,
    pub after_reject_invite: Option<Observer<LifecycleHookCtx>>,
    pub on_invitation_used: Option<UsedCallback>,
}
