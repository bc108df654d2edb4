use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::db::models::Invitation;
use crate::invite::hooks::InvitedUser;

/// A permission predicate: a static verdict or a dynamic async check
/// evaluated per request with full context. One tagged union instead of
/// function-or-boolean checks scattered through the engine.
pub enum Policy<Ctx> {
    Allow,
    Deny,
    Dynamic(Arc<dyn Fn(Ctx) -> BoxFuture<'static, bool> + Send + Sync>),
}

impl<Ctx> Clone for Policy<Ctx> {
    fn clone(&self) -> Self {
        match self {
            Policy::Allow => Policy::Allow,
            Policy::Deny => Policy::Deny,
            Policy::Dynamic(f) => Policy::Dynamic(f.clone()),
        }
    }
}

impl<Ctx> Policy<Ctx> {
    pub async fn evaluate(&self, ctx: Ctx) -> bool {
        match self {
            Policy::Allow => true,
            Policy::Deny => false,
            Policy::Dynamic(predicate) => predicate(ctx).await,
        }
    }
}

/// Minimal view of a party in a create-policy decision. The invited side may
/// be a not-yet-existing account, so everything is optional.
#[derive(Debug, Clone, Default)]
pub struct PolicyUser {
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateInviteCtx {
    pub invited: PolicyUser,
    pub inviter: PolicyUser,
}

#[derive(Debug, Clone)]
pub struct AcceptInviteCtx {
    pub invited: InvitedUser,
    pub new_account: bool,
}

#[derive(Debug, Clone)]
pub struct CancelInviteCtx {
    pub invitation: Invitation,
    pub caller: InvitedUser,
}

#[derive(Debug, Clone)]
pub struct RejectInviteCtx {
    pub invitation: Invitation,
    pub caller: InvitedUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_policies() {
        let allow: Policy<()> = Policy::Allow;
        let deny: Policy<()> = Policy::Deny;
        assert!(allow.evaluate(()).await);
        assert!(!deny.evaluate(()).await);
    }

    #[tokio::test]
    async fn dynamic_policy_sees_context() {
        let policy: Policy<CreateInviteCtx> = Policy::Dynamic(Arc::new(|ctx| {
            Box::pin(async move { ctx.inviter.role.as_deref() == Some("admin") })
        }));

        let admin = CreateInviteCtx {
            invited: PolicyUser::default(),
            inviter: PolicyUser {
                role: Some("admin".to_string()),
                ..Default::default()
            },
        };
        let member = CreateInviteCtx {
            invited: PolicyUser::default(),
            inviter: PolicyUser {
                role: Some("member".to_string()),
                ..Default::default()
            },
        };
        assert!(policy.evaluate(admin).await);
        assert!(!policy.evaluate(member).await);
    }
}
