use std::sync::{Arc, Once};

use chrono::{DateTime, Duration, Utc};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::invite::hooks::InviteHooks;
use crate::invite::policy::{
    AcceptInviteCtx, CancelInviteCtx, CreateInviteCtx, Policy, RejectInviteCtx,
};
use crate::invite::schema::InviteSchema;
use crate::invite::token::{TokenGenerator, TokenType};

/// Injectable clock. Every expiry comparison in the engine goes through
/// this seam so tests can pin or advance time deterministically.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Use limit for an invitation. Unbounded is a real state, not a magic
/// number, so `allows`/`is_last_use` stay well-defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxUses {
    Unbounded,
    Bounded(u32),
}

impl MaxUses {
    /// Whether another redemption is permitted given `used` recorded uses.
    pub fn allows(&self, used: i64) -> bool {
        match self {
            MaxUses::Unbounded => true,
            MaxUses::Bounded(n) => used < i64::from(*n),
        }
    }

    /// Whether the redemption after `used_before` recorded uses is the last
    /// permitted one (triggering terminal cleanup).
    pub fn is_last_use(&self, used_before: i64) -> bool {
        match self {
            MaxUses::Unbounded => false,
            MaxUses::Bounded(n) => used_before + 1 >= i64::from(*n),
        }
    }

    /// SQL representation: NULL = unbounded.
    pub fn to_sql(&self) -> Option<i64> {
        match self {
            MaxUses::Unbounded => None,
            MaxUses::Bounded(n) => Some(i64::from(*n)),
        }
    }

    pub fn from_sql(value: Option<i64>) -> Self {
        match value {
            None => MaxUses::Unbounded,
            Some(n) if n >= 1 => MaxUses::Bounded(n as u32),
            // A stored limit below 1 would make the invite dead on arrival;
            // clamp to 1 so it stays a single-use invite.
            Some(_) => MaxUses::Bounded(1),
        }
    }
}

/// What the create response carries back for public invites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderResponse {
    /// Just a confirmation message.
    Confirmation,
    /// The raw token/code.
    Token,
    /// A fully qualified activation URL.
    Url,
}

/// Which page an activation URL (or an anonymous redeemer) is pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SenderResponseRedirect {
    SignUp,
    SignIn,
}

/// How the shipped binary delivers private-invite emails.
/// Real transports are wired by embedding code; the binary offers a
/// log-only mode for development and `off` (private invites refused).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailDelivery {
    Off,
    Log,
}

/// Payload handed to the delivery callback for a private invite.
#[derive(Debug, Clone)]
pub struct InvitationEmail {
    pub email: String,
    /// Recipient's name, when an account already exists for the address.
    pub name: Option<String>,
    pub role: String,
    pub url: String,
    pub token: String,
    /// false = the address already has an account (role-upgrade semantics),
    /// true = redemption will provision a new account.
    pub new_account: bool,
}

pub type DeliveryError = Box<dyn std::error::Error + Send + Sync>;

pub type DeliverFn =
    Arc<dyn Fn(InvitationEmail) -> BoxFuture<'static, Result<(), DeliveryError>> + Send + Sync>;

/// Plain-data invite settings as they appear in the `[invites]` section of
/// the config file. Resolved once at startup into an `InviteConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InviteSettings {
    pub token_type: TokenType,
    /// Default use limit. Absent = 1 for private invites, unbounded for public.
    pub max_uses: Option<u32>,
    pub expires_in_secs: i64,
    pub redirect_after_upgrade: String,
    pub share_inviter_name: bool,
    pub sender_response: SenderResponse,
    pub sender_response_redirect: SenderResponseRedirect,
    pub cookie_name: String,
    pub cookie_max_age_secs: i64,
    pub sign_up_path: String,
    pub sign_in_path: String,
    pub email_delivery: EmailDelivery,
    pub schema: InviteSchema,
}

impl Default for InviteSettings {
    fn default() -> Self {
        Self {
            token_type: TokenType::Token,
            max_uses: None,
            expires_in_secs: 48 * 3600,
            redirect_after_upgrade: "/".to_string(),
            share_inviter_name: false,
            sender_response: SenderResponse::Url,
            sender_response_redirect: SenderResponseRedirect::SignUp,
            cookie_name: "foyer_pending_invite".to_string(),
            cookie_max_age_secs: 600,
            sign_up_path: "/sign-up".to_string(),
            sign_in_path: "/sign-in".to_string(),
            email_delivery: EmailDelivery::Off,
            schema: InviteSchema::default(),
        }
    }
}

/// Fully-resolved engine configuration: settings plus the pluggable surface
/// (delivery callback, policies, hooks, clock). Built once; handlers merge
/// per-call payload fields against the `default_*` fields, and a per-call
/// `None` always falls through to the default here, never to a literal.
pub struct InviteConfig {
    pub schema: InviteSchema,
    /// Public base URL of this deployment, for building activation URLs.
    pub base_url: String,
    pub default_token_type: TokenType,
    pub custom_token: Option<TokenGenerator>,
    pub default_max_uses: Option<MaxUses>,
    pub default_expires_in: Duration,
    pub default_redirect_after_upgrade: String,
    pub default_share_inviter_name: bool,
    pub default_sender_response: SenderResponse,
    pub default_sender_response_redirect: SenderResponseRedirect,
    pub cookie_name: String,
    pub cookie_max_age_secs: i64,
    pub sign_up_path: String,
    pub sign_in_path: String,
    pub send_invitation: Option<DeliverFn>,
    /// Deprecated alias of `send_invitation`; consulted only when the
    /// primary is absent.
    pub send_role_upgrade: Option<DeliverFn>,
    pub can_create_invite: Policy<CreateInviteCtx>,
    pub can_accept_invite: Policy<AcceptInviteCtx>,
    pub can_cancel_invite: Policy<CancelInviteCtx>,
    pub can_reject_invite: Policy<RejectInviteCtx>,
    pub hooks: InviteHooks,
    pub clock: Clock,
    legacy_delivery_warn: Once,
}

/// RFC 6265 cookie-name token: ASCII alphanumerics plus a small set of
/// punctuation. Anything else would make the Set-Cookie header invalid.
fn valid_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

impl InviteConfig {
    pub fn resolve(settings: InviteSettings, base_url: String) -> Self {
        let cookie_name = if valid_cookie_name(&settings.cookie_name) {
            settings.cookie_name
        } else {
            let fallback = InviteSettings::default().cookie_name;
            tracing::warn!(
                configured = %settings.cookie_name,
                fallback = %fallback,
                "cookie_name is not a valid cookie token, using the default"
            );
            fallback
        };
        Self {
            schema: settings.schema,
            base_url,
            default_token_type: settings.token_type,
            custom_token: None,
            default_max_uses: settings.max_uses.map(MaxUses::Bounded),
            default_expires_in: Duration::seconds(settings.expires_in_secs),
            default_redirect_after_upgrade: settings.redirect_after_upgrade,
            default_share_inviter_name: settings.share_inviter_name,
            default_sender_response: settings.sender_response,
            default_sender_response_redirect: settings.sender_response_redirect,
            cookie_name,
            cookie_max_age_secs: settings.cookie_max_age_secs,
            sign_up_path: settings.sign_up_path,
            sign_in_path: settings.sign_in_path,
            send_invitation: None,
            send_role_upgrade: None,
            can_create_invite: Policy::Allow,
            can_accept_invite: Policy::Allow,
            can_cancel_invite: Policy::Allow,
            can_reject_invite: Policy::Allow,
            hooks: InviteHooks::default(),
            clock: system_clock(),
            legacy_delivery_warn: Once::new(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Resolve the delivery capability: primary, else the legacy alias
    /// (with a one-time deprecation warning), else none.
    pub fn delivery(&self) -> Option<&DeliverFn> {
        if let Some(f) = self.send_invitation.as_ref() {
            return Some(f);
        }
        let legacy = self.send_role_upgrade.as_ref()?;
        self.legacy_delivery_warn.call_once(|| {
            tracing::warn!(
                "send_role_upgrade is deprecated; configure send_invitation instead"
            );
        });
        Some(legacy)
    }

    /// maxUses resolution: explicit ?? configured default ?? (private ? 1 : unbounded).
    pub fn resolve_max_uses(&self, explicit: Option<u32>, email: Option<&str>) -> MaxUses {
        if let Some(n) = explicit {
            return MaxUses::Bounded(n.max(1));
        }
        if let Some(default) = self.default_max_uses {
            return default;
        }
        if email.is_some() {
            MaxUses::Bounded(1)
        } else {
            MaxUses::Unbounded
        }
    }

    /// Fully qualified browser activation URL for a token.
    pub fn activation_url(&self, token: &str, callback_url: Option<&str>) -> String {
        let mut url = match url::Url::parse(&self.base_url) {
            Ok(u) => u,
            // An unparseable base_url is an operator mistake; fall back to
            // a relative path so the token still reaches the caller.
            Err(_) => return format!("/api/invites/activate/{token}"),
        };
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(["api", "invites", "activate", token]);
        }
        if let Some(cb) = callback_url {
            url.query_pairs_mut().append_pair("callback_url", cb);
        }
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_uses_bounds() {
        assert!(MaxUses::Unbounded.allows(1_000_000));
        assert!(!MaxUses::Unbounded.is_last_use(1_000_000));
        assert!(MaxUses::Bounded(2).allows(1));
        assert!(!MaxUses::Bounded(2).allows(2));
        assert!(MaxUses::Bounded(2).is_last_use(1));
        assert!(!MaxUses::Bounded(2).is_last_use(0));
        assert_eq!(MaxUses::from_sql(None), MaxUses::Unbounded);
        assert_eq!(MaxUses::from_sql(Some(0)), MaxUses::Bounded(1));
        assert_eq!(MaxUses::Bounded(3).to_sql(), Some(3));
        assert_eq!(MaxUses::Unbounded.to_sql(), None);
    }

    #[test]
    fn max_uses_resolution_order() {
        let mut config =
            InviteConfig::resolve(InviteSettings::default(), "http://localhost".to_string());
        // No default configured: email rule applies
        assert_eq!(config.resolve_max_uses(None, Some("a@x.com")), MaxUses::Bounded(1));
        assert_eq!(config.resolve_max_uses(None, None), MaxUses::Unbounded);
        // Explicit beats everything
        assert_eq!(config.resolve_max_uses(Some(5), Some("a@x.com")), MaxUses::Bounded(5));
        // Configured default beats the email rule
        config.default_max_uses = Some(MaxUses::Bounded(3));
        assert_eq!(config.resolve_max_uses(None, None), MaxUses::Bounded(3));
        assert_eq!(config.resolve_max_uses(Some(7), None), MaxUses::Bounded(7));
    }

    #[test]
    fn activation_url_shape() {
        let config =
            InviteConfig::resolve(InviteSettings::default(), "http://localhost:1984".to_string());
        let url = config.activation_url("abc123", Some("/welcome"));
        assert_eq!(
            url,
            "http://localhost:1984/api/invites/activate/abc123?callback_url=%2Fwelcome"
        );
        assert_eq!(
            config.activation_url("abc123", None),
            "http://localhost:1984/api/invites/activate/abc123"
        );
    }

    #[test]
    fn invalid_cookie_name_falls_back_to_default() {
        let mut settings = InviteSettings::default();
        settings.cookie_name = "pending invite;".to_string();
        let config = InviteConfig::resolve(settings, "http://localhost".to_string());
        assert_eq!(config.cookie_name, "foyer_pending_invite");

        let mut settings = InviteSettings::default();
        settings.cookie_name = "my_invite-cookie".to_string();
        let config = InviteConfig::resolve(settings, "http://localhost".to_string());
        assert_eq!(config.cookie_name, "my_invite-cookie");
    }

    #[test]
    fn legacy_delivery_fallback() {
        let mut config =
            InviteConfig::resolve(InviteSettings::default(), "http://localhost".to_string());
        assert!(config.delivery().is_none());
        config.send_role_upgrade = Some(Arc::new(|_email| {
            Box::pin(async { Ok(()) }) as futures_util::future::BoxFuture<'static, _>
        }));
        assert!(config.delivery().is_some());
    }
}
