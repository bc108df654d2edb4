//! Database row types for all tables.
//! These correspond 1:1 to the SQLite schema defined in migrations.rs,
//! except that the invite tables may live under remapped names (see
//! `invite::schema::InviteSchema`).

use crate::invite::options::MaxUses;

/// Account record in the users table (host-auth boundary).
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

/// An invitation. Identity is the token (UNIQUE index); `id` is a surrogate
/// key referenced by the usage ledger. Immutable once created — the only
/// mutation is deletion (last use, cancel, or reject).
#[derive(Debug, Clone)]
pub struct Invitation {
    pub id: String,
    pub token: String,
    /// Creator. NULL if the creator account was later removed.
    pub created_by: Option<String>,
    /// Presence makes the invite private (bound to this address).
    pub email: Option<String>,
    /// Role granted on redemption. Semantics belong to the deployer's policies.
    pub role: String,
    pub max_uses: MaxUses,
    pub redirect_after_upgrade: String,
    pub share_inviter_name: bool,
    pub created_at: String,
    /// RFC 3339. Always compared against the injected clock, never wall-clock.
    pub expires_at: String,
}

impl Invitation {
    pub fn is_private(&self) -> bool {
        self.email.is_some()
    }

    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match chrono::DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(exp) => now > exp,
            // Unparseable expiry reads as expired, not immortal.
            Err(_) => true,
        }
    }
}

/// Append-only usage ledger row.
#[derive(Debug, Clone)]
pub struct InvitationUse {
    pub id: String,
    pub invite_id: String,
    pub used_by: Option<String>,
    pub used_at: String,
}

/// Fully-resolved input for inserting an invitation. Produced by the
/// create handler after merging per-call fields with configured defaults.
#[derive(Debug, Clone)]
pub struct NewInvite {
    pub token: String,
    pub created_by: Option<String>,
    pub email: Option<String>,
    pub role: String,
    pub max_uses: MaxUses,
    pub redirect_after_upgrade: String,
    pub share_inviter_name: bool,
    pub created_at: String,
    pub expires_at: String,
}
