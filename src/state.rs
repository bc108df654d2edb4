use std::sync::Arc;

use crate::db::DbPool;
use crate::invite::options::InviteConfig;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Signing secret (256-bit random key) for session tokens and the
    /// pending-invite cookie
    pub secret: Vec<u8>,
    /// Resolved invite engine configuration: defaults, policies, hooks,
    /// delivery callback, clock
    pub invites: Arc<InviteConfig>,
    /// Role assigned to freshly signed-up accounts
    pub default_role: String,
    /// When set, a sign-up with this email gets the admin role (bootstrap)
    pub bootstrap_admin_email: Option<String>,
}
