use std::path::Path;

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::Rng;

use crate::auth::middleware::Claims;
use crate::db::models::User;

/// Session token lifetime (seconds).
const SESSION_TTL: i64 = 24 * 3600;

/// Load or generate the signing key (256-bit random secret).
/// Key is stored as raw bytes in data_dir/session_secret and doubles as the
/// HMAC key for the pending-invite cookie.
pub fn load_or_generate_secret(data_dir: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let key_path = Path::new(data_dir).join("session_secret");

    if key_path.exists() {
        let key = std::fs::read(&key_path)?;
        if key.len() == 32 {
            tracing::info!("Session signing key loaded from {}", key_path.display());
            return Ok(key);
        }
        tracing::warn!("Session key file has wrong size ({}), regenerating", key.len());
    }

    let key: [u8; 32] = rand::rng().random();
    std::fs::write(&key_path, key)?;
    tracing::info!("Session signing key generated at {}", key_path.display());
    Ok(key.to_vec())
}

/// Issue a session token for a user. Called at sign-up, sign-in, and again
/// after an invite redemption so the new role is visible immediately.
pub fn issue_session_token(
    secret: &[u8],
    user: &User,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role.clone(),
        iat: now,
        exp: now + SESSION_TTL,
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(secret),
    )
}
