use serde::{Deserialize, Serialize};

/// Remappable table and column names for the two invite entities.
/// Every SQL statement the store issues (and the DDL in migrations) is
/// templated from this — deployments embedding FOYER next to an existing
/// schema can rename freely without touching queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InviteSchema {
    pub invite_table: String,
    pub use_table: String,
    pub invite_fields: InviteFields,
    pub use_fields: UseFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InviteFields {
    pub id: String,
    pub token: String,
    pub created_by: String,
    pub email: String,
    pub role: String,
    pub max_uses: String,
    pub redirect_after_upgrade: String,
    pub share_inviter_name: String,
    pub created_at: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UseFields {
    pub id: String,
    pub invite_id: String,
    pub used_by: String,
    pub used_at: String,
}

impl Default for InviteSchema {
    fn default() -> Self {
        Self {
            invite_table: "invites".to_string(),
            use_table: "invite_uses".to_string(),
            invite_fields: InviteFields::default(),
            use_fields: UseFields::default(),
        }
    }
}

impl Default for InviteFields {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            token: "token".to_string(),
            created_by: "created_by".to_string(),
            email: "email".to_string(),
            role: "role".to_string(),
            max_uses: "max_uses".to_string(),
            redirect_after_upgrade: "redirect_after_upgrade".to_string(),
            share_inviter_name: "share_inviter_name".to_string(),
            created_at: "created_at".to_string(),
            expires_at: "expires_at".to_string(),
        }
    }
}

impl Default for UseFields {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            invite_id: "invite_id".to_string(),
            used_by: "used_by".to_string(),
            used_at: "used_at".to_string(),
        }
    }
}
