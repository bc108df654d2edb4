use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::models::{Invitation, InvitationUse, NewInvite};
use crate::invite::options::MaxUses;
use crate::invite::schema::InviteSchema;

/// Persistence facade over the invitation and usage-ledger tables.
/// All SQL is templated from the configured schema; methods are synchronous
/// over a held connection so lifecycle paths can run several operations
/// under one lock (the consume sequence depends on this).
/// No operation retries internally — failures propagate as storage errors.
pub struct InviteStore {
    pub schema: InviteSchema,
}

impl InviteStore {
    pub fn new(schema: InviteSchema) -> Self {
        Self { schema }
    }

    fn invite_columns(&self) -> String {
        let f = &self.schema.invite_fields;
        format!(
            "{}, {}, {}, {}, {}, {}, {}, {}, {}, {}",
            f.id,
            f.token,
            f.created_by,
            f.email,
            f.role,
            f.max_uses,
            f.redirect_after_upgrade,
            f.share_inviter_name,
            f.created_at,
            f.expires_at
        )
    }

    fn row_to_invitation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Invitation> {
        Ok(Invitation {
            id: row.get(0)?,
            token: row.get(1)?,
            created_by: row.get(2)?,
            email: row.get(3)?,
            role: row.get(4)?,
            max_uses: MaxUses::from_sql(row.get(5)?),
            redirect_after_upgrade: row.get(6)?,
            share_inviter_name: row.get::<_, i64>(7)? != 0,
            created_at: row.get(8)?,
            expires_at: row.get(9)?,
        })
    }

    pub fn create_invite(
        &self,
        conn: &Connection,
        new: &NewInvite,
    ) -> rusqlite::Result<Invitation> {
        let id = Uuid::now_v7().to_string();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            self.schema.invite_table,
            self.invite_columns()
        );
        conn.execute(
            &sql,
            rusqlite::params![
                id,
                new.token,
                new.created_by,
                new.email,
                new.role,
                new.max_uses.to_sql(),
                new.redirect_after_upgrade,
                new.share_inviter_name as i64,
                new.created_at,
                new.expires_at,
            ],
        )?;
        Ok(Invitation {
            id,
            token: new.token.clone(),
            created_by: new.created_by.clone(),
            email: new.email.clone(),
            role: new.role.clone(),
            max_uses: new.max_uses,
            redirect_after_upgrade: new.redirect_after_upgrade.clone(),
            share_inviter_name: new.share_inviter_name,
            created_at: new.created_at.clone(),
            expires_at: new.expires_at.clone(),
        })
    }

    pub fn find_invitation(
        &self,
        conn: &Connection,
        token: &str,
    ) -> rusqlite::Result<Option<Invitation>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            self.invite_columns(),
            self.schema.invite_table,
            self.schema.invite_fields.token
        );
        conn.query_row(&sql, [token], Self::row_to_invitation)
            .optional()
    }

    pub fn delete_invitation(&self, conn: &Connection, token: &str) -> rusqlite::Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            self.schema.invite_table, self.schema.invite_fields.token
        );
        conn.execute(&sql, [token])?;
        Ok(())
    }

    pub fn create_invitation_use(
        &self,
        conn: &Connection,
        invite_id: &str,
        used_by: Option<&str>,
        used_at: &str,
    ) -> rusqlite::Result<InvitationUse> {
        let id = Uuid::now_v7().to_string();
        let f = &self.schema.use_fields;
        let sql = format!(
            "INSERT INTO {} ({}, {}, {}, {}) VALUES (?1, ?2, ?3, ?4)",
            self.schema.use_table, f.id, f.invite_id, f.used_by, f.used_at
        );
        conn.execute(&sql, rusqlite::params![id, invite_id, used_by, used_at])?;
        Ok(InvitationUse {
            id,
            invite_id: invite_id.to_string(),
            used_by: used_by.map(str::to_string),
            used_at: used_at.to_string(),
        })
    }

    pub fn count_invitation_uses(
        &self,
        conn: &Connection,
        invite_id: &str,
    ) -> rusqlite::Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            self.schema.use_table, self.schema.use_fields.invite_id
        );
        conn.query_row(&sql, [invite_id], |row| row.get(0))
    }

    /// Bulk delete of the usage ledger, used before/with invitation deletion.
    pub fn delete_invitation_uses(
        &self,
        conn: &Connection,
        invite_id: &str,
    ) -> rusqlite::Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            self.schema.use_table, self.schema.use_fields.invite_id
        );
        conn.execute(&sql, [invite_id])?;
        Ok(())
    }

    /// Invitations created by one user, with their current use counts.
    pub fn list_invitations_by_creator(
        &self,
        conn: &Connection,
        user_id: &str,
    ) -> rusqlite::Result<Vec<(Invitation, i64)>> {
        let sql = format!(
            "SELECT {cols}, (SELECT COUNT(*) FROM {uses} WHERE {use_invite_id} = {invites}.{id}) \
             FROM {invites} WHERE {created_by} = ?1 ORDER BY {created_at} DESC",
            cols = self.invite_columns(),
            uses = self.schema.use_table,
            use_invite_id = self.schema.use_fields.invite_id,
            invites = self.schema.invite_table,
            id = self.schema.invite_fields.id,
            created_by = self.schema.invite_fields.created_by,
            created_at = self.schema.invite_fields.created_at,
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([user_id], |row| {
            let invitation = Self::row_to_invitation(row)?;
            let uses: i64 = row.get(10)?;
            Ok((invitation, uses))
        })?;
        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;

    fn test_conn(schema: &InviteSchema) -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        migrations::apply(&mut conn, schema).unwrap();
        conn
    }

    fn sample_invite(token: &str, max_uses: MaxUses) -> NewInvite {
        NewInvite {
            token: token.to_string(),
            created_by: None,
            email: None,
            role: "member".to_string(),
            max_uses,
            redirect_after_upgrade: "/".to_string(),
            share_inviter_name: false,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            expires_at: "2026-01-03T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn create_find_delete_round_trip() {
        let schema = InviteSchema::default();
        let conn = test_conn(&schema);
        let store = InviteStore::new(schema);

        let created = store
            .create_invite(&conn, &sample_invite("tok-1", MaxUses::Bounded(2)))
            .unwrap();
        let found = store.find_invitation(&conn, "tok-1").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.max_uses, MaxUses::Bounded(2));
        assert!(!found.is_private());

        store.delete_invitation(&conn, "tok-1").unwrap();
        assert!(store.find_invitation(&conn, "tok-1").unwrap().is_none());
    }

    #[test]
    fn duplicate_token_surfaces_as_storage_error() {
        let schema = InviteSchema::default();
        let conn = test_conn(&schema);
        let store = InviteStore::new(schema);

        store
            .create_invite(&conn, &sample_invite("dup", MaxUses::Unbounded))
            .unwrap();
        let err = store.create_invite(&conn, &sample_invite("dup", MaxUses::Unbounded));
        assert!(err.is_err());
    }

    #[test]
    fn use_ledger_counts_and_bulk_delete() {
        let schema = InviteSchema::default();
        let conn = test_conn(&schema);
        let store = InviteStore::new(schema);

        let invite = store
            .create_invite(&conn, &sample_invite("tok-2", MaxUses::Unbounded))
            .unwrap();
        assert_eq!(store.count_invitation_uses(&conn, &invite.id).unwrap(), 0);

        store
            .create_invitation_use(&conn, &invite.id, Some("user-1"), "2026-01-02T00:00:00+00:00")
            .unwrap();
        store
            .create_invitation_use(&conn, &invite.id, None, "2026-01-02T01:00:00+00:00")
            .unwrap();
        assert_eq!(store.count_invitation_uses(&conn, &invite.id).unwrap(), 2);

        store.delete_invitation_uses(&conn, &invite.id).unwrap();
        assert_eq!(store.count_invitation_uses(&conn, &invite.id).unwrap(), 0);
    }

    #[test]
    fn remapped_schema_is_honored_by_every_operation() {
        let mut schema = InviteSchema::default();
        schema.invite_table = "offers".to_string();
        schema.use_table = "offer_uses".to_string();
        schema.invite_fields.token = "secret".to_string();
        schema.use_fields.invite_id = "offer_id".to_string();

        let conn = test_conn(&schema);
        let store = InviteStore::new(schema);

        let invite = store
            .create_invite(&conn, &sample_invite("tok-3", MaxUses::Bounded(1)))
            .unwrap();
        assert!(store.find_invitation(&conn, "tok-3").unwrap().is_some());
        store
            .create_invitation_use(&conn, &invite.id, None, "2026-01-02T00:00:00+00:00")
            .unwrap();
        assert_eq!(store.count_invitation_uses(&conn, &invite.id).unwrap(), 1);
        store.delete_invitation_uses(&conn, &invite.id).unwrap();
        store.delete_invitation(&conn, "tok-3").unwrap();
        assert!(store.find_invitation(&conn, "tok-3").unwrap().is_none());
    }
}
