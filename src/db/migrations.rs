use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use crate::invite::schema::InviteSchema;

/// Apply all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
/// The invite tables are templated from the configured `InviteSchema` so the
/// table/field remapping reaches the DDL, not just the queries; this is why
/// the migration set is built here rather than returned as a static value.
pub fn apply(conn: &mut Connection, schema: &InviteSchema) -> Result<(), rusqlite_migration::Error> {
    let initial = format!(
        "-- Migration 1: users + invitation tables

CREATE TABLE users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'member',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE {invite} (
    {id} TEXT PRIMARY KEY,
    {token} TEXT NOT NULL UNIQUE,
    {created_by} TEXT REFERENCES users(id) ON DELETE SET NULL,
    {email} TEXT,
    {role} TEXT NOT NULL,
    {max_uses} INTEGER,
    {redirect} TEXT NOT NULL,
    {share_name} INTEGER NOT NULL DEFAULT 0,
    {created_at} TEXT NOT NULL,
    {expires_at} TEXT NOT NULL
);

CREATE TABLE {use_table} (
    {use_id} TEXT PRIMARY KEY,
    {invite_id} TEXT NOT NULL,
    {used_by} TEXT,
    {used_at} TEXT NOT NULL
);

CREATE INDEX idx_{use_table}_{invite_id} ON {use_table}({invite_id});
",
        invite = schema.invite_table,
        id = schema.invite_fields.id,
        token = schema.invite_fields.token,
        created_by = schema.invite_fields.created_by,
        email = schema.invite_fields.email,
        role = schema.invite_fields.role,
        max_uses = schema.invite_fields.max_uses,
        redirect = schema.invite_fields.redirect_after_upgrade,
        share_name = schema.invite_fields.share_inviter_name,
        created_at = schema.invite_fields.created_at,
        expires_at = schema.invite_fields.expires_at,
        use_table = schema.use_table,
        use_id = schema.use_fields.id,
        invite_id = schema.use_fields.invite_id,
        used_by = schema.use_fields.used_by,
        used_at = schema.use_fields.used_at,
    );

    let migrations = Migrations::new(vec![M::up(&initial)]);
    migrations.to_latest(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_with_default_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply(&mut conn, &InviteSchema::default()).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='invites'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn migrations_honor_remapped_names() {
        let mut schema = InviteSchema::default();
        schema.invite_table = "membership_offers".to_string();
        schema.use_table = "membership_offer_uses".to_string();
        schema.invite_fields.token = "secret".to_string();

        let mut conn = Connection::open_in_memory().unwrap();
        apply(&mut conn, &schema).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='membership_offers'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
