//! SQL helpers for the users table, shared by the host-auth handlers and
//! the invite engine (email lookup at create, role mutation at consume).

use rusqlite::{Connection, OptionalExtension};

use crate::db::models::User;

const COLUMNS: &str = "id, email, name, password_hash, role, created_at, updated_at";

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM users WHERE email = ?1"),
        [email],
        row_to_user,
    )
    .optional()
}

pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
        [id],
        row_to_user,
    )
    .optional()
}

pub fn insert(conn: &Connection, user: &User) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, name, password_hash, role, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            user.id,
            user.email,
            user.name,
            user.password_hash,
            user.role,
            user.created_at,
            user.updated_at,
        ],
    )?;
    Ok(())
}

pub fn update_role(conn: &Connection, id: &str, role: &str, now: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1",
        rusqlite::params![id, role, now],
    )?;
    Ok(())
}
