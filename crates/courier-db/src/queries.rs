use rusqlite::Connection;

use crate::models::{MessageDetailRow, MessageRow, MessageSideRow, ProfileRow, UserRow};
use crate::{Database, Error, Result};

impl Database {
    // -- Users --

    /// Insert a new user. `join_at` and `last_login_at` default to now.
    /// A primary-key violation (two registrations racing on the same
    /// username) surfaces as `Error::Conflict`.
    pub fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
        phone: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, first_name, last_name, phone)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (username, password_hash, first_name, last_name, phone),
            )
            .map_err(|e| conflict_on_constraint(e, format!("username {}", username)))?;
            Ok(())
        })
    }

    /// Stored password hash for a username. `None` for unknown users —
    /// authentication failure is an expected outcome, not an error.
    pub fn password_hash(&self, username: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT password FROM users WHERE username = ?1",
                [username],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn update_login_timestamp(&self, username: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users SET last_login_at = datetime('now') WHERE username = ?1",
                [username],
            )?;
            if updated == 0 {
                return Err(Error::NotFound(format!("user {}", username)));
            }
            Ok(())
        })
    }

    pub fn list_users(&self) -> Result<Vec<ProfileRow>> {
        self.with_conn(query_all_profiles)
    }

    pub fn get_user(&self, username: &str) -> Result<UserRow> {
        self.with_conn(|conn| {
            query_user(conn, username)?
                .ok_or_else(|| Error::NotFound(format!("user {}", username)))
        })
    }

    /// Messages authored by `username`, each joined with the recipient's
    /// public profile. An empty history is an empty list, never an error.
    pub fn messages_from(&self, username: &str) -> Result<Vec<MessageSideRow>> {
        self.with_conn(|conn| {
            query_message_sides(
                conn,
                "SELECT m.id, m.body, m.sent_at, m.read_at,
                        u.username, u.first_name, u.last_name, u.phone
                 FROM messages m
                 JOIN users u ON m.to_username = u.username
                 WHERE m.from_username = ?1",
                username,
            )
        })
    }

    /// Messages addressed to `username`, each joined with the sender's
    /// public profile.
    pub fn messages_to(&self, username: &str) -> Result<Vec<MessageSideRow>> {
        self.with_conn(|conn| {
            query_message_sides(
                conn,
                "SELECT m.id, m.body, m.sent_at, m.read_at,
                        u.username, u.first_name, u.last_name, u.phone
                 FROM messages m
                 JOIN users u ON m.from_username = u.username
                 WHERE m.to_username = ?1",
                username,
            )
        })
    }

    // -- Messages --

    /// Insert a message and return the stored row. The recipient is checked
    /// explicitly so an unknown username surfaces as not-found rather than
    /// a foreign-key failure.
    pub fn create_message(
        &self,
        id: &str,
        from_username: &str,
        to_username: &str,
        body: &str,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let recipient: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM users WHERE username = ?1",
                    [to_username],
                    |row| row.get(0),
                )
                .optional()?;
            if recipient.is_none() {
                return Err(Error::NotFound(format!("user {}", to_username)));
            }

            let sent_at: String = conn.query_row(
                "INSERT INTO messages (id, from_username, to_username, body)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING sent_at",
                (id, from_username, to_username, body),
                |row| row.get(0),
            )?;

            Ok(MessageRow {
                id: id.to_string(),
                from_username: from_username.to_string(),
                to_username: to_username.to_string(),
                body: body.to_string(),
                sent_at,
                read_at: None,
            })
        })
    }

    pub fn get_message(&self, id: &str) -> Result<MessageDetailRow> {
        self.with_conn(|conn| {
            query_message_detail(conn, id)?
                .ok_or_else(|| Error::NotFound(format!("message {}", id)))
        })
    }

    /// Set `read_at` on a message. Ownership is enforced here: only the
    /// addressed recipient may mark a message read. Returns the new
    /// `read_at` timestamp.
    pub fn mark_message_read(&self, id: &str, reader: &str) -> Result<String> {
        self.with_conn_mut(|conn| {
            let to_username: Option<String> = conn
                .query_row(
                    "SELECT to_username FROM messages WHERE id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .optional()?;

            match to_username {
                None => Err(Error::NotFound(format!("message {}", id))),
                Some(to) if to != reader => Err(Error::NotRecipient(reader.to_string())),
                Some(_) => {
                    let read_at: String = conn.query_row(
                        "UPDATE messages SET read_at = datetime('now')
                         WHERE id = ?1
                         RETURNING read_at",
                        [id],
                        |row| row.get(0),
                    )?;
                    Ok(read_at)
                }
            }
        })
    }
}

fn query_user(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT username, first_name, last_name, phone, join_at, last_login_at
         FROM users WHERE username = ?1",
    )?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                username: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                phone: row.get(3)?,
                join_at: row.get(4)?,
                last_login_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_all_profiles(conn: &Connection) -> Result<Vec<ProfileRow>> {
    let mut stmt =
        conn.prepare("SELECT username, first_name, last_name, phone FROM users")?;

    let rows = stmt
        .query_map([], |row| {
            Ok(ProfileRow {
                username: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                phone: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_message_sides(
    conn: &Connection,
    sql: &str,
    username: &str,
) -> Result<Vec<MessageSideRow>> {
    let mut stmt = conn.prepare(sql)?;

    let rows = stmt
        .query_map([username], |row| {
            Ok(MessageSideRow {
                id: row.get(0)?,
                body: row.get(1)?,
                sent_at: row.get(2)?,
                read_at: row.get(3)?,
                counterpart: ProfileRow {
                    username: row.get(4)?,
                    first_name: row.get(5)?,
                    last_name: row.get(6)?,
                    phone: row.get(7)?,
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_message_detail(conn: &Connection, id: &str) -> Result<Option<MessageDetailRow>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.body, m.sent_at, m.read_at,
                f.username, f.first_name, f.last_name, f.phone,
                t.username, t.first_name, t.last_name, t.phone
         FROM messages m
         JOIN users f ON m.from_username = f.username
         JOIN users t ON m.to_username = t.username
         WHERE m.id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(MessageDetailRow {
                id: row.get(0)?,
                body: row.get(1)?,
                sent_at: row.get(2)?,
                read_at: row.get(3)?,
                from_user: ProfileRow {
                    username: row.get(4)?,
                    first_name: row.get(5)?,
                    last_name: row.get(6)?,
                    phone: row.get(7)?,
                },
                to_user: ProfileRow {
                    username: row.get(8)?,
                    first_name: row.get(9)?,
                    last_name: row.get(10)?,
                    phone: row.get(11)?,
                },
            })
        })
        .optional()?;

    Ok(row)
}

fn conflict_on_constraint(e: rusqlite::Error, what: String) -> Error {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::Conflict(what)
        }
        other => Error::Sqlite(other),
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_user(db: &Database, username: &str) {
        db.create_user(username, "not-a-real-hash", "Test", "User", "+15550100")
            .unwrap();
    }

    #[test]
    fn create_then_lookup_hash() {
        let db = db();
        seed_user(&db, "alice");

        let hash = db.password_hash("alice").unwrap();
        assert_eq!(hash.as_deref(), Some("not-a-real-hash"));

        assert!(db.password_hash("nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_conflicts() {
        let db = db();
        seed_user(&db, "alice");

        let err = db
            .create_user("alice", "other-hash", "Other", "Person", "+15550101")
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn unknown_user_is_not_found() {
        let db = db();
        let err = db.get_user("ghost").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn get_user_returns_timestamps() {
        let db = db();
        seed_user(&db, "alice");

        let user = db.get_user("alice").unwrap();
        assert_eq!(user.username, "alice");
        assert!(!user.join_at.is_empty());
        assert!(!user.last_login_at.is_empty());
    }

    #[test]
    fn login_timestamp_update() {
        let db = db();
        seed_user(&db, "alice");

        db.update_login_timestamp("alice").unwrap();

        let err = db.update_login_timestamp("ghost").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn list_users_returns_public_fields() {
        let db = db();
        seed_user(&db, "alice");
        seed_user(&db, "bob");

        let users = db.list_users().unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().any(|u| u.username == "alice"));
        assert!(users.iter().any(|u| u.username == "bob"));
    }

    #[test]
    fn new_message_is_unread() {
        let db = db();
        seed_user(&db, "alice");
        seed_user(&db, "bob");

        let row = db.create_message("m1", "alice", "bob", "hi").unwrap();
        assert!(!row.sent_at.is_empty());
        assert!(row.read_at.is_none());

        let detail = db.get_message("m1").unwrap();
        assert_eq!(detail.body, "hi");
        assert_eq!(detail.from_user.username, "alice");
        assert_eq!(detail.to_user.username, "bob");
        assert!(detail.read_at.is_none());
    }

    #[test]
    fn message_to_unknown_recipient() {
        let db = db();
        seed_user(&db, "alice");

        let err = db.create_message("m1", "alice", "ghost", "hi").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn unknown_message_is_not_found() {
        let db = db();
        let err = db.get_message("nope").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn mark_read_only_by_recipient() {
        let db = db();
        seed_user(&db, "alice");
        seed_user(&db, "bob");
        db.create_message("m1", "alice", "bob", "hi").unwrap();

        let err = db.mark_message_read("m1", "alice").unwrap_err();
        assert!(matches!(err, Error::NotRecipient(_)));

        let read_at = db.mark_message_read("m1", "bob").unwrap();
        assert!(!read_at.is_empty());

        let detail = db.get_message("m1").unwrap();
        assert_eq!(detail.read_at.as_deref(), Some(read_at.as_str()));
    }

    #[test]
    fn mark_read_unknown_message() {
        let db = db();
        seed_user(&db, "bob");

        let err = db.mark_message_read("nope", "bob").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn history_joins_counterpart_profiles() {
        let db = db();
        seed_user(&db, "alice");
        seed_user(&db, "bob");
        db.create_message("m1", "alice", "bob", "hi bob").unwrap();
        db.create_message("m2", "bob", "alice", "hi alice").unwrap();

        let from_alice = db.messages_from("alice").unwrap();
        assert_eq!(from_alice.len(), 1);
        assert_eq!(from_alice[0].body, "hi bob");
        assert_eq!(from_alice[0].counterpart.username, "bob");

        let to_alice = db.messages_to("alice").unwrap();
        assert_eq!(to_alice.len(), 1);
        assert_eq!(to_alice[0].body, "hi alice");
        assert_eq!(to_alice[0].counterpart.username, "bob");
    }

    #[test]
    fn empty_history_is_not_an_error() {
        let db = db();
        seed_user(&db, "alice");

        assert!(db.messages_from("alice").unwrap().is_empty());
        assert!(db.messages_to("alice").unwrap().is_empty());
    }
}
