//! Database row types — these map directly to SQLite rows.
//! Distinct from the courier-types API models to keep the DB layer
//! independent.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

#[derive(Debug)]
pub struct UserRow {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub join_at: String,
    pub last_login_at: String,
}

/// Public fields only, as returned by the user listing and history joins.
#[derive(Debug)]
pub struct ProfileRow {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

#[derive(Debug)]
pub struct MessageRow {
    pub id: String,
    pub from_username: String,
    pub to_username: String,
    pub body: String,
    pub sent_at: String,
    pub read_at: Option<String>,
}

/// One side of a user's history: the message plus the counterpart's
/// public profile (sender for inbox queries, recipient for outbox).
pub struct MessageSideRow {
    pub id: String,
    pub body: String,
    pub sent_at: String,
    pub read_at: Option<String>,
    pub counterpart: ProfileRow,
}

#[derive(Debug)]
pub struct MessageDetailRow {
    pub id: String,
    pub body: String,
    pub sent_at: String,
    pub read_at: Option<String>,
    pub from_user: ProfileRow,
    pub to_user: ProfileRow,
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Try RFC 3339 first, then parse as naive UTC and convert.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
