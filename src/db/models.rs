use chrono::{DateTime, Utc};
use serde::Serialize;

/// Row of the `users` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    /// Unix seconds
    pub date_joined: i64,
    pub last_login: Option<i64>,
}

impl User {
    pub fn date_joined(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.date_joined, 0).unwrap_or_default()
    }

    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.last_login
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Values needed to insert a user; the id is assigned by the database.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}
