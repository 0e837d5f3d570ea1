//! User account queries.

use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::{column_time, encode_time, now, Storage};
use crate::error::{is_unique_violation, Error, Result};
use crate::model::User;

/// A user together with the stored password hash, for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    /// The account.
    pub user: User,
    /// PHC-format password hash.
    pub password_hash: String,
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        is_staff: row.get(2)?,
        created_at: column_time(row, 3)?,
    })
}

impl Storage {
    /// Create a user account with an already hashed password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the username is taken,
    /// [`Error::InvalidRequest`] for a blank username, or an error if the
    /// database operation fails.
    pub fn create_user(&self, username: &str, password_hash: &str, is_staff: bool) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::InvalidRequest("username must not be empty".to_string()));
        }

        let created_at = now();
        self.conn
            .execute(
                "INSERT INTO users (username, password_hash, is_staff, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![username, password_hash, is_staff, encode_time(created_at)],
            )
            .map_err(|err| {
                if is_unique_violation(&err) {
                    Error::Conflict(format!("user {username} already exists"))
                } else {
                    err.into()
                }
            })?;

        info!("Created user {} (staff: {})", username, is_staff);
        Ok(User {
            id: self.conn.last_insert_rowid(),
            username: username.to_string(),
            is_staff,
            created_at,
        })
    }

    /// Look up a user and their password hash by username.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn user_credentials(&self, username: &str) -> Result<Option<UserCredentials>> {
        let credentials = self
            .conn
            .query_row(
                "SELECT id, username, is_staff, created_at, password_hash FROM users WHERE username = ?1",
                [username],
                |row| {
                    Ok(UserCredentials {
                        user: row_to_user(row)?,
                        password_hash: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(credentials)
    }

    /// List all users, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, username, is_staff, created_at FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_lookup() {
        let storage = Storage::open_in_memory().unwrap();
        let user = storage.create_user("admin", "$argon2id$fake", true).unwrap();
        assert!(user.is_staff);

        let creds = storage.user_credentials("admin").unwrap().unwrap();
        assert_eq!(creds.user, user);
        assert_eq!(creds.password_hash, "$argon2id$fake");
        assert!(storage.user_credentials("nobody").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_conflicts() {
        let storage = Storage::open_in_memory().unwrap();
        storage.create_user("admin", "h1", true).unwrap();
        let err = storage.create_user("admin", "h2", false).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(storage.users().unwrap().len(), 1);
    }

    #[test]
    fn test_blank_username_rejected() {
        let storage = Storage::open_in_memory().unwrap();
        assert!(storage.create_user("  ", "h", false).is_err());
    }
}
