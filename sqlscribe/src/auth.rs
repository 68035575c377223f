use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("user store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("invalid token: {0}")]
    Token(String),

    #[error("blocking task failed: {0}")]
    Join(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

/// credential storage and access-token issuing. users live in a dedicated
/// database file, separate from any tenant store.
#[derive(Clone)]
pub struct AuthService {
    user_db: PathBuf,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(
        user_db: impl Into<PathBuf>,
        jwt_secret: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let service = Self {
            user_db: user_db.into(),
            jwt_secret: jwt_secret.into(),
        };
        service.init_store()?;
        Ok(service)
    }

    fn init_store(&self) -> Result<(), AuthError> {
        if let Some(parent) = self.user_db.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&self.user_db)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 username TEXT UNIQUE,
                 password TEXT
             )",
            [],
        )?;
        Ok(())
    }

    /// returns false when the username is already taken
    pub async fn create_user(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        let hashed = hash_password(password).await?;

        let conn = Connection::open(&self.user_db)?;
        match conn.execute(
            "INSERT INTO users (username, password) VALUES (?1, ?2)",
            params![username, hashed],
        ) {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::debug!("user creation failed: {}", e);
                Ok(false)
            }
        }
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        let conn = Connection::open(&self.user_db)?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT password FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(hash) => verify_password(password, &hash).await,
            None => Ok(false),
        }
    }

    pub fn create_access_token(&self, username: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: username.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::Token(e.to_string()))
    }

    /// returns the subject username for a valid, unexpired token
    pub fn verify_token(&self, token: &str) -> Result<String, AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| AuthError::Token(e.to_string()))?;

        Ok(data.claims.sub)
    }
}

// bcrypt is cpu-bound, keep it off the async workers
async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_string();

    tokio::task::spawn_blocking(move || {
        bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| AuthError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::Join(e.to_string()))?
}

async fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let password = password.to_string();
    let hash = hash.to_string();

    tokio::task::spawn_blocking(move || {
        bcrypt::verify(password, &hash).map_err(|e| AuthError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::Join(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> (tempfile::TempDir, AuthService) {
        let dir = tempfile::tempdir().unwrap();
        let service = AuthService::new(dir.path().join("users.db"), "test-secret").unwrap();
        (dir, service)
    }

    #[tokio::test]
    async fn test_signup_and_login_round_trip() {
        let (_dir, auth) = service();

        assert!(auth.create_user("alice", "hunter2hunter2").await.unwrap());
        assert!(auth.authenticate("alice", "hunter2hunter2").await.unwrap());
        assert!(!auth.authenticate("alice", "wrong").await.unwrap());
        assert!(!auth.authenticate("nobody", "hunter2hunter2").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let (_dir, auth) = service();

        assert!(auth.create_user("alice", "first-password").await.unwrap());
        assert!(!auth.create_user("alice", "second-password").await.unwrap());
    }

    #[tokio::test]
    async fn test_token_round_trip() {
        let (_dir, auth) = service();

        let token = auth.create_access_token("alice").unwrap();
        assert_eq!(auth.verify_token(&token).unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_tampered_token_rejected() {
        let (_dir, auth) = service();

        let token = auth.create_access_token("alice").unwrap();
        let other = AuthService::new(
            tempfile::tempdir().unwrap().path().join("users.db"),
            "different-secret",
        )
        .unwrap();

        assert!(other.verify_token(&token).is_err());
        assert!(auth.verify_token("not-a-token").is_err());
    }
}
