use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use rand::rngs::OsRng;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    util::random_string, Database, DatabaseError, NewSession, NewUser, PrimaryKey, SessionData,
    UpdatedUser, UserData,
};

pub struct Auth<Db> {
    db: Arc<Db>,
    argon: Argon2<'static>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Login or password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("A moderator already exists")]
    ModeratorExists,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
}

impl<Db> Auth<Db>
where
    Db: Database,
{
    const SESSION_DURATION_IN_DAYS: usize = 7;

    pub fn new(db: &Arc<Db>) -> Self {
        Self {
            db: db.clone(),
            argon: Argon2::default(),
        }
    }

    /// Logs in a user, returning a new session
    pub async fn login(&self, credentials: Credentials) -> Result<SessionData, AuthError> {
        self.clear_expired().await;

        let user = self
            .db
            .user_by_login(&credentials.login)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => AuthError::InvalidCredentials,
                err => AuthError::Db(err),
            })?;

        let stored_password = PasswordHash::parse(&user.password, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(credentials.password.as_bytes(), &stored_password)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS as i64);

        let new_session = NewSession {
            token: random_string(32),
            user_id: user.id,
            expires_at,
        };

        let new_session = self
            .db
            .create_session(new_session)
            .await
            .map_err(AuthError::Db)?;

        Ok(new_session)
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        self.db.delete_session_by_token(token).await
    }

    /// Creates a basic account
    pub async fn register(&self, new_account: NewAccount) -> Result<UserData, AuthError> {
        self.create_user(NewUser {
            login: new_account.login,
            email: new_account.email,
            password: new_account.password,
            display_name: new_account.display_name,
            moderator: false,
        })
        .await
    }

    /// Creates the first moderator account, if one doesn't already exist
    pub async fn register_moderator(&self, new_account: NewAccount) -> Result<UserData, AuthError> {
        let has_moderator = self
            .db
            .check_for_moderator()
            .await
            .map_err(AuthError::Db)?;

        if has_moderator {
            return Err(AuthError::ModeratorExists);
        }

        self.create_user(NewUser {
            login: new_account.login,
            email: new_account.email,
            password: new_account.password,
            display_name: new_account.display_name,
            moderator: true,
        })
        .await
    }

    /// Updates a user
    pub async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData, DatabaseError> {
        self.db.update_user(updated_user).await
    }

    /// Returns a session if it exists
    pub async fn session(&self, token: &str) -> Result<SessionData, DatabaseError> {
        self.db.session_by_token(token).await
    }

    pub async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData, DatabaseError> {
        self.db.user_by_id(user_id).await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hashed_password = self
            .argon
            .hash_password(new_user.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        self.db
            .create_user(NewUser {
                login: new_user.login,
                email: new_user.email,
                password: hashed_password,
                display_name: new_user.display_name,
                moderator: new_user.moderator,
            })
            .await
            .map_err(AuthError::Db)
    }

    async fn clear_expired(&self) {
        if let Err(e) = self.db.clear_expired_sessions().await {
            log::warn!("Failed to clear expired sessions: {e}");
        }
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewAccount {
    pub login: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::test_database;

    #[tokio::test]
    async fn test_register_and_login() {
        let db = test_database("auth_register_and_login").await;
        let auth = Auth::new(&db);

        let user = auth
            .register(NewAccount {
                login: "arthur".to_string(),
                email: "arthur@example.com".to_string(),
                password: "correct horse".to_string(),
                display_name: "Arthur".to_string(),
            })
            .await
            .expect("user is created");

        // The stored password is a hash, not the plain text
        assert_ne!(user.password, "correct horse");
        assert!(!user.moderator);

        let session = auth
            .login(Credentials {
                login: "arthur".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .expect("login succeeds");

        assert_eq!(session.user.id, user.id);

        let restored = auth.session(&session.token).await.expect("session exists");
        assert_eq!(restored.user.login, "arthur");
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let db = test_database("auth_wrong_password").await;
        let auth = Auth::new(&db);

        auth.register(NewAccount {
            login: "arthur".to_string(),
            email: "arthur@example.com".to_string(),
            password: "correct horse".to_string(),
            display_name: "Arthur".to_string(),
        })
        .await
        .expect("user is created");

        let result = auth
            .login(Credentials {
                login: "arthur".to_string(),
                password: "battery staple".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_only_one_moderator_bootstrap() {
        let db = test_database("auth_moderator_bootstrap").await;
        let auth = Auth::new(&db);

        let moderator = auth
            .register_moderator(NewAccount {
                login: "sudara".to_string(),
                email: "sudara@example.com".to_string(),
                password: "password123".to_string(),
                display_name: "Sudara".to_string(),
            })
            .await
            .expect("moderator is created");

        assert!(moderator.can_moderate());

        let second = auth
            .register_moderator(NewAccount {
                login: "mallory".to_string(),
                email: "mallory@example.com".to_string(),
                password: "password123".to_string(),
                display_name: "Mallory".to_string(),
            })
            .await;

        assert!(matches!(second, Err(AuthError::ModeratorExists)));
    }
}
