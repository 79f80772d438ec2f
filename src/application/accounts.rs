//! Sign-up, log-in and cookie sessions.
//!
//! Passwords are stored as Argon2id PHC strings. A session token has the
//! shape `ss_<prefix>_<secret>`; only the SHA-256 of the secret is persisted
//! and lookups go through the prefix.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::UserRecord;
use crate::domain::error::FieldErrors;
use crate::domain::users::{validate_email, validate_password, validate_username};

const TOKEN_PREFIX: &str = "ss";
const MIN_SECRET_LEN: usize = 32;
const MAX_NAME_CHARS: usize = 150;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("sign-up form rejected: {0}")]
    Invalid(FieldErrors),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing session")]
    Missing,
    #[error("invalid session")]
    Invalid,
    #[error("expired session")]
    Expired,
}

#[derive(Debug, Clone, Default)]
pub struct SignUpSubmission {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub user: UserRecord,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub async fn sign_up(&self, submission: SignUpSubmission) -> Result<UserRecord, AccountError> {
        let mut errors = FieldErrors::new();
        let username = errors.collect(validate_username(&submission.username));
        let email = errors.collect(validate_email(&submission.email));
        errors.collect(validate_password(&submission.password1, &submission.password2));
        let first_name = clip_name(&submission.first_name, "first_name", &mut errors);
        let last_name = clip_name(&submission.last_name, "last_name", &mut errors);

        if let Some(username) = &username
            && self.users.find_by_username(username).await?.is_some()
        {
            errors.push("username", "Пользователь с таким именем уже существует.");
        }

        let (Some(username), Some(email), true) = (username, email, errors.is_empty()) else {
            return Err(AccountError::Invalid(errors));
        };

        let password_hash = hash_password(submission.password1).await?;
        let user = match self
            .users
            .create_user(CreateUserParams {
                username,
                first_name,
                last_name,
                email,
                password_hash,
            })
            .await
        {
            Ok(user) => user,
            Err(RepoError::Duplicate { .. }) => {
                let mut errors = FieldErrors::new();
                errors.push("username", "Пользователь с таким именем уже существует.");
                return Err(AccountError::Invalid(errors));
            }
            Err(err) => return Err(err.into()),
        };

        info!(user = %user.username, "User signed up");
        Ok(user)
    }

    /// Verifies the password and opens a session.
    pub async fn log_in(&self, username: &str, password: &str) -> Result<IssuedSession, AccountError> {
        let user = self
            .users
            .find_by_username(username.trim())
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        if !verify_password(password.to_string(), user.password_hash.clone()).await? {
            warn!(user = %user.username, "Rejected log-in attempt");
            return Err(AccountError::InvalidCredentials);
        }

        self.open_session(user).await
    }

    /// Issues a fresh session token for an already verified user.
    pub async fn open_session(&self, user: UserRecord) -> Result<IssuedSession, AccountError> {
        let prefix = generate_prefix();
        let secret = generate_secret();
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;

        self.sessions
            .create_session(CreateSessionParams {
                user_id: user.id,
                prefix: prefix.clone(),
                hashed_secret: hash_secret(&secret),
                expires_at,
            })
            .await?;

        info!(user = %user.username, session = %prefix, "Session opened");
        Ok(IssuedSession {
            token: format!("{TOKEN_PREFIX}_{prefix}_{secret}"),
            user,
            expires_at,
        })
    }

    pub async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let parsed = parse_token(token).ok_or(AuthError::Invalid)?;
        let record = self
            .sessions
            .find_by_prefix(&parsed.prefix)
            .await
            .map_err(|_| AuthError::Invalid)?
            .ok_or(AuthError::Invalid)?;

        let hashed_input = hash_secret(&parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(AuthError::Invalid);
        }
        if record.expires_at <= OffsetDateTime::now_utc() {
            return Err(AuthError::Expired);
        }

        let user = self
            .users
            .find_by_id(record.user_id)
            .await
            .map_err(|_| AuthError::Invalid)?
            .ok_or(AuthError::Invalid)?;

        Ok(Principal {
            user_id: user.id,
            username: user.username,
        })
    }

    /// Deletes the session behind `token`. Unknown tokens are ignored.
    pub async fn log_out(&self, token: &str) -> Result<(), AccountError> {
        if let Some(parsed) = parse_token(token) {
            self.sessions.delete_by_prefix(&parsed.prefix).await?;
            info!(session = %parsed.prefix, "Session closed");
        }
        Ok(())
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, AccountError> {
        Ok(self
            .sessions
            .delete_expired(OffsetDateTime::now_utc())
            .await?)
    }
}

fn clip_name(raw: &str, field: &'static str, errors: &mut FieldErrors) -> String {
    let value = raw.trim();
    if value.chars().count() > MAX_NAME_CHARS {
        errors.push(field, format!("Не больше {MAX_NAME_CHARS} символов."));
    }
    value.to_string()
}

async fn hash_password(password: String) -> Result<String, AccountError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
            .map_err(|err| AccountError::Hashing(err.to_string()))?;
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| AccountError::Hashing(err.to_string()))
    })
    .await
    .map_err(|err| AccountError::Hashing(err.to_string()))?
}

async fn verify_password(password: String, stored_hash: String) -> Result<bool, AccountError> {
    tokio::task::spawn_blocking(move || {
        let parsed = match PasswordHash::new(&stored_hash) {
            Ok(parsed) => parsed,
            // accounts without a usable hash can never log in
            Err(_) => return Ok(false),
        };
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(AccountError::Hashing(err.to_string())),
        }
    })
    .await
    .map_err(|err| AccountError::Hashing(err.to_string()))?
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

struct ParsedToken {
    prefix: String,
    secret: String,
}

fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.splitn(3, '_');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if secret.len() < MIN_SECRET_LEN || prefix.is_empty() {
        return None;
    }
    Some(ParsedToken {
        prefix: prefix.to_string(),
        secret: secret.to_string(),
    })
}
