// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Credentials, session tokens and the login flows for both account kinds.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use cookie::{Cookie, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use taskdesk_common::{MAX_FAILED_LOGINS, Role};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::AppState;
use crate::database::accounts;
use crate::handlers::AppError;

const PASSWORD_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
const GENERATED_PASSWORD_LEN: usize = 12;
const RESET_TOKEN_LEN: usize = 48;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Hash error: {0}")]
    HashError(String),
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

/// A stored hash that does not parse never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Initial password for a freshly created staff account.
pub fn generate_password() -> String {
    let mut rng = rand::rng();
    (0..GENERATED_PASSWORD_LEN)
        .map(|_| PASSWORD_CHARSET[rng.random_range(0..PASSWORD_CHARSET.len())] as char)
        .collect()
}

pub fn generate_reset_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), RESET_TOKEN_LEN)
}

/// The identity every protected route works from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: i64,
    pub name: String,
    pub emp_id: String,
    pub email: String,
    pub role: Role,
    pub department: i64,
}

#[derive(Serialize, Deserialize, Debug)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
    #[serde(flatten)]
    user: SessionUser,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Token creation failed: {0}")]
    CreationError(String),
    #[error("Token validation failed: {0}")]
    ValidationError(String),
}

/// Signs and checks session tokens.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    cookie_name: String,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_hours: i64, cookie_name: impl Into<String>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
            cookie_name: cookie_name.into(),
        }
    }

    pub fn issue(&self, user: &SessionUser) -> Result<String, SessionError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            user: user.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|e| SessionError::CreationError(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<SessionUser, SessionError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims.user)
            .map_err(|e| SessionError::ValidationError(e.to_string()))
    }

    /// `Set-Cookie` value carrying a freshly issued token.
    pub fn session_cookie(&self, token: &str) -> String {
        Cookie::build((self.cookie_name.clone(), token.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(cookie::time::Duration::seconds(self.ttl.num_seconds()))
            .build()
            .to_string()
    }

    /// `Set-Cookie` value that makes the browser forget the session.
    pub fn clear_cookie(&self) -> String {
        Cookie::build((self.cookie_name.clone(), ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(cookie::time::Duration::ZERO)
            .build()
            .to_string()
    }

    /// Pulls the token out of `Authorization: Bearer` or, failing that, the session cookie.
    fn token_from_parts(&self, parts: &Parts) -> Option<String> {
        let bearer = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string());
        if bearer.is_some() {
            return bearer;
        }

        parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|header| Cookie::split_parse(header.to_string()))
            .filter_map(Result::ok)
            .find(|c| c.name() == self.cookie_name)
            .map(|c| c.value().to_string())
    }
}

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = state.sessions.token_from_parts(parts) else {
            debug!("Request without a session");
            return Err(AppError::unauthorized());
        };
        state.sessions.verify(&token).map_err(|e| {
            debug!("Rejected session token: {}", e);
            AppError::unauthorized()
        })
    }
}

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Invalid Employee ID or password")]
    InvalidCredentials,
    #[error("Account is disabled. Contact admin.")]
    AccountDisabled,
    #[error("Account locked. Try again later.")]
    AccountLocked,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// HOD login with lockout: five wrong passwords in a row lock the account
/// for fifteen minutes, during which even the right password is refused.
pub async fn login_hod(
    pool: &SqlitePool,
    emp_id: &str,
    password: &str,
    now: DateTime<Utc>,
) -> Result<SessionUser, LoginError> {
    let Some(hod) = accounts::find_hod_by_emp_id(pool, emp_id).await? else {
        return Err(LoginError::InvalidCredentials);
    };

    if !hod.is_active {
        return Err(LoginError::AccountDisabled);
    }

    if hod.lock_until.is_some_and(|until| until > now) {
        warn!("Login attempt on locked HOD account {}", hod.emp_id);
        return Err(LoginError::AccountLocked);
    }

    if !verify_password(password, &hod.password_hash) {
        let attempts = accounts::record_failed_login(pool, hod.id, now).await?;
        if attempts >= MAX_FAILED_LOGINS {
            warn!("HOD account {} locked after {} failed attempts", hod.emp_id, attempts);
        }
        return Err(LoginError::InvalidCredentials);
    }

    accounts::record_successful_login(pool, hod.id, now).await?;
    info!("HOD {} logged in", hod.emp_id);

    Ok(SessionUser {
        id: hod.id,
        name: hod.name,
        emp_id: hod.emp_id,
        email: hod.email,
        role: hod.role,
        department: hod.department_id,
    })
}

/// Staff login. Returns the identity and whether the account still has to
/// replace its generated password.
pub async fn login_staff(pool: &SqlitePool, emp_id: &str, password: &str) -> Result<(SessionUser, bool), LoginError> {
    let Some(staff) = accounts::find_staff_by_emp_id(pool, emp_id).await? else {
        return Err(LoginError::InvalidCredentials);
    };

    if !staff.is_active {
        return Err(LoginError::AccountDisabled);
    }

    if !verify_password(password, &staff.password_hash) {
        return Err(LoginError::InvalidCredentials);
    }

    info!("Staff {} logged in", staff.emp_id);

    Ok((
        SessionUser {
            id: staff.id,
            name: staff.name,
            emp_id: staff.emp_id,
            email: staff.email,
            role: staff.role,
            department: staff.department_id,
        },
        staff.required_change_password,
    ))
}
