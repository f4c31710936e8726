//! JWT claims issued by the identity service

use carrent_core::error::AppError;
use carrent_core::models::{Actor, UserRole};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

/// JWT claims
///
/// `sub` holds the numeric user id as a string, per RFC 7519.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Marketplace role
    pub role: UserRole,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp); 0 until set by `JwtService`
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: i64, role: UserRole) -> Self {
        Self {
            sub: user_id.to_string(),
            role,
            iat: Utc::now().timestamp(),
            exp: 0,
        }
    }

    pub fn with_expiration(user_id: i64, role: UserRole, expires_in_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(expires_in_secs)).timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }

    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse()
            .map_err(|_| AppError::InvalidToken(format!("Subject is not a user id: {}", self.sub)))
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn actor(&self) -> Result<Actor, AppError> {
        Ok(Actor::new(self.user_id()?, self.role))
    }
}
