//! HS256 bearer token verification

use crate::claims::Claims;
use carrent_core::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use tracing::{debug, error, warn};

/// Clock skew tolerated between the identity service and this one
const LEEWAY_SECS: u64 = 30;

/// Verifies marketplace tokens signed with a shared secret
///
/// Signing exists for tests and tooling; production tokens come from the
/// identity service.
#[derive(Clone)]
pub struct JwtService {
    signing: EncodingKey,
    verifying: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            signing: EncodingKey::from_secret(secret.as_bytes()),
            verifying: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Sign `claims`; an unset `exp` becomes now + ttl
    pub fn create_token(&self, claims: &Claims) -> Result<String, AppError> {
        let claims = if claims.exp == 0 {
            Claims {
                exp: (Utc::now() + self.ttl).timestamp(),
                ..claims.clone()
            }
        } else {
            claims.clone()
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.signing).map_err(|e| {
            error!(user = %claims.sub, "Could not sign token: {}", e);
            AppError::Internal(format!("Token signing failed: {}", e))
        })
    }

    /// Decode and check a bearer token
    ///
    /// # Errors
    ///
    /// `TokenExpired` past `exp` (plus leeway), `InvalidToken` otherwise.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.verifying, &self.validation)
            .map_err(token_error)?
            .claims;

        debug!(user = %claims.sub, role = %claims.role, "Token accepted");
        Ok(claims)
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }
}

fn token_error(err: jsonwebtoken::errors::Error) -> AppError {
    match err.kind() {
        ErrorKind::ExpiredSignature => {
            debug!("Rejected expired token");
            AppError::TokenExpired
        }
        kind => {
            warn!(?kind, "Rejected token");
            AppError::InvalidToken(err.to_string())
        }
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrent_core::models::UserRole;

    const SECRET: &str = "carrent-test-signing-secret";

    #[test]
    fn test_round_trip_keeps_identity() {
        let service = JwtService::new(SECRET, 3600);
        let token = service.create_token(&Claims::new(9, UserRole::Owner)).unwrap();

        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.actor().unwrap().id, 9);
        assert_eq!(claims.role, UserRole::Owner);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let issuer = JwtService::new(SECRET, 3600);
        let verifier = JwtService::new("some-other-secret", 3600);
        let token = issuer.create_token(&Claims::new(1, UserRole::Admin)).unwrap();

        assert!(matches!(
            verifier.validate_token(&token),
            Err(AppError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_expiry_beyond_leeway() {
        let service = JwtService::new(SECRET, 3600);
        let mut claims = Claims::new(1, UserRole::Renter);
        claims.exp = (Utc::now() - Duration::minutes(10)).timestamp();
        let token = service.create_token(&claims).unwrap();

        assert!(matches!(
            service.validate_token(&token),
            Err(AppError::TokenExpired)
        ));
    }

    #[test]
    fn test_garbage_is_invalid() {
        let service = JwtService::new(SECRET, 60);
        assert!(matches!(
            service.validate_token("not.a.token"),
            Err(AppError::InvalidToken(_))
        ));
        assert!(!format!("{:?}", service).contains(SECRET));
    }
}
