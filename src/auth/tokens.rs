// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token issuing and verification (HS256).

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::{AuthError, TokenClaims};
use crate::storage::StoredCustomer;

/// Seconds past `exp` a token is still accepted.
///
/// Revocations must outlive a token's `exp` by at least this much.
pub const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Signing keys and token lifetime.
#[derive(Clone)]
pub struct AuthConfig {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

impl AuthConfig {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for the customer.
    pub fn issue(&self, customer: &StoredCustomer) -> Result<IssuedToken, AuthError> {
        let iat = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = TokenClaims {
            sub: customer.id.clone(),
            name: customer.full_name(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat,
            exp: iat.saturating_add(ttl),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::InternalError(format!("failed to sign token: {e}")))?;
        Ok(IssuedToken { token, claims })
    }

    /// Verify signature and expiry and return the claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Money;

    fn customer() -> StoredCustomer {
        let now = Utc::now();
        StoredCustomer {
            id: "cus_test".to_string(),
            first_name: "Asha".to_string(),
            last_name: "Rao".to_string(),
            email: "asha@example.com".to_string(),
            password_hash: "hash".to_string(),
            balance: Money::ZERO,
            card_id: "card_test".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn config() -> AuthConfig {
        AuthConfig::new(b"0123456789abcdef0123456789abcdef", DEFAULT_TOKEN_TTL)
    }

    #[test]
    fn issued_token_verifies() {
        let config = config();
        let issued = config.issue(&customer()).unwrap();
        let claims = config.verify(&issued.token).unwrap();
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.sub, "cus_test");
        assert_eq!(claims.name, "Asha Rao");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn each_token_gets_a_fresh_id() {
        let config = config();
        let a = config.issue(&customer()).unwrap();
        let b = config.issue(&customer()).unwrap();
        assert_ne!(a.claims.jti, b.claims.jti);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let issued = config().issue(&customer()).unwrap();
        let other = AuthConfig::new(b"another-secret-another-secret-xx", DEFAULT_TOKEN_TTL);
        assert!(matches!(
            other.verify(&issued.token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = config();
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: "cus_test".to_string(),
            name: "Asha Rao".to_string(),
            jti: "jti_old".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &config.encoding).unwrap();
        assert!(matches!(config.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            config().verify("not.a.jwt"),
            Err(AuthError::MalformedToken)
        ));
    }
}
