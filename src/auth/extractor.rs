// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated customers.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(customer): Auth) -> impl IntoResponse {
//!     // customer is AuthenticatedCustomer
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::error;

use super::{AuthError, AuthenticatedCustomer};
use crate::state::AppState;
use crate::storage::CustomerRepository;

/// Extractor for authenticated customers.
///
/// Verifies the bearer token, rejects revoked tokens and loads the customer
/// the token was issued to.
pub struct Auth(pub AuthenticatedCustomer);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = bearer_token(auth_header)?;
        let claims = state.auth.verify(token)?;

        let revoked = state.db.is_token_revoked(&claims.jti).map_err(|e| {
            error!(error = %e, "Failed to check token revocation");
            AuthError::InternalError("revocation check failed".to_string())
        })?;
        if revoked {
            return Err(AuthError::TokenRevoked);
        }

        let customer = CustomerRepository::new(&state.db)
            .get(&claims.sub)
            .map_err(|e| {
                error!(error = %e, "Failed to load token subject");
                AuthError::InternalError("customer lookup failed".to_string())
            })?
            .ok_or(AuthError::UnknownCustomer)?;

        Ok(Auth(AuthenticatedCustomer::from_claims(claims, &customer)))
    }
}

/// Pull the token out of `Bearer <token>`.
///
/// Only the first comma-separated value of the header is considered.
fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let first = header.split(',').next().unwrap_or_default().trim();
    let token = first
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthConfig;
    use crate::state::test_state;
    use crate::storage::NewCustomer;
    use axum::http::Request;
    use std::sync::Arc;
    use std::time::Duration;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn register(state: &AppState) -> crate::storage::StoredCustomer {
        CustomerRepository::new(&state.db)
            .create(NewCustomer {
                first_name: "Asha".to_string(),
                last_name: "Rao".to_string(),
                email: "asha@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .unwrap()
            .0
    }

    #[test]
    fn bearer_token_uses_first_value_only() {
        assert_eq!(bearer_token("Bearer abc").unwrap(), "abc");
        assert_eq!(bearer_token("Bearer abc, Bearer def").unwrap(), "abc");
        assert!(bearer_token("Basic abc").is_err());
        assert!(bearer_token("Bearer ").is_err());
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let (state, _temp_dir) = test_state();
        let mut parts = parts_with(None);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_succeeds_with_issued_token() {
        let (state, _temp_dir) = test_state();
        let customer = register(&state);
        let issued = state.auth.issue(&customer).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", issued.token)));

        let Auth(authenticated) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(authenticated.id, customer.id);
        assert_eq!(authenticated.email, "asha@example.com");
        assert_eq!(authenticated.token_id, issued.claims.jti);
    }

    #[tokio::test]
    async fn revoked_token_is_rejected() {
        let (state, _temp_dir) = test_state();
        let customer = register(&state);
        let issued = state.auth.issue(&customer).unwrap();
        state
            .db
            .revoke_token(&issued.claims.jti, issued.claims.exp)
            .unwrap();

        let mut parts = parts_with(Some(&format!("Bearer {}", issued.token)));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::TokenRevoked)));
    }

    #[tokio::test]
    async fn revocation_survives_purge_while_token_is_within_leeway() {
        let (mut state, _temp_dir) = test_state();
        state.auth = Arc::new(AuthConfig::new(
            b"test-secret-test-secret-test-secret",
            Duration::ZERO,
        ));
        let customer = register(&state);
        let issued = state.auth.issue(&customer).unwrap();
        state
            .db
            .revoke_token(&issued.claims.jti, issued.claims.exp)
            .unwrap();

        // Already past `exp`, but still inside the verification leeway.
        let purged = state.db.purge_revoked_tokens(issued.claims.exp + 2).unwrap();
        assert_eq!(purged, 0);

        let mut parts = parts_with(Some(&format!("Bearer {}", issued.token)));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::TokenRevoked)));
    }

    #[tokio::test]
    async fn token_for_unknown_customer_is_rejected() {
        let (state, _temp_dir) = test_state();
        let mut ghost = register(&state);
        ghost.id = "cus_ghost".to_string();
        let issued = state.auth.issue(&ghost).unwrap();

        let mut parts = parts_with(Some(&format!("Bearer {}", issued.token)));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::UnknownCustomer)));
    }
}
