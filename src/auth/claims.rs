// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated customer representation.

use serde::{Deserialize, Serialize};

use crate::storage::StoredCustomer;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Customer id.
    pub sub: String,
    /// Display name at issue time.
    pub name: String,
    /// Unique token id, used for revocation.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// The customer making a request, as resolved by the `Auth` extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedCustomer {
    pub id: String,
    pub name: String,
    pub email: String,
    /// `jti` of the presented token.
    pub token_id: String,
    /// Token expiry (Unix seconds).
    pub expires_at: i64,
}

impl AuthenticatedCustomer {
    pub fn from_claims(claims: TokenClaims, customer: &StoredCustomer) -> Self {
        Self {
            id: customer.id.clone(),
            name: customer.full_name(),
            email: customer.email.clone(),
            token_id: claims.jti,
            expires_at: claims.exp,
        }
    }
}
