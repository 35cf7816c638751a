// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Customers authenticate with email and password and receive a signed
//! session token.
//!
//! ## Auth Flow
//!
//! 1. `register` or `login` verifies credentials and issues an HS256 JWT
//!    carrying `sub` (customer id), `name`, `jti`, `iat` and `exp`.
//! 2. Clients send `Authorization: Bearer <token>` on every other call.
//! 3. The [`Auth`] extractor:
//!    - verifies signature and expiry against `JWT_SECRET`
//!    - rejects tokens whose `jti` was revoked by `logout`
//!    - loads the customer, rejecting tokens for unknown customers
//!
//! ## Security
//!
//! - Passwords are stored as Argon2id PHC strings, hashed off the async runtime
//! - Clock skew tolerance is 60 seconds
//! - Revoked token ids are kept until the token would have expired anyway

pub mod claims;
pub mod error;
pub mod extractor;
pub mod password;
pub mod tokens;

pub use claims::{AuthenticatedCustomer, TokenClaims};
pub use error::AuthError;
pub use extractor::Auth;
pub use password::{
    hash_password, password_policy_violation, verify_password, verify_without_account,
};
pub use tokens::{AuthConfig, IssuedToken};
