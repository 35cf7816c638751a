// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password hashing (Argon2id) and the registration password policy.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;

use super::AuthError;

pub const MIN_PASSWORD_LEN: usize = 8;
const SPECIAL_CHARS: &str = "@$!%*?&";

/// Hash a password into a PHC string on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || {
        let mut salt_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AuthError::InternalError(format!("salt encoding failed: {e}")))?;
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::InternalError(format!("password hashing failed: {e}")))
    })
    .await
    .map_err(|e| AuthError::InternalError(format!("hashing task failed: {e}")))?
}

/// Check a password against a stored PHC string.
///
/// An unparseable stored hash counts as a mismatch.
pub async fn verify_password(password: String, stored_hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || {
        let Ok(parsed) = PasswordHash::new(&stored_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(|e| AuthError::InternalError(format!("verification task failed: {e}")))
}

/// Default-cost Argon2id PHC string whose digest came from no password.
const UNMATCHABLE_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$MtCXmqHoXiTS0UNbfrrhvg$YNPD2UD//VE87JacBhq40DmWtLscApJpopAuvhtTBQs";

/// Spend one full verification for a login whose account does not exist.
///
/// Keeps unknown-email and wrong-password responses equally slow.
pub async fn verify_without_account(password: String) -> Result<(), AuthError> {
    verify_password(password, UNMATCHABLE_HASH.to_string())
        .await
        .map(|_| ())
}

/// Why a password fails the registration policy, if it does.
///
/// At least eight characters from letters, digits and `@$!%*?&`, including
/// one lowercase, one uppercase, one digit and one special character.
pub fn password_policy_violation(password: &str) -> Option<&'static str> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Some("Password must be at least 8 characters long");
    }
    if password
        .chars()
        .any(|c| !c.is_ascii_alphanumeric() && !SPECIAL_CHARS.contains(c))
    {
        return Some("Password may only contain letters, digits and @$!%*?&");
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| SPECIAL_CHARS.contains(c));
    if !(has_lower && has_upper && has_digit && has_special) {
        return Some(
            "Password must include an uppercase letter, a lowercase letter, a digit and a special character",
        );
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hash = hash_password("Secret@123".to_string()).await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Secret@123".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password("Secret@124".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_hash_never_verifies() {
        assert!(!verify_password("Secret@123".to_string(), "plain".to_string())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unmatchable_hash_costs_the_same_as_a_real_one() {
        let real = hash_password("Secret@123".to_string()).await.unwrap();
        let header = |phc: &str| phc.rsplitn(3, '$').nth(2).unwrap().to_string();
        assert_eq!(header(UNMATCHABLE_HASH), header(&real));
        assert!(PasswordHash::new(UNMATCHABLE_HASH).is_ok());

        assert!(!verify_password("Secret@123".to_string(), UNMATCHABLE_HASH.to_string())
            .await
            .unwrap());
        verify_without_account("Secret@123".to_string()).await.unwrap();
    }

    #[test]
    fn policy_accepts_strong_password() {
        assert_eq!(password_policy_violation("Secret@123"), None);
    }

    #[test]
    fn policy_rejects_weak_passwords() {
        assert!(password_policy_violation("S@1a").is_some());
        assert!(password_policy_violation("secret@123").is_some());
        assert!(password_policy_violation("SECRET@123").is_some());
        assert!(password_policy_violation("Secret1234").is_some());
        assert!(password_policy_violation("Secret@12 3").is_some());
    }
}
