// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared value types: money amounts, identifiers and pagination.

use std::fmt;

use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Number of random characters after an identifier prefix.
const UID_RANDOM_LEN: usize = 16;

/// Items per page for every paginated listing.
pub const PAGE_SIZE: usize = 10;

/// Generate a prefixed random identifier, e.g. `cus_Xy3k...`.
pub fn new_uid(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(UID_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{prefix}_{suffix}")
}

/// Number of pages needed to show `total` items, `PAGE_SIZE` at a time.
pub fn total_pages(total: usize) -> usize {
    total.div_ceil(PAGE_SIZE)
}

/// Zero-based offset of a one-based page number.
pub fn page_offset(page: usize) -> usize {
    page.saturating_sub(1).saturating_mul(PAGE_SIZE)
}

// =============================================================================
// Money
// =============================================================================

/// Errors from parsing a user-supplied amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount must be a valid positive number")]
    Invalid,

    #[error("amount must have at most 2 decimal places")]
    TooManyDecimals,

    #[error("amount is too large")]
    TooLarge,
}

/// An amount of rupees held as paise.
///
/// Stored as the integer number of minor units so balances never drift
/// through floating-point arithmetic.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    pub fn minor(self) -> i64 {
        self.0
    }

    /// Amount in rupees, for JSON responses.
    pub fn to_major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Parse a positive decimal amount with at most two fractional digits.
    pub fn parse(amount: &str) -> Result<Money, AmountError> {
        let trimmed = amount.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Invalid);
        }

        let (whole_part, fraction_part) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };

        if whole_part.is_empty() || !whole_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(AmountError::Invalid);
        }
        if !fraction_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(AmountError::Invalid);
        }

        // Trailing zeros carry no value ("12.500" from a float formatter).
        let fraction_part = fraction_part.trim_end_matches('0');
        if fraction_part.len() > 2 {
            return Err(AmountError::TooManyDecimals);
        }

        let whole = whole_part
            .parse::<i64>()
            .map_err(|_| AmountError::TooLarge)?;
        let fraction = match fraction_part.len() {
            0 => 0,
            1 => fraction_part.parse::<i64>().map_err(|_| AmountError::Invalid)? * 10,
            _ => fraction_part.parse::<i64>().map_err(|_| AmountError::Invalid)?,
        };

        let minor = whole
            .checked_mul(100)
            .and_then(|base| base.checked_add(fraction))
            .ok_or(AmountError::TooLarge)?;

        if minor == 0 {
            return Err(AmountError::Invalid);
        }
        Ok(Money(minor))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// An amount as it arrives in a request body: a JSON number or a string.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    pub fn parse(&self) -> Result<Money, AmountError> {
        match self {
            AmountInput::Number(value) => {
                if !value.is_finite() || *value <= 0.0 {
                    return Err(AmountError::Invalid);
                }
                Money::parse(&value.to_string())
            }
            AmountInput::Text(text) => Money::parse(text),
        }
    }
}

/// Query string for paginated listings.
#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    /// One-based page number (defaults to 1).
    pub page: Option<usize>,
}

impl PageQuery {
    pub fn page(&self) -> usize {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_has_prefix_and_fixed_length() {
        let id = new_uid("cus");
        assert!(id.starts_with("cus_"));
        assert_eq!(id.len(), "cus_".len() + UID_RANDOM_LEN);
        assert_ne!(new_uid("cus"), new_uid("cus"));
    }

    #[test]
    fn parse_converts_to_minor_units() {
        assert_eq!(Money::parse("25.5").unwrap(), Money::from_minor(2550));
        assert_eq!(Money::parse("500").unwrap(), Money::from_major(500));
        assert_eq!(Money::parse(" 0.01 ").unwrap(), Money::from_minor(1));
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(Money::parse("0"), Err(AmountError::Invalid));
        assert_eq!(Money::parse("-5"), Err(AmountError::Invalid));
        assert_eq!(Money::parse("abc"), Err(AmountError::Invalid));
        assert_eq!(Money::parse(".5"), Err(AmountError::Invalid));
        assert_eq!(Money::parse("1.234"), Err(AmountError::TooManyDecimals));
        assert_eq!(
            Money::parse("99999999999999999999"),
            Err(AmountError::TooLarge)
        );
    }

    #[test]
    fn number_input_accepts_floats_with_two_decimals() {
        let input: AmountInput = serde_json::from_str("12.75").unwrap();
        assert_eq!(input.parse().unwrap(), Money::from_minor(1275));

        let input: AmountInput = serde_json::from_str("\"100\"").unwrap();
        assert_eq!(input.parse().unwrap(), Money::from_major(100));

        let input: AmountInput = serde_json::from_str("-3").unwrap();
        assert_eq!(input.parse(), Err(AmountError::Invalid));
    }

    #[test]
    fn display_always_shows_two_decimals() {
        assert_eq!(Money::from_minor(1205).to_string(), "12.05");
        assert_eq!(Money::from_minor(-50).to_string(), "-0.50");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn pagination_helpers() {
        assert_eq!(total_pages(0), 0);
        assert_eq!(total_pages(10), 1);
        assert_eq!(total_pages(11), 2);
        assert_eq!(page_offset(1), 0);
        assert_eq!(page_offset(3), 20);
        assert_eq!(PageQuery { page: Some(0) }.page(), 1);
    }
}
