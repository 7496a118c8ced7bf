//! Fixed-point monetary amounts.
//!
//! An [`Amount`] is a non-negative quantity of a currency held as integer
//! minor units at scale 10^8. The ledger's `(18, 8)` decimal columns are a
//! textual projection of this representation: `Display`/`FromStr` round-trip
//! exactly, and any value that would need more than 18 total digits is
//! rejected rather than rounded.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of fractional digits carried by every amount.
pub const FRACTIONAL_DIGITS: u32 = 8;

/// Minor units per whole currency unit (10^8).
const MINOR_PER_UNIT: i128 = 100_000_000;

/// Exclusive ceiling of the `(18, 8)` column: 10^18 minor units.
const MAX_MINOR_EXCLUSIVE: i128 = 1_000_000_000_000_000_000;

/// Errors from parsing or arithmetic on [`Amount`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    /// The input string was empty or whitespace.
    #[error("empty amount")]
    Empty,

    /// The input string was not a plain decimal number.
    #[error("malformed amount: {0:?}")]
    Malformed(String),

    /// Negative amounts are not representable.
    #[error("negative amount: {0:?}")]
    Negative(String),

    /// More fractional digits than the ledger carries.
    #[error("more than {FRACTIONAL_DIGITS} fractional digits: {0:?}")]
    TooPrecise(String),

    /// The value does not fit the (18, 8) range.
    #[error("amount exceeds the (18, 8) range")]
    OutOfRange,

    /// A subtraction would have produced a negative amount.
    #[error("amount underflow")]
    Underflow,
}

/// A non-negative fixed-point amount in minor units at scale 10^8.
///
/// All arithmetic is checked: overflow past the (18, 8) ceiling and
/// underflow below zero are errors, never wrap-around.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i128);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Builds an amount from raw minor units.
    pub fn from_minor(minor: i128) -> Result<Self, AmountError> {
        if minor < 0 {
            return Err(AmountError::Negative(minor.to_string()));
        }
        if minor >= MAX_MINOR_EXCLUSIVE {
            return Err(AmountError::OutOfRange);
        }
        Ok(Amount(minor))
    }

    /// Raw minor units at scale 10^8.
    pub fn minor_units(self) -> i128 {
        self.0
    }

    /// True when the amount is exactly zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// True when the amount is strictly greater than zero.
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Checked addition; errors when the sum leaves the (18, 8) range.
    pub fn checked_add(self, other: Amount) -> Result<Amount, AmountError> {
        let sum = self.0.checked_add(other.0).ok_or(AmountError::OutOfRange)?;
        Amount::from_minor(sum)
    }

    /// Checked subtraction; errors when the result would be negative.
    pub fn checked_sub(self, other: Amount) -> Result<Amount, AmountError> {
        if other.0 > self.0 {
            return Err(AmountError::Underflow);
        }
        Ok(Amount(self.0 - other.0))
    }

    /// Subtraction clamped at zero.
    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0).max(0))
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Empty);
        }
        if trimmed.starts_with('-') {
            return Err(AmountError::Negative(trimmed.to_string()));
        }

        let (int_part, frac_part) = match trimmed.split_once('.') {
            Some((i, f)) => (i, f),
            None => (trimmed, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(AmountError::Malformed(trimmed.to_string()));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(AmountError::Malformed(trimmed.to_string()));
        }
        if frac_part.len() > FRACTIONAL_DIGITS as usize {
            return Err(AmountError::TooPrecise(trimmed.to_string()));
        }

        let whole: i128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| AmountError::OutOfRange)?
        };
        let mut frac: i128 = if frac_part.is_empty() {
            0
        } else {
            frac_part
                .parse()
                .map_err(|_| AmountError::Malformed(trimmed.to_string()))?
        };
        for _ in frac_part.len()..FRACTIONAL_DIGITS as usize {
            frac *= 10;
        }

        let minor = whole
            .checked_mul(MINOR_PER_UNIT)
            .and_then(|m| m.checked_add(frac))
            .ok_or(AmountError::OutOfRange)?;
        Amount::from_minor(minor)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MINOR_PER_UNIT;
        let frac = self.0 % MINOR_PER_UNIT;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{frac:08}");
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
