//! Fixed-point money and share arithmetic.
//!
//! Amounts are stored as an integer count of micro-units (10^-6), so all
//! ledger math is exact integer arithmetic; the decimal string at the wire
//! boundary is the only place formatting is visible.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of implied fractional digits.
pub const SCALE: u32 = 6;

/// Micro-units per whole unit (10^SCALE).
const SCALE_FACTOR: i128 = 1_000_000;

/// Denominator for basis-point math.
const BPS_DENOMINATOR: i128 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("invalid decimal format: {0:?}")]
    InvalidFormat(String),
    #[error("more than {SCALE} fractional digits: {0:?}")]
    PrecisionExceeded(String),
    #[error("arithmetic overflow")]
    Overflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("{0} must not be negative")]
    NegativeValue(String),
    #[error("basis points must be an integer in [0, 10000): {0:?}")]
    BasisPointsOutOfRange(String),
}

/// Fixed-point amount: an exact count of micro-units at scale 6.
///
/// Parses from and formats to canonical decimal strings with exactly six
/// fractional digits, so `Amount::parse(s)?.to_string() == s` for every
/// canonical input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// One whole unit (1.000000).
    pub const ONE: Amount = Amount(SCALE_FACTOR);

    /// Construct from a raw micro-unit count.
    pub fn from_micros(micros: i128) -> Self {
        Amount(micros)
    }

    /// The raw micro-unit count.
    pub fn as_micros(&self) -> i128 {
        self.0
    }

    /// Parse a decimal string of the form `-?\d*\.?\d*` with at least one
    /// digit and at most [`SCALE`] fractional digits.
    ///
    /// # Errors
    /// `InvalidFormat` for empty or malformed input, `PrecisionExceeded` when
    /// more fractional digits are supplied than the scale carries, `Overflow`
    /// when the value does not fit the backing integer.
    pub fn parse(s: &str) -> Result<Self, AmountError> {
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(AmountError::InvalidFormat(s.to_string()));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(AmountError::InvalidFormat(s.to_string()));
        }
        if frac_part.len() > SCALE as usize {
            return Err(AmountError::PrecisionExceeded(s.to_string()));
        }

        let int_units: i128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| AmountError::Overflow)?
        };

        let mut frac_units: i128 = 0;
        if !frac_part.is_empty() {
            // Right-pad to the full scale: "5" -> 500000 micros.
            frac_units = frac_part.parse().map_err(|_| AmountError::Overflow)?;
            for _ in frac_part.len()..SCALE as usize {
                frac_units *= 10;
            }
        }

        let magnitude = int_units
            .checked_mul(SCALE_FACTOR)
            .and_then(|v| v.checked_add(frac_units))
            .ok_or(AmountError::Overflow)?;

        Ok(Amount(if negative { -magnitude } else { magnitude }))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Fail with `NegativeValue` if this balance is below zero.
    ///
    /// Applied to every externally influenced balance before it enters
    /// arithmetic, so corrupted state surfaces as a localized error instead of
    /// propagating through share math.
    pub fn ensure_non_negative(&self, label: &str) -> Result<(), AmountError> {
        if self.is_negative() {
            return Err(AmountError::NegativeValue(label.to_string()));
        }
        Ok(())
    }

    pub fn checked_add(self, rhs: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_add(rhs.0)
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }

    pub fn checked_sub(self, rhs: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_sub(rhs.0)
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }

    /// `max(0, self - rhs)`.
    pub fn sub_or_zero(self, rhs: Amount) -> Amount {
        if self.0 <= rhs.0 {
            Amount::ZERO
        } else {
            Amount(self.0 - rhs.0)
        }
    }

    /// `floor(self * num / den)` with widened intermediates.
    ///
    /// # Errors
    /// `DivisionByZero` when `den` is zero, `Overflow` when the product does
    /// not fit the backing integer.
    pub fn mul_div_floor(self, num: Amount, den: Amount) -> Result<Amount, AmountError> {
        if den.0 == 0 {
            return Err(AmountError::DivisionByZero);
        }
        let product = self.0.checked_mul(num.0).ok_or(AmountError::Overflow)?;
        Ok(Amount(product / den.0))
    }

    pub fn min(self, other: Amount) -> Amount {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: Amount) -> Amount {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for Amount {
    /// Canonical form: sign, integer part, then exactly [`SCALE`] fractional
    /// digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.0.unsigned_abs();
        let int_part = magnitude / SCALE_FACTOR as u128;
        let frac_part = magnitude % SCALE_FACTOR as u128;
        if self.0 < 0 {
            write!(f, "-")?;
        }
        write!(f, "{}.{:06}", int_part, frac_part)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Amount::parse(&s).map_err(de::Error::custom)
    }
}

/// Validated basis-point parameter, strictly below 100%.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct BasisPoints(u16);

impl BasisPoints {
    pub const ZERO: BasisPoints = BasisPoints(0);

    /// Construct from an integer, rejecting values at or above 10 000.
    pub fn new(bps: u16) -> Result<Self, AmountError> {
        if bps >= BPS_DENOMINATOR as u16 {
            return Err(AmountError::BasisPointsOutOfRange(bps.to_string()));
        }
        Ok(BasisPoints(bps))
    }

    /// Parse from a non-negative integer string.
    pub fn parse(s: &str) -> Result<Self, AmountError> {
        let bps: u16 = s
            .parse()
            .map_err(|_| AmountError::BasisPointsOutOfRange(s.to_string()))?;
        BasisPoints::new(bps)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// `floor(amount * bps / 10000)`.
    pub fn apply(&self, amount: Amount) -> Result<Amount, AmountError> {
        let product = amount
            .as_micros()
            .checked_mul(self.0 as i128)
            .ok_or(AmountError::Overflow)?;
        Ok(Amount::from_micros(product / BPS_DENOMINATOR))
    }

    /// The remaining fraction, `10000 - bps`. Always positive.
    pub fn complement(&self) -> i128 {
        BPS_DENOMINATOR - self.0 as i128
    }
}

impl TryFrom<u16> for BasisPoints {
    type Error = AmountError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        BasisPoints::new(value)
    }
}

impl From<BasisPoints> for u16 {
    fn from(value: BasisPoints) -> Self {
        value.0
    }
}
