//! Fixed-scale decimal quantities.
//!
//! Monetary fields carry exactly [`AMOUNT_SCALE`] fractional digits. Values
//! are held as an integer count of minor units so comparison is exact.
//! Parsing accepts extra fractional digits only when they are zero (ledgers
//! commonly render `12.5` as `12.5000000000`); anything that would need
//! rounding is an error.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

pub const AMOUNT_SCALE: u32 = 2;
const UNIT: i128 = 10i128.pow(AMOUNT_SCALE);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("empty amount")]
    Empty,

    #[error("not a decimal amount: {0:?}")]
    Invalid(String),

    #[error("amount {0:?} needs rounding beyond {AMOUNT_SCALE} decimal places")]
    ExceedsScale(String),

    #[error("amount overflow")]
    Overflow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor(minor: i128) -> Self {
        Self(minor)
    }

    pub fn from_units(units: i64) -> Self {
        Self(i128::from(units) * UNIT)
    }

    pub const fn minor(self) -> i128 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn checked_mul_int(self, factor: i64) -> Option<Amount> {
        self.0.checked_mul(i128::from(factor)).map(Amount)
    }

    pub fn parse(raw: &str) -> Result<Self, AmountError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Empty);
        }
        let invalid = || AmountError::Invalid(raw.to_string());

        let (negative, digits) = match trimmed.as_bytes()[0] {
            b'-' => (true, &trimmed[1..]),
            b'+' => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if digits.ends_with('.') {
            return Err(invalid());
        }

        let scale = AMOUNT_SCALE as usize;
        let (kept, dropped) = fraction.split_at(fraction.len().min(scale));
        if dropped.bytes().any(|b| b != b'0') {
            return Err(AmountError::ExceedsScale(raw.to_string()));
        }

        let mut minor: i128 = 0;
        for b in whole.bytes() {
            minor = minor
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(b - b'0')))
                .ok_or(AmountError::Overflow)?;
        }
        for i in 0..scale {
            let digit = kept.as_bytes().get(i).map_or(0, |b| b - b'0');
            minor = minor
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(digit)))
                .ok_or(AmountError::Overflow)?;
        }
        Ok(Self(if negative { -minor } else { minor }))
    }

    /// Reads an amount from a JSON string or number.
    pub fn from_json(value: &Value) -> Result<Self, AmountError> {
        match value {
            Value::String(raw) => Self::parse(raw),
            Value::Number(number) => Self::parse(&number.to_string()),
            other => Err(AmountError::Invalid(other.to_string())),
        }
    }

    pub fn to_json(self) -> Value {
        Value::String(self.to_string())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let unit = UNIT.unsigned_abs();
        write!(
            f,
            "{sign}{}.{:0width$}",
            abs / unit,
            abs % unit,
            width = AMOUNT_SCALE as usize
        )
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}
