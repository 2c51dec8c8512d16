//! Input domains for scenario generation.

use std::ops::RangeInclusive;

use proptest::prelude::*;
use proptest::sample::select;

use crate::amount::Amount;

/// Characters allowed in generated free text.
pub const TEXT_ALPHABET: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 -_";

/// Non-empty text over [`TEXT_ALPHABET`] of at most `max_len` characters.
pub fn free_text(max_len: usize) -> impl Strategy<Value = String> {
    let alphabet: Vec<char> = TEXT_ALPHABET.chars().collect();
    prop::collection::vec(select(alphabet), 1..=max_len.max(1))
        .prop_map(|chars| chars.into_iter().collect())
}

/// Amounts in `[min, max]` at the fixed scale, so no input ever needs
/// rounding.
pub fn amount(min: Amount, max: Amount) -> impl Strategy<Value = Amount> {
    (min.minor()..=max.minor()).prop_map(Amount::from_minor)
}

/// 0.01 to 1,000,000.00.
pub fn money() -> impl Strategy<Value = Amount> {
    amount(Amount::from_minor(1), Amount::from_units(1_000_000))
}

pub fn int(range: RangeInclusive<i64>) -> impl Strategy<Value = i64> {
    range
}

pub fn ints(range: RangeInclusive<i64>, len: RangeInclusive<usize>) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(range, len)
}

pub fn flag() -> impl Strategy<Value = bool> {
    any::<bool>()
}

/// One of a small enumerated set, e.g. currency codes or state labels.
pub fn token(options: &'static [&'static str]) -> impl Strategy<Value = &'static str> {
    select(options)
}
