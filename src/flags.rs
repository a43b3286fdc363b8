//! Composite flag sets and their comma-delimited wire records.
//!
//! Several SCPI attributes accept more than one member at once (format elements,
//! compensation standards, trace feeds). On the wire those are a comma-separated
//! record such as `OPEN,LOAD`; in memory they are a [`FlagSet`], an integer mask
//! typed by its enumeration.
//!
//! Encoding always walks the enumeration's declaration order, never the caller's,
//! because that order is the order the instrument expects. The zero member means
//! "none" and is never emitted; an empty set encodes to the empty string.
//!
//! Decoding is tolerant by default: unknown tokens are dropped and reported in
//! [`Decoded::dropped`] so callers can notice protocol drift. [`decode_strict`]
//! fails instead.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{BitAnd, BitOr, Sub};

use crate::error::ParseError;
use crate::token_table::{TokenTable, WireEnum};

/// Delimiter between tokens in a composite record.
pub const RECORD_DELIMITER: char = ',';

/// A set of [`WireEnum`] members backed by their integral bits.
pub struct FlagSet<E> {
    bits: u32,
    _marker: PhantomData<fn() -> E>,
}

impl<E> Clone for FlagSet<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for FlagSet<E> {}

impl<E> PartialEq for FlagSet<E> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<E> Eq for FlagSet<E> {}

impl<E> Hash for FlagSet<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits.hash(state);
    }
}

impl<E> Default for FlagSet<E> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<E> fmt::Debug for FlagSet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlagSet({:#x})", self.bits)
    }
}

impl<E> FlagSet<E> {
    /// The empty ("none") set.
    pub const fn empty() -> Self {
        Self {
            bits: 0,
            _marker: PhantomData,
        }
    }

    /// Wrap raw bits without checking them against any table.
    pub const fn from_bits(bits: u32) -> Self {
        Self {
            bits,
            _marker: PhantomData,
        }
    }

    /// Raw bits.
    pub const fn bits(self) -> u32 {
        self.bits
    }

    /// True if no bit is set.
    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    /// Members present in either set.
    pub const fn union(self, other: Self) -> Self {
        Self::from_bits(self.bits | other.bits)
    }

    /// Members present in both sets. Used to apply a supported mask.
    pub const fn intersection(self, other: Self) -> Self {
        Self::from_bits(self.bits & other.bits)
    }

    /// Members of `self` not in `other`.
    pub const fn difference(self, other: Self) -> Self {
        Self::from_bits(self.bits & !other.bits)
    }

    /// True if every bit of `other` is also set in `self`.
    pub const fn contains_all(self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }
}

impl<E: WireEnum> FlagSet<E> {
    /// Set containing exactly `value`.
    pub fn from_value(value: E) -> Self {
        Self::from_bits(value.bits())
    }

    /// Every member declared in `table`.
    pub fn all(table: &TokenTable<E>) -> Self {
        Self::from_bits(table.all_bits())
    }

    /// Add `value` to the set.
    pub fn insert(&mut self, value: E) {
        self.bits |= value.bits();
    }

    /// Remove `value` from the set.
    pub fn remove(&mut self, value: E) {
        self.bits &= !value.bits();
    }

    /// Membership test. The zero member is "contained" only by the empty set.
    pub fn contains(self, value: E) -> bool {
        match value.bits() {
            0 => self.is_empty(),
            bits => self.bits & bits == bits,
        }
    }

    /// Non-zero members of the set in canonical declaration order.
    pub fn members<'a>(self, table: &'a TokenTable<E>) -> impl Iterator<Item = E> + 'a {
        table
            .iter()
            .map(|(value, _)| value)
            .filter(move |value| value.bits() != 0 && self.contains(*value))
    }
}

impl<E: WireEnum> From<E> for FlagSet<E> {
    fn from(value: E) -> Self {
        Self::from_value(value)
    }
}

impl<E: WireEnum> FromIterator<E> for FlagSet<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |acc, v| acc.union(Self::from_value(v)))
    }
}

impl<E> BitOr for FlagSet<E> {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl<E> BitAnd for FlagSet<E> {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl<E> Sub for FlagSet<E> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.difference(rhs)
    }
}

/// Result of a tolerant decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<E> {
    /// Members recognised in the record.
    pub flags: FlagSet<E>,
    /// Tokens that were not in the table, in the order they appeared.
    pub dropped: Vec<String>,
}

impl<E> Decoded<E> {
    /// True if every token in the record was recognised.
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// Encode `flags` as a comma-delimited record in canonical order.
///
/// Bits not declared in `table` are ignored; an empty set yields `""`.
pub fn encode<E: WireEnum>(flags: FlagSet<E>, table: &TokenTable<E>) -> String {
    let mut record = String::new();
    for (value, token) in table.iter() {
        if value.bits() == 0 || !flags.contains(value) {
            continue;
        }
        if !record.is_empty() {
            record.push(RECORD_DELIMITER);
        }
        record.push_str(token);
    }
    record
}

/// Decode a record, dropping unknown tokens.
pub fn decode<E: WireEnum>(record: &str, table: &TokenTable<E>) -> Decoded<E> {
    let mut flags = FlagSet::empty();
    let mut dropped = Vec::new();

    for token in tokens(record) {
        match table.from_token(token) {
            Ok(value) => flags.insert(value),
            Err(_) => {
                tracing::warn!(token, record, "dropping unknown token from composite reply");
                dropped.push(token.to_string());
            }
        }
    }

    Decoded { flags, dropped }
}

/// Decode a record, failing on the first unknown token.
///
/// # Errors
///
/// [`ParseError::UnknownToken`] naming the first unrecognised token.
pub fn decode_strict<E: WireEnum>(
    record: &str,
    table: &TokenTable<E>,
) -> Result<FlagSet<E>, ParseError> {
    tokens(record).try_fold(FlagSet::empty(), |mut flags, token| -> Result<_, ParseError> {
        flags.insert(table.from_token(token)?);
        Ok(flags)
    })
}

/// Split a record into trimmed, non-empty tokens. One pair of enclosing double
/// quotes (SCPI string response) is removed first.
fn tokens(record: &str) -> impl Iterator<Item = &str> {
    let trimmed = record.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted
        .split(RECORD_DELIMITER)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    crate::wire_enum! {
        enum Standard {
            None = 0 => "Open",
            OpenCircuit = 1 => "OPEN",
            ShortCircuit = 2 => "SHOR",
            Load = 4 => "LOAD",
        }
    }

    fn table() -> &'static TokenTable<Standard> {
        Standard::token_table().unwrap()
    }

    #[test]
    fn test_encode_uses_canonical_order() {
        let flags: FlagSet<Standard> = [Standard::Load, Standard::OpenCircuit]
            .into_iter()
            .collect();
        assert_eq!(encode(flags, table()), "OPEN,LOAD");
    }

    #[test]
    fn test_encode_never_emits_none() {
        assert_eq!(encode(FlagSet::from(Standard::None), table()), "");
        assert_eq!(encode(FlagSet::<Standard>::empty(), table()), "");
    }

    #[test]
    fn test_decode_scenario() {
        let decoded = decode("OPEN,LOAD", table());
        assert_eq!(decoded.flags.bits(), 5);
        assert!(decoded.flags.contains(Standard::OpenCircuit));
        assert!(decoded.flags.contains(Standard::Load));
        assert!(decoded.is_clean());
    }

    #[test]
    #[traced_test]
    fn test_decode_drops_unknown_tokens() {
        let decoded = decode("OPEN,BOGUS,LOAD", table());
        assert_eq!(decoded.flags.bits(), 5);
        assert_eq!(decoded.dropped, vec!["BOGUS".to_string()]);
        assert!(logs_contain("dropping unknown token"));
    }

    #[test]
    fn test_decode_empty_and_whitespace() {
        assert!(decode("", table()).flags.is_empty());
        assert!(decode("   \r\n", table()).flags.is_empty());
        assert!(decode("\"\"", table()).flags.is_empty());
    }

    #[test]
    fn test_decode_tolerates_padding_and_quotes() {
        let decoded = decode("\" open , shor \"", table());
        assert_eq!(decoded.flags.bits(), 3);
    }

    #[test]
    fn test_decode_strict_reports_first_unknown() {
        let err = decode_strict("OPEN,BOGUS,WORSE", table()).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownToken {
                token: "BOGUS".into()
            }
        );
        assert_eq!(decode_strict("SHOR", table()).unwrap().bits(), 2);
    }

    #[test]
    fn test_decode_inverts_encode_under_mask() {
        let supported = FlagSet::from(Standard::OpenCircuit) | FlagSet::from(Standard::Load);
        for bits in 0..8 {
            let masked = FlagSet::<Standard>::from_bits(bits) & supported;
            let record = encode(masked, table());
            assert_eq!(decode(&record, table()).flags, masked, "record {record:?}");
        }
    }

    #[test]
    fn test_set_algebra() {
        let mut flags = FlagSet::from(Standard::OpenCircuit);
        flags.insert(Standard::ShortCircuit);
        assert!(flags.contains_all(FlagSet::from_bits(3)));
        assert!(!flags.contains(Standard::None));

        flags.remove(Standard::OpenCircuit);
        assert_eq!(flags, FlagSet::from(Standard::ShortCircuit));

        let all = FlagSet::all(table());
        assert_eq!((all - flags).bits(), 5);
        assert!(FlagSet::<Standard>::empty().contains(Standard::None));

        let members: Vec<_> = all.members(table()).collect();
        assert_eq!(
            members,
            vec![Standard::OpenCircuit, Standard::ShortCircuit, Standard::Load]
        );
    }
}
