//! Bidirectional mapping between enumeration members and SCPI wire tokens.
//!
//! Every enumerated attribute in an instrument subsystem has a closed set of
//! members, each carrying a human-readable label with the wire token embedded in
//! parentheses, e.g. `"Short circuit (SHOR)"`. A [`TokenTable`] is built once per
//! enumeration type from that declarative list and is immutable afterwards.
//!
//! # Lookup rules
//!
//! - [`TokenTable::to_token`] returns the canonical token for a member.
//! - [`TokenTable::from_token`] trims the reply and prefers an exact match. Failing
//!   that it falls back to a case-insensitive match, preferring non-zero members in
//!   declaration order over the zero ("none") member.
//! - Unknown tokens fail with [`ParseError::UnknownToken`]; nothing silently
//!   defaults.
//!
//! # Declaring an enumeration
//!
//! ```rust
//! use scpi_sync::wire_enum;
//! use scpi_sync::token_table::WireEnum;
//!
//! wire_enum! {
//!     /// Compensation standards.
//!     pub enum Standard {
//!         None = 0 => "Open",
//!         OpenCircuit = 1 => "Open circuit (OPEN)",
//!         ShortCircuit = 2 => "Short circuit (SHOR)",
//!         Load = 4 => "Load (LOAD)",
//!     }
//! }
//!
//! let table = Standard::token_table().unwrap();
//! assert_eq!(table.to_token(Standard::ShortCircuit), Some("SHOR"));
//! assert_eq!(table.from_token(" load ").unwrap(), Standard::Load);
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{ParseError, SyncError, SyncResult};

/// A closed enumeration whose members map to SCPI wire tokens.
///
/// Implemented by the [`wire_enum!`](crate::wire_enum) macro; hand-written impls
/// must keep `descriptors()` in declaration order because that order drives
/// composite record encoding.
pub trait WireEnum: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Members paired with their descriptor labels, in canonical order.
    fn descriptors() -> &'static [(Self, &'static str)];

    /// Integral value of this member.
    fn bits(self) -> u32;

    /// The shared token table for this type, built on first use.
    fn token_table() -> SyncResult<&'static TokenTable<Self>>;
}

/// Extract the canonical wire token from a descriptor label.
///
/// The token is the content of the last parenthesised group; a label without
/// parentheses is its own token.
pub fn extract_token(label: &str) -> &str {
    if let Some(open) = label.rfind('(') {
        if let Some(len) = label[open + 1..].find(')') {
            return label[open + 1..open + 1 + len].trim();
        }
    }
    label.trim()
}

#[derive(Debug, Clone)]
struct Entry<E> {
    value: E,
    label: &'static str,
    token: String,
}

/// Immutable member ↔ token mapping for one enumeration type.
#[derive(Debug, Clone)]
pub struct TokenTable<E> {
    entries: Vec<Entry<E>>,
    exact: HashMap<String, E>,
    folded: HashMap<String, E>,
}

impl<E: WireEnum> TokenTable<E> {
    /// Build a table from `(member, label)` descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if a label yields an empty token, if two
    /// members share a token, or if two descriptors share an integral value.
    pub fn build(descriptors: &[(E, &'static str)]) -> SyncResult<Self> {
        let mut entries = Vec::with_capacity(descriptors.len());
        let mut exact = HashMap::with_capacity(descriptors.len());
        let mut seen_bits = HashMap::with_capacity(descriptors.len());

        for &(value, label) in descriptors {
            let token = extract_token(label);
            if token.is_empty() {
                return Err(SyncError::Configuration(format!(
                    "{}::{:?} has no wire token in label '{}'",
                    type_label::<E>(),
                    value,
                    label
                )));
            }
            if let Some(previous) = seen_bits.insert(value.bits(), value) {
                return Err(SyncError::Configuration(format!(
                    "{}::{:?} and {:?} share value {}",
                    type_label::<E>(),
                    previous,
                    value,
                    value.bits()
                )));
            }
            if let Some(previous) = exact.insert(token.to_string(), value) {
                return Err(SyncError::Configuration(format!(
                    "{}::{:?} and {:?} share wire token '{}'",
                    type_label::<E>(),
                    previous,
                    value,
                    token
                )));
            }
            entries.push(Entry {
                value,
                label,
                token: token.to_string(),
            });
        }

        // Non-zero members claim case-folded keys first.
        let mut folded = HashMap::with_capacity(entries.len());
        let ordered = entries
            .iter()
            .filter(|e| e.value.bits() != 0)
            .chain(entries.iter().filter(|e| e.value.bits() == 0));
        for entry in ordered {
            folded
                .entry(entry.token.to_ascii_uppercase())
                .or_insert(entry.value);
        }

        tracing::debug!(
            enumeration = type_label::<E>(),
            tokens = entries.len(),
            "built token table"
        );

        Ok(Self {
            entries,
            exact,
            folded,
        })
    }

    /// Canonical token for `value`, or `None` if the member was not declared.
    pub fn to_token(&self, value: E) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.value == value)
            .map(|e| e.token.as_str())
    }

    /// Resolve a device token to a member.
    ///
    /// # Errors
    ///
    /// [`ParseError::UnknownToken`] if neither an exact nor a case-insensitive match
    /// exists.
    pub fn from_token(&self, token: &str) -> Result<E, ParseError> {
        let trimmed = token.trim();
        if let Some(value) = self.exact.get(trimmed) {
            return Ok(*value);
        }
        self.folded
            .get(&trimmed.to_ascii_uppercase())
            .copied()
            .ok_or_else(|| ParseError::UnknownToken {
                token: trimmed.to_string(),
            })
    }

    /// Full descriptor label of `value`.
    pub fn label(&self, value: E) -> Option<&'static str> {
        self.entries.iter().find(|e| e.value == value).map(|e| e.label)
    }

    /// The zero-valued member, if the enumeration declares one.
    pub fn none(&self) -> Option<E> {
        self.entries
            .iter()
            .find(|e| e.value.bits() == 0)
            .map(|e| e.value)
    }

    /// Members and tokens in canonical declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (E, &str)> + '_ {
        self.entries.iter().map(|e| (e.value, e.token.as_str()))
    }

    /// Union of every member's bits.
    pub fn all_bits(&self) -> u32 {
        self.entries.iter().fold(0, |acc, e| acc | e.value.bits())
    }

    /// Member whose integral value equals `bits` exactly.
    pub fn from_bits(&self, bits: u32) -> Option<E> {
        self.entries
            .iter()
            .find(|e| e.value.bits() == bits)
            .map(|e| e.value)
    }

    /// Number of declared members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no members were declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn type_label<E>() -> &'static str {
    let full = std::any::type_name::<E>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Declare a [`WireEnum`] together with its descriptor labels.
///
/// Each member is written `Name = value => "label"`. The generated type derives
/// `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq` and `Hash`, is `#[repr(u32)]`, and
/// builds its [`TokenTable`] lazily on the first call to `token_table()`.
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $bits:expr => $label:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant = $bits
            ),+
        }

        impl $crate::token_table::WireEnum for $name {
            fn descriptors() -> &'static [(Self, &'static str)] {
                &[$(($name::$variant, $label)),+]
            }

            fn bits(self) -> u32 {
                self as u32
            }

            fn token_table(
            ) -> $crate::error::SyncResult<&'static $crate::token_table::TokenTable<Self>> {
                static TABLE: $crate::__private::OnceCell<
                    $crate::token_table::TokenTable<$name>,
                > = $crate::__private::OnceCell::new();
                TABLE.get_or_try_init(|| {
                    $crate::token_table::TokenTable::build(
                        <Self as $crate::token_table::WireEnum>::descriptors(),
                    )
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::wire_enum! {
        enum Standard {
            None = 0 => "Open",
            OpenCircuit = 1 => "OPEN",
            ShortCircuit = 2 => "SHOR",
            Load = 4 => "LOAD",
        }
    }

    crate::wire_enum! {
        enum Clashing {
            First = 1 => "First (FRST)",
            Second = 2 => "Also first (FRST)",
        }
    }

    crate::wire_enum! {
        enum Blank {
            Only = 1 => "Nothing here ( )",
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum SameBits {
        A,
        B,
    }

    impl WireEnum for SameBits {
        fn descriptors() -> &'static [(Self, &'static str)] {
            &[(SameBits::A, "A"), (SameBits::B, "B")]
        }

        fn bits(self) -> u32 {
            1
        }

        fn token_table() -> SyncResult<&'static TokenTable<Self>> {
            Err(SyncError::Configuration("not used".into()))
        }
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(extract_token("Short circuit (SHOR)"), "SHOR");
        assert_eq!(extract_token("Short (0 Ohm) (SHOR)"), "SHOR");
        assert_eq!(extract_token("  LOAD "), "LOAD");
        assert_eq!(extract_token("Unclosed (PAREN"), "Unclosed (PAREN");
    }

    #[test]
    fn test_round_trip_every_member() {
        let table = Standard::token_table().unwrap();
        for &(value, _) in Standard::descriptors() {
            let token = table.to_token(value).unwrap();
            assert_eq!(table.from_token(token).unwrap(), value);
        }
    }

    #[test]
    fn test_case_insensitive_prefers_non_zero_member() {
        let table = Standard::token_table().unwrap();
        assert_eq!(table.from_token("Open").unwrap(), Standard::None);
        assert_eq!(table.from_token("OPEN").unwrap(), Standard::OpenCircuit);
        assert_eq!(table.from_token("open").unwrap(), Standard::OpenCircuit);
        assert_eq!(table.from_token("  shor\r\n").unwrap(), Standard::ShortCircuit);
    }

    #[test]
    fn test_unknown_token_fails() {
        let table = Standard::token_table().unwrap();
        let err = table.from_token("BOGUS").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownToken {
                token: "BOGUS".into()
            }
        );
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let err = Clashing::token_table().unwrap_err();
        assert!(err.to_string().contains("share wire token 'FRST'"));
    }

    #[test]
    fn test_empty_token_rejected() {
        let err = Blank::token_table().unwrap_err();
        assert!(err.to_string().contains("no wire token"));
    }

    #[test]
    fn test_duplicate_value_rejected() {
        let err = TokenTable::build(SameBits::descriptors()).unwrap_err();
        assert!(err.to_string().contains("share value 1"));
    }

    #[test]
    fn test_table_is_built_once() {
        let a = Standard::token_table().unwrap() as *const _;
        let b = Standard::token_table().unwrap() as *const _;
        assert_eq!(a, b);
    }

    #[test]
    fn test_metadata_accessors() {
        let table = Standard::token_table().unwrap();
        assert_eq!(table.none(), Some(Standard::None));
        assert_eq!(table.all_bits(), 7);
        assert_eq!(table.from_bits(4), Some(Standard::Load));
        assert_eq!(table.label(Standard::Load), Some("LOAD"));
        assert_eq!(table.len(), 4);
        let order: Vec<_> = table.iter().map(|(v, _)| v).collect();
        assert_eq!(
            order,
            vec![
                Standard::None,
                Standard::OpenCircuit,
                Standard::ShortCircuit,
                Standard::Load
            ]
        );
    }
}
