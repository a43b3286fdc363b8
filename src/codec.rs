//! Value ↔ wire text conversion for [`StateSyncPort`](crate::port::StateSyncPort).
//!
//! A port is generic over a [`WireCodec`], which knows how to format a value for
//! a write command, how to parse the device's reply, and which part of a value
//! the device variant supports.
//!
//! | Codec | Value type | Wire form |
//! |-------|------------|-----------|
//! | [`EnumCodec`] | a [`WireEnum`] member | its token, e.g. `HIMP` |
//! | [`FlagsCodec`] | [`FlagSet`] | comma record, e.g. `OPEN,LOAD` |
//! | [`BoolCodec`] | `bool` | `ON`/`OFF` out, `1`/`0`/`ON`/`OFF` in |
//! | [`NumericCodec`] | any `FromStr + Display` number | native text |
//! | [`RegisterCodec`] | `u32` bit register | integer out, integer or whole NR3 in |

use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;

use crate::error::{ParseError, SyncError, SyncResult};
use crate::flags::{self, FlagSet};
use crate::token_table::{TokenTable, WireEnum};

/// Formatting, parsing and masking for one attribute type.
pub trait WireCodec<T>: Send + Sync {
    /// Restrict `value` to what the device variant accepts. Identity by default.
    fn mask(&self, value: T) -> T {
        value
    }

    /// Text placed in the write command.
    fn format(&self, value: &T) -> SyncResult<String>;

    /// Decode a reply. `reply` is `None` when the transport reported a nil reply;
    /// `fallback` is the currently cached value.
    fn parse(&self, attribute: &str, reply: Option<&str>, fallback: Option<&T>) -> SyncResult<T>;
}

fn invalid(attribute: &str, reply: Option<&str>) -> SyncError {
    ParseError::InvalidValue {
        attribute: attribute.to_string(),
        reply: reply.unwrap_or_default().to_string(),
    }
    .into()
}

/// Single-member enumeration codec.
#[derive(Debug, Clone, Copy)]
pub struct EnumCodec<E: 'static> {
    table: &'static TokenTable<E>,
}

impl<E: WireEnum> EnumCodec<E> {
    /// Codec over `E`'s shared token table.
    ///
    /// # Errors
    ///
    /// Propagates the table's construction error.
    pub fn new() -> SyncResult<Self> {
        Ok(Self {
            table: E::token_table()?,
        })
    }
}

impl<E: WireEnum> WireCodec<E> for EnumCodec<E> {
    fn format(&self, value: &E) -> SyncResult<String> {
        self.table.to_token(*value).map(str::to_string).ok_or_else(|| {
            SyncError::Configuration(format!("{:?} has no wire token", value))
        })
    }

    fn parse(&self, attribute: &str, reply: Option<&str>, fallback: Option<&E>) -> SyncResult<E> {
        match reply {
            Some(token) => Ok(self.table.from_token(token)?),
            None => fallback
                .copied()
                .or_else(|| self.table.none())
                .ok_or_else(|| invalid(attribute, reply)),
        }
    }
}

/// Composite record codec with an optional supported mask.
#[derive(Debug, Clone, Copy)]
pub struct FlagsCodec<E: 'static> {
    table: &'static TokenTable<E>,
    supported: Option<FlagSet<E>>,
    strict: bool,
}

impl<E: WireEnum> FlagsCodec<E> {
    /// Tolerant codec accepting every member.
    ///
    /// # Errors
    ///
    /// Propagates the table's construction error.
    pub fn new() -> SyncResult<Self> {
        Ok(Self {
            table: E::token_table()?,
            supported: None,
            strict: false,
        })
    }

    /// Filter every written value through `supported`.
    pub fn with_supported(mut self, supported: FlagSet<E>) -> Self {
        self.supported = Some(supported);
        self
    }

    /// Fail on unknown tokens instead of dropping them.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// The supported mask, if one was configured.
    pub fn supported(&self) -> Option<FlagSet<E>> {
        self.supported
    }

    /// The token table this codec encodes with.
    pub fn table(&self) -> &'static TokenTable<E> {
        self.table
    }
}

impl<E: WireEnum> WireCodec<FlagSet<E>> for FlagsCodec<E> {
    fn mask(&self, value: FlagSet<E>) -> FlagSet<E> {
        match self.supported {
            Some(supported) => value & supported,
            None => value,
        }
    }

    fn format(&self, value: &FlagSet<E>) -> SyncResult<String> {
        Ok(flags::encode(*value, self.table))
    }

    fn parse(
        &self,
        _attribute: &str,
        reply: Option<&str>,
        _fallback: Option<&FlagSet<E>>,
    ) -> SyncResult<FlagSet<E>> {
        let record = reply.unwrap_or_default();
        if self.strict {
            Ok(flags::decode_strict(record, self.table)?)
        } else {
            Ok(flags::decode(record, self.table).flags)
        }
    }
}

/// SCPI boolean codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolCodec;

impl WireCodec<bool> for BoolCodec {
    fn format(&self, value: &bool) -> SyncResult<String> {
        Ok(if *value { "ON" } else { "OFF" }.to_string())
    }

    fn parse(&self, attribute: &str, reply: Option<&str>, fallback: Option<&bool>) -> SyncResult<bool> {
        let Some(text) = reply else {
            return fallback.copied().ok_or_else(|| invalid(attribute, reply));
        };
        match text.trim().to_ascii_uppercase().as_str() {
            "ON" | "1" | "TRUE" => Ok(true),
            "OFF" | "0" | "FALSE" => Ok(false),
            other => other
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(|n| n != 0.0)
                .ok_or_else(|| invalid(attribute, reply)),
        }
    }
}

/// Codec for native numeric replies (`f64`, `u32`, `i64`, ...).
#[derive(Debug, Clone, Copy)]
pub struct NumericCodec<N> {
    _marker: PhantomData<fn() -> N>,
}

impl<N> Default for NumericCodec<N> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<N> NumericCodec<N> {
    /// Create a numeric codec.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<N> WireCodec<N> for NumericCodec<N>
where
    N: FromStr + Display + Copy + Send + Sync,
{
    fn format(&self, value: &N) -> SyncResult<String> {
        Ok(value.to_string())
    }

    fn parse(&self, attribute: &str, reply: Option<&str>, fallback: Option<&N>) -> SyncResult<N> {
        match reply {
            Some(text) => text.trim().parse::<N>().map_err(|_| invalid(attribute, reply)),
            None => fallback.copied().ok_or_else(|| invalid(attribute, reply)),
        }
    }
}

/// Codec for unsigned bit registers.
///
/// Instruments often report registers in NR3 form (`+5.000000E+00`), so the reply
/// is read as an integer first and then as a float that must be a whole number
/// in `u32` range.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterCodec;

impl WireCodec<u32> for RegisterCodec {
    fn format(&self, value: &u32) -> SyncResult<String> {
        Ok(value.to_string())
    }

    fn parse(&self, attribute: &str, reply: Option<&str>, fallback: Option<&u32>) -> SyncResult<u32> {
        let Some(text) = reply else {
            return fallback.copied().ok_or_else(|| invalid(attribute, reply));
        };
        let text = text.trim();
        if let Ok(bits) = text.parse::<u32>() {
            return Ok(bits);
        }
        text.parse::<f64>()
            .ok()
            .filter(|n| n.is_finite() && n.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(n))
            .map(|n| n as u32)
            .ok_or_else(|| invalid(attribute, reply))
    }
}
