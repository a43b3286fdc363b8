//! # scpi_sync
//!
//! Typed, cached SCPI instrument state.
//!
//! Instrument subsystems expose enumerated and bit-field attributes (output mode,
//! active compensation standards, slot interlocks) that travel over the wire as
//! short tokens such as `HIMP` or comma records such as `OPEN,LOAD`. This crate
//! keeps a host-side cache of those attributes in sync with the device.
//!
//! ## Crate Structure
//!
//! - **`token_table`**: `WireEnum` and `TokenTable`, the member ↔ token mapping
//!   declared with the `wire_enum!` macro.
//! - **`flags`**: `FlagSet` algebra and the composite record codec.
//! - **`cached`**: `CachedState`, a last-known value with change detection.
//! - **`codec`**: `WireCodec` implementations for enums, flag sets, booleans and
//!   numbers.
//! - **`port`**: `StateSyncPort`, the write / query / apply round trip for one
//!   attribute.
//! - **`chain`**: `SlotChain`, dependency-ordered lazy refresh of slot facts.
//! - **`transport`**: the `ScpiTransport` boundary with TCP and mock
//!   implementations.
//! - **`notify`**: change notification sinks.
//! - **`subsystems`**: reference subsystems wired from an instrument profile.
//! - **`config`**: `InstrumentProfile`, command templates as configuration.
//! - **`logging`**: tracing subscriber setup.
//! - **`error`**: `SyncError` and friends.

pub mod cached;
pub mod chain;
pub mod codec;
pub mod config;
pub mod error;
pub mod flags;
pub mod logging;
pub mod notify;
pub mod port;
pub mod subsystems;
pub mod token_table;
pub mod transport;

pub use cached::CachedState;
pub use chain::{Knowledge, SlotChain, SlotCommands};
pub use codec::{BoolCodec, EnumCodec, FlagsCodec, NumericCodec, RegisterCodec, WireCodec};
pub use error::{ParseError, SyncError, SyncResult, TransportError, TransportErrorKind};
pub use flags::{Decoded, FlagSet};
pub use port::{AttributeCommands, StateSyncPort, SyncContext};
pub use token_table::{TokenTable, WireEnum};

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::OnceCell;
}
