//! Line-oriented SCPI transports.
//!
//! The engine only needs three things from the wire: send a command, send a
//! query and get a line back, and recognise a "nil" reply. [`ScpiTransport`]
//! abstracts that so ports work identically over TCP or against a scripted mock.

use async_trait::async_trait;

use crate::error::TransportError;

pub mod mock;
pub mod tcp;

pub use mock::{MockCall, MockTransport};
pub use tcp::TcpTransport;

/// Transport collaborator for SCPI round trips.
///
/// Implementations serialise their own I/O; the engine never issues two
/// requests concurrently on one subsystem.
#[async_trait]
pub trait ScpiTransport: Send + Sync {
    /// Send a command without expecting a response.
    async fn send_command(&self, command: &str) -> Result<(), TransportError>;

    /// Send a query and return the response line.
    async fn send_query(&self, query: &str) -> Result<String, TransportError>;

    /// True if `reply` carries no value.
    fn is_nil_reply(&self, reply: &str) -> bool {
        is_nil(reply)
    }
}

/// Default nil-reply rule: blank, or `nil` (optionally quoted) in any case.
pub fn is_nil(reply: &str) -> bool {
    let trimmed = reply.trim().trim_matches('"');
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nil")
}
