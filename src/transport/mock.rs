//! Scripted transport for tests and offline development.
//!
//! `MockTransport` answers queries from a reply table, can echo a written value
//! back through a linked query (so write-then-query round trips behave like a
//! real instrument), injects one-shot failures, and logs every call so tests can
//! assert that a short-circuit issued no I/O at all.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::ScpiTransport;
use crate::error::{TransportError, TransportErrorKind};

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `send_command` with the exact text.
    Command(String),
    /// `send_query` with the exact text.
    Query(String),
}

/// In-memory [`ScpiTransport`].
///
/// # Example
///
/// ```
/// use scpi_sync::transport::{MockTransport, ScpiTransport};
///
/// # tokio_test::block_on(async {
/// let mock = MockTransport::new()
///     .with_reply("OUTP:MODE?", "NORM")
///     .with_link("OUTP:MODE", "OUTP:MODE?");
///
/// mock.send_command("OUTP:MODE HIMP").await.unwrap();
/// assert_eq!(mock.send_query("OUTP:MODE?").await.unwrap(), "HIMP");
/// # })
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<String, String>>,
    links: Mutex<HashMap<String, String>>,
    call_log: Mutex<Vec<MockCall>>,
    fail_next: AtomicBool,
}

fn key(text: &str) -> String {
    text.trim().to_ascii_uppercase()
}

impl MockTransport {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set_reply`](Self::set_reply).
    pub fn with_reply(self, query: &str, reply: &str) -> Self {
        self.set_reply(query, reply);
        self
    }

    /// Builder form of [`link`](Self::link).
    pub fn with_link(self, write_header: &str, query: &str) -> Self {
        self.link(write_header, query);
        self
    }

    /// Answer `query` with `reply` from now on.
    pub fn set_reply(&self, query: &str, reply: &str) {
        self.replies.lock().insert(key(query), reply.to_string());
    }

    /// Commands whose header is `write_header` update the reply to `query` with
    /// their argument text.
    pub fn link(&self, write_header: &str, query: &str) {
        self.links.lock().insert(key(write_header), key(query));
    }

    /// Fail the next call (command or query) with a `Rejected` error.
    pub fn trigger_failure(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().clone()
    }

    /// Text of every command sent.
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Command(text) => Some(text),
                MockCall::Query(_) => None,
            })
            .collect()
    }

    /// Text of every query sent.
    pub fn queries(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Query(text) => Some(text),
                MockCall::Command(_) => None,
            })
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.call_log.lock().clear();
    }

    fn check_failure(&self, what: &str) -> Result<(), TransportError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(TransportError::new(
                TransportErrorKind::Rejected,
                format!("Mock failure on: {}", what),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ScpiTransport for MockTransport {
    async fn send_command(&self, command: &str) -> Result<(), TransportError> {
        self.call_log.lock().push(MockCall::Command(command.to_string()));
        self.check_failure(command)?;
        tracing::debug!(command, "mock SCPI write");

        let trimmed = command.trim();
        let (header, argument) = trimmed
            .split_once(char::is_whitespace)
            .unwrap_or((trimmed, ""));
        let linked = self.links.lock().get(&key(header)).cloned();
        match linked {
            Some(query) => {
                self.replies.lock().insert(query, argument.trim().to_string());
            }
            None => tracing::debug!(command, "mock command has no linked query"),
        }
        Ok(())
    }

    async fn send_query(&self, query: &str) -> Result<String, TransportError> {
        self.call_log.lock().push(MockCall::Query(query.to_string()));
        self.check_failure(query)?;

        let reply = self.replies.lock().get(&key(query)).cloned();
        match reply {
            Some(reply) => {
                tracing::debug!(query, reply = %reply, "mock SCPI response");
                Ok(reply)
            }
            None => Err(TransportError::new(
                TransportErrorKind::Rejected,
                format!("Unknown mock query: {}", query),
            )),
        }
    }
}
