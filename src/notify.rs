//! Change notification sinks.
//!
//! The engine reports *that* an attribute changed; delivery is the host's
//! business. [`BroadcastSink`] fans notifications out to any number of async
//! subscribers over a `tokio::sync::broadcast` channel, the same mechanism the
//! DAQ drivers use to publish measurements.

use tokio::sync::broadcast;

/// Default capacity of a [`BroadcastSink`] channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Receives one call per effective attribute change.
pub trait ChangeSink: Send + Sync {
    /// `attribute` changed value (including to or from unknown).
    fn on_attribute_changed(&self, attribute: &str);
}

/// Sink that discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ChangeSink for NullSink {
    fn on_attribute_changed(&self, _attribute: &str) {}
}

/// Notification payload published by [`BroadcastSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChanged {
    /// Name of the attribute whose cached value changed.
    pub attribute: String,
}

/// Sink publishing [`AttributeChanged`] on a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<AttributeChanged>,
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl BroadcastSink {
    /// Create a sink with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to future notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AttributeChanged> {
        self.sender.subscribe()
    }
}

impl ChangeSink for BroadcastSink {
    fn on_attribute_changed(&self, attribute: &str) {
        let event = AttributeChanged {
            attribute: attribute.to_string(),
        };
        if self.sender.send(event).is_err() {
            tracing::trace!(attribute, "no subscribers for change notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let sink = BroadcastSink::new(8);
        let mut first = sink.subscribe();
        let mut second = sink.subscribe();

        sink.on_attribute_changed("output.mode");

        assert_eq!(first.recv().await.unwrap().attribute, "output.mode");
        assert_eq!(second.recv().await.unwrap().attribute, "output.mode");
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let sink = BroadcastSink::default();
        sink.on_attribute_changed("slot1.exists");
        NullSink.on_attribute_changed("ignored");
    }
}
