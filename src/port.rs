//! Write/query round trips for one device attribute.
//!
//! Every subsystem attribute is a [`StateSyncPort`]: a cached value, the command
//! templates that move it over the wire, and a [`WireCodec`] that formats and
//! parses it. Three primitives are exposed:
//!
//! - [`write`](StateSyncPort::write) masks the value, sends it, and caches the
//!   masked value optimistically. The device echo is not consulted.
//! - [`query`](StateSyncPort::query) asks the device and caches the decoded reply.
//! - [`apply`](StateSyncPort::apply) writes then queries; only its return value
//!   reflects confirmed device state.
//!
//! An empty command template marks that direction as unsupported: the port
//! returns the cached (or default) value and never touches the transport.
//!
//! # Command templates
//!
//! Templates are rendered with `strfmt`. `{value}` is replaced by the formatted
//! value and any variable registered with [`with_var`](StateSyncPort::with_var)
//! (e.g. `{slot}`) is available too. A write template without `{value}` gets the
//! value appended after a space, so `"OUTP:MODE"` writes `"OUTP:MODE HIMP"`.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cached::CachedState;
use crate::codec::WireCodec;
use crate::error::SyncResult;
use crate::notify::{ChangeSink, NullSink};
use crate::transport::ScpiTransport;

/// Placeholder for the formatted value in a write template.
pub const VALUE_PLACEHOLDER: &str = "{value}";

/// Write and query templates for one attribute. Empty means unsupported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeCommands {
    /// Write template, e.g. `"SENS:CORR:COLL {value}"`.
    #[serde(default)]
    pub write: String,
    /// Query template, e.g. `"SENS:CORR:COLL?"`.
    #[serde(default)]
    pub query: String,
}

impl AttributeCommands {
    /// Attribute supporting both directions.
    pub fn new(write: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            write: write.into(),
            query: query.into(),
        }
    }

    /// Read-only attribute.
    pub fn query_only(query: impl Into<String>) -> Self {
        Self::new("", query)
    }

    /// True if a write command is configured.
    pub fn supports_write(&self) -> bool {
        !self.write.trim().is_empty()
    }

    /// True if a query command is configured.
    pub fn supports_query(&self) -> bool {
        !self.query.trim().is_empty()
    }
}

/// Transport and notification sink shared by every port of one subsystem.
#[derive(Clone)]
pub struct SyncContext {
    transport: Arc<dyn ScpiTransport>,
    sink: Arc<dyn ChangeSink>,
}

impl Debug for SyncContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncContext").finish_non_exhaustive()
    }
}

impl SyncContext {
    /// Context publishing changes to `sink`.
    pub fn new(transport: Arc<dyn ScpiTransport>, sink: Arc<dyn ChangeSink>) -> Self {
        Self { transport, sink }
    }

    /// Context that discards change notifications.
    pub fn silent(transport: Arc<dyn ScpiTransport>) -> Self {
        Self::new(transport, Arc::new(NullSink))
    }

    /// The shared transport.
    pub fn transport(&self) -> &Arc<dyn ScpiTransport> {
        &self.transport
    }

    /// The shared notification sink.
    pub fn sink(&self) -> &Arc<dyn ChangeSink> {
        &self.sink
    }
}

/// Render a command template.
///
/// `value` is substituted for `{value}` (or appended when the template has no
/// such placeholder); `vars` supplies any other placeholders.
pub fn render_command(
    template: &str,
    value: Option<&str>,
    vars: &HashMap<String, String>,
) -> SyncResult<String> {
    let template = template.trim();
    let has_placeholder = template.contains(VALUE_PLACEHOLDER);

    let rendered = if template.contains('{') {
        let mut context = vars.clone();
        if let Some(value) = value {
            context.insert("value".to_string(), value.to_string());
        }
        strfmt::strfmt(template, &context)?
    } else {
        template.to_string()
    };

    Ok(match value {
        Some(value) if !has_placeholder => format!("{} {}", rendered, value),
        _ => rendered,
    })
}

/// Cached, codec-driven device attribute.
pub struct StateSyncPort<T, C> {
    name: String,
    commands: AttributeCommands,
    vars: HashMap<String, String>,
    codec: C,
    default: T,
    state: CachedState<T>,
    ctx: SyncContext,
}

impl<T: Debug, C> Debug for StateSyncPort<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSyncPort")
            .field("name", &self.name)
            .field("commands", &self.commands)
            .field("default", &self.default)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<T, C> StateSyncPort<T, C>
where
    T: Clone + PartialEq + Debug + Send + Sync,
    C: WireCodec<T>,
{
    /// Create a port with an unknown cached value.
    pub fn new(
        name: impl Into<String>,
        commands: AttributeCommands,
        codec: C,
        default: T,
        ctx: SyncContext,
    ) -> Self {
        Self {
            name: name.into(),
            commands,
            vars: HashMap::new(),
            codec,
            default,
            state: CachedState::unknown(),
            ctx,
        }
    }

    /// Register a template variable such as `slot`.
    pub fn with_var(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.vars.insert(key.into(), value.to_string());
        self
    }

    /// Attribute name used in notifications and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured command templates.
    pub fn commands(&self) -> &AttributeCommands {
        &self.commands
    }

    /// The codec in use.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Cached value, `None` while unknown.
    pub fn cached(&self) -> Option<&T> {
        self.state.get()
    }

    /// Cached value, or the default while unknown.
    pub fn value(&self) -> T {
        self.state.value_or(self.default.clone())
    }

    /// The underlying cache.
    pub fn state(&self) -> &CachedState<T> {
        &self.state
    }

    /// Mask, send, and optimistically cache `value`.
    ///
    /// Returns the cached value afterwards. With no write command configured this
    /// is a no-op returning the current value.
    ///
    /// # Errors
    ///
    /// Formatting, template, or transport failure. The cache is untouched on error.
    #[tracing::instrument(level = "debug", skip(self, value), fields(attribute = %self.name))]
    pub async fn write(&mut self, value: T) -> SyncResult<T> {
        if !self.commands.supports_write() {
            tracing::debug!("write unsupported, keeping cached value");
            return Ok(self.value());
        }

        let masked = self.codec.mask(value);
        let text = self.codec.format(&masked)?;
        let command = render_command(&self.commands.write, Some(&text), &self.vars)?;
        self.ctx.transport.send_command(&command).await?;

        self.store(masked);
        Ok(self.value())
    }

    /// Query the device and cache the decoded reply.
    ///
    /// A nil reply is handed to the codec as absent, which falls back to the
    /// cached value for scalars. With no query command configured this returns the
    /// cached (or default) value without any I/O.
    ///
    /// # Errors
    ///
    /// Template, transport, or parse failure. The cache is untouched on error.
    #[tracing::instrument(level = "debug", skip(self), fields(attribute = %self.name))]
    pub async fn query(&mut self) -> SyncResult<T> {
        if !self.commands.supports_query() {
            tracing::debug!("query unsupported, returning cached value");
            return Ok(self.value());
        }

        let command = render_command(&self.commands.query, None, &self.vars)?;
        let reply = self.ctx.transport.send_query(&command).await?;
        let reply = (!self.ctx.transport.is_nil_reply(&reply)).then_some(reply.as_str());

        let parsed = self.codec.parse(&self.name, reply, self.state.get())?;
        self.store(parsed);
        Ok(self.value())
    }

    /// Write `value`, then query the device.
    ///
    /// The result is the device-confirmed value whenever the attribute is
    /// queryable; for write-only attributes it is the optimistic value.
    ///
    /// # Errors
    ///
    /// Any error from [`write`](Self::write) or [`query`](Self::query).
    pub async fn apply(&mut self, value: T) -> SyncResult<T> {
        let written = self.write(value).await?;
        if !self.commands.supports_query() {
            return Ok(written);
        }
        self.query().await
    }

    /// Cache `value` without any I/O. Returns `true` if it changed.
    pub fn assume(&mut self, value: T) -> bool {
        self.store(value)
    }

    /// Return the cache to the default value. Returns `true` if it changed.
    pub fn reset_to_default(&mut self) -> bool {
        self.store(self.default.clone())
    }

    /// Forget the cached value. Returns `true` if one was known.
    pub fn invalidate(&mut self) -> bool {
        let changed = self.state.invalidate();
        if changed {
            self.ctx.sink.on_attribute_changed(&self.name);
        }
        changed
    }

    fn store(&mut self, value: T) -> bool {
        let changed = self.state.set(value);
        if changed {
            tracing::debug!(attribute = %self.name, value = ?self.state.get(), "cached value changed");
            self.ctx.sink.on_attribute_changed(&self.name);
        } else {
            tracing::trace!(attribute = %self.name, "cached value unchanged");
        }
        changed
    }
}
