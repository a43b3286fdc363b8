//! Dependency-ordered lazy refresh for slot and interlock state.
//!
//! A slot carries three facts, each only meaningful once its predecessor holds:
//!
//! ```text
//! exists ──true──▶ supports_interlock ──true──▶ interlock_state (bitmask)
//!    │                    │
//!  false                false
//!    ▼                    ▼
//! supports_interlock = false, interlock_state = 0   (no query issued)
//! ```
//!
//! Querying a fact first resolves any unknown precondition. The moment a
//! precondition resolves false, the dependent fact is set to its default without
//! touching the transport. Each fact is a [`StateSyncPort`], so caching,
//! notification and the empty-command convention come for free.

use serde::{Deserialize, Serialize};

use crate::codec::{BoolCodec, RegisterCodec};
use crate::error::SyncResult;
use crate::port::{AttributeCommands, StateSyncPort, SyncContext};

/// Resolution state of a boolean fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Knowledge {
    /// Not yet resolved.
    Unknown,
    /// Resolved false.
    No,
    /// Resolved true.
    Yes,
}

impl From<Option<&bool>> for Knowledge {
    fn from(value: Option<&bool>) -> Self {
        match value {
            None => Knowledge::Unknown,
            Some(false) => Knowledge::No,
            Some(true) => Knowledge::Yes,
        }
    }
}

/// Query templates for the slot facts. `{slot}` expands to the slot number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCommands {
    /// Does the slot hold a module, e.g. `"SYST:SLOT{slot}:EXIS?"`.
    #[serde(default)]
    pub exists: String,
    /// Does the module support interlocks.
    #[serde(default)]
    pub supports_interlock: String,
    /// Interlock bitmask.
    #[serde(default)]
    pub interlock_state: String,
}

/// The three dependent facts of one slot.
#[derive(Debug)]
pub struct SlotChain {
    slot: u32,
    exists: StateSyncPort<bool, BoolCodec>,
    supports_interlock: StateSyncPort<bool, BoolCodec>,
    interlock_state: StateSyncPort<u32, RegisterCodec>,
}

impl SlotChain {
    /// Create a chain with every fact unknown.
    pub fn new(slot: u32, commands: &SlotCommands, ctx: &SyncContext) -> Self {
        let port = |fact: &str, query: &str| {
            StateSyncPort::new(
                format!("slot{}.{}", slot, fact),
                AttributeCommands::query_only(query),
                BoolCodec,
                false,
                ctx.clone(),
            )
            .with_var("slot", slot)
        };

        Self {
            slot,
            exists: port("exists", &commands.exists),
            supports_interlock: port("supports_interlock", &commands.supports_interlock),
            interlock_state: StateSyncPort::new(
                format!("slot{}.interlock_state", slot),
                AttributeCommands::query_only(commands.interlock_state.as_str()),
                RegisterCodec,
                0,
                ctx.clone(),
            )
            .with_var("slot", slot),
        }
    }

    /// Slot number.
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Cached existence.
    pub fn exists(&self) -> Knowledge {
        self.exists.cached().into()
    }

    /// Cached interlock support.
    pub fn supports_interlock(&self) -> Knowledge {
        self.supports_interlock.cached().into()
    }

    /// Cached interlock bitmask, `None` while unknown.
    pub fn interlock_state(&self) -> Option<u32> {
        self.interlock_state.cached().copied()
    }

    /// Query whether the slot holds a module.
    pub async fn query_exists(&mut self) -> SyncResult<bool> {
        let exists = self.exists.query().await?;
        self.exists.assume(exists);
        if exists {
            tracing::info!(slot = self.slot, "slot present");
        }
        Ok(exists)
    }

    /// Query interlock support, resolving existence first if needed.
    pub async fn query_supports_interlock(&mut self) -> SyncResult<bool> {
        if !self.resolve_exists().await? {
            self.supports_interlock.assume(false);
            return Ok(false);
        }
        let supported = self.supports_interlock.query().await?;
        self.supports_interlock.assume(supported);
        Ok(supported)
    }

    /// Query the interlock bitmask, resolving its preconditions first if needed.
    /// Yields `0` without I/O when the slot is empty or has no interlocks.
    pub async fn query_interlocks_state(&mut self) -> SyncResult<u32> {
        if !self.resolve_supports_interlock().await? {
            self.interlock_state.assume(0);
            return Ok(0);
        }
        let state = self.interlock_state.query().await?;
        self.interlock_state.assume(state);
        Ok(state)
    }

    /// True if every bit of `mask` is engaged.
    ///
    /// Resolves the whole chain on first use. A slot without interlock support
    /// (including an empty slot) reports every interlock as engaged.
    pub async fn is_interlock_engaged(&mut self, mask: u32) -> SyncResult<bool> {
        if self.interlock_state().is_none() {
            self.query_interlocks_state().await?;
        }
        if self.supports_interlock() == Knowledge::No {
            return Ok(true);
        }
        let state = self.interlock_state.value();
        Ok(state & mask == mask)
    }

    /// Return every fact to unknown so the next access re-queries.
    pub fn reset(&mut self) {
        self.exists.invalidate();
        self.supports_interlock.invalidate();
        self.interlock_state.invalidate();
    }

    async fn resolve_exists(&mut self) -> SyncResult<bool> {
        match self.exists() {
            Knowledge::Unknown => self.query_exists().await,
            known => Ok(known == Knowledge::Yes),
        }
    }

    async fn resolve_supports_interlock(&mut self) -> SyncResult<bool> {
        match self.supports_interlock() {
            Knowledge::Unknown => self.query_supports_interlock().await,
            known => Ok(known == Knowledge::Yes),
        }
    }
}
