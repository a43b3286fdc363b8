//! Reference subsystems wired on top of the synchronization engine.
//!
//! Each subsystem is a handful of [`StateSyncPort`](crate::port::StateSyncPort)s
//! (or [`SlotChain`](crate::chain::SlotChain)s) built from an
//! [`InstrumentProfile`] section. [`Instrument`] bundles them over one shared
//! [`SyncContext`].

pub mod compensation;
pub mod output;
pub mod slot;

pub use compensation::{CompensationSubsystem, CompensationType};
pub use output::{OutputMode, OutputSubsystem};
pub use slot::SlotSubsystem;

use crate::config::InstrumentProfile;
use crate::error::SyncResult;
use crate::port::SyncContext;

/// Every reference subsystem of one instrument session.
#[derive(Debug)]
pub struct Instrument {
    name: String,
    /// Output mode and state.
    pub output: OutputSubsystem,
    /// Active compensation types.
    pub compensation: CompensationSubsystem,
    /// Slots and interlocks.
    pub slots: SlotSubsystem,
}

impl Instrument {
    /// Validate `profile` and build every subsystem over `ctx`.
    ///
    /// # Errors
    ///
    /// [`SyncError::Configuration`](crate::error::SyncError::Configuration) if the
    /// profile is invalid or a token table cannot be built.
    pub fn from_profile(profile: &InstrumentProfile, ctx: SyncContext) -> SyncResult<Self> {
        profile.validate()?;
        let instrument = Self {
            name: profile.name.clone(),
            output: OutputSubsystem::new(&profile.output, &ctx)?,
            compensation: CompensationSubsystem::new(&profile.compensation, &ctx)?,
            slots: SlotSubsystem::from_profile(&profile.slots, &ctx),
        };
        tracing::info!(
            instrument = %instrument.name,
            slots = instrument.slots.len(),
            "instrument subsystems ready"
        );
        Ok(instrument)
    }

    /// Profile name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return cached state to defaults, and slot facts to unknown, without I/O.
    pub fn reset_to_defaults(&mut self) {
        self.output.reset_to_defaults();
        self.compensation.reset_to_defaults();
        self.slots.reset();
    }
}
