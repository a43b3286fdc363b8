//! Output subsystem: output-off mode and on/off state.

use crate::codec::{BoolCodec, EnumCodec};
use crate::config::OutputProfile;
use crate::error::SyncResult;
use crate::port::{StateSyncPort, SyncContext};

crate::wire_enum! {
    /// Output-off behaviour.
    pub enum OutputMode {
        /// Normal output-off state.
        Normal = 0 => "Normal (NORM)",
        /// Output relay open.
        HighImpedance = 1 => "High impedance (HIMP)",
        /// Output held at zero.
        Zero = 2 => "Zero (ZERO)",
        /// Guarded output.
        Guard = 3 => "Guard (GUAR)",
    }
}

/// Output mode and state attributes.
#[derive(Debug)]
pub struct OutputSubsystem {
    mode: StateSyncPort<OutputMode, EnumCodec<OutputMode>>,
    state: StateSyncPort<bool, BoolCodec>,
}

impl OutputSubsystem {
    /// Build from profile commands.
    pub fn new(profile: &OutputProfile, ctx: &SyncContext) -> SyncResult<Self> {
        Ok(Self {
            mode: StateSyncPort::new(
                "output.mode",
                profile.mode.clone(),
                EnumCodec::new()?,
                OutputMode::Normal,
                ctx.clone(),
            ),
            state: StateSyncPort::new(
                "output.state",
                profile.state.clone(),
                BoolCodec,
                false,
                ctx.clone(),
            ),
        })
    }

    /// Output-off mode port.
    pub fn mode(&mut self) -> &mut StateSyncPort<OutputMode, EnumCodec<OutputMode>> {
        &mut self.mode
    }

    /// Output on/off port.
    pub fn state(&mut self) -> &mut StateSyncPort<bool, BoolCodec> {
        &mut self.state
    }

    /// Switch the output and confirm with the device.
    pub async fn enable(&mut self, on: bool) -> SyncResult<bool> {
        self.state.apply(on).await
    }

    /// Return both attributes to their defaults without I/O.
    pub fn reset_to_defaults(&mut self) {
        self.mode.reset_to_default();
        self.state.reset_to_default();
    }
}
