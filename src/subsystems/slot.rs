//! Slot subsystem: one [`SlotChain`] per configured slot.

use crate::chain::{SlotChain, SlotCommands};
use crate::config::SlotProfile;
use crate::error::{SyncError, SyncResult};
use crate::port::SyncContext;

/// Every slot of a mainframe, numbered from 1.
#[derive(Debug)]
pub struct SlotSubsystem {
    slots: Vec<SlotChain>,
}

impl SlotSubsystem {
    /// Build `count` chains sharing `commands`.
    pub fn new(count: u32, commands: &SlotCommands, ctx: &SyncContext) -> Self {
        Self {
            slots: (1..=count).map(|n| SlotChain::new(n, commands, ctx)).collect(),
        }
    }

    /// Build from a profile section.
    pub fn from_profile(profile: &SlotProfile, ctx: &SyncContext) -> Self {
        Self::new(profile.count, &profile.commands, ctx)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if no slots are configured.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Chain for `slot`, if configured.
    pub fn slot(&mut self, slot: u32) -> Option<&mut SlotChain> {
        let index = usize::try_from(slot).ok()?.checked_sub(1)?;
        self.slots.get_mut(index)
    }

    /// Whether `slot` holds a module.
    pub async fn exists(&mut self, slot: u32) -> SyncResult<bool> {
        self.require(slot)?.query_exists().await
    }

    /// Interlock bitmask of `slot`.
    pub async fn interlocks_state(&mut self, slot: u32) -> SyncResult<u32> {
        self.require(slot)?.query_interlocks_state().await
    }

    /// True if every bit of `mask` is engaged on `slot`.
    pub async fn is_interlock_engaged(&mut self, slot: u32, mask: u32) -> SyncResult<bool> {
        self.require(slot)?.is_interlock_engaged(mask).await
    }

    /// Slots on which every bit of `mask` is engaged, in slot order.
    pub async fn engaged_slots(&mut self, mask: u32) -> SyncResult<Vec<u32>> {
        let mut engaged = Vec::new();
        for chain in &mut self.slots {
            if chain.is_interlock_engaged(mask).await? {
                engaged.push(chain.slot());
            }
        }
        Ok(engaged)
    }

    /// Forget everything known about every slot.
    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(SlotChain::reset);
    }

    fn require(&mut self, slot: u32) -> SyncResult<&mut SlotChain> {
        let count = self.slots.len();
        self.slot(slot).ok_or_else(|| {
            SyncError::Configuration(format!("Slot {} not configured (have {})", slot, count))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use std::sync::Arc;

    fn commands() -> SlotCommands {
        SlotCommands {
            exists: "SYST:SLOT{slot}:EXIS?".into(),
            supports_interlock: "SYST:SLOT{slot}:INT:SUPP?".into(),
            interlock_state: "SYST:SLOT{slot}:INT?".into(),
        }
    }

    #[tokio::test]
    async fn test_engaged_slots() {
        let mock = Arc::new(
            MockTransport::new()
                .with_reply("SYST:SLOT1:EXIS?", "1")
                .with_reply("SYST:SLOT1:INT:SUPP?", "1")
                .with_reply("SYST:SLOT1:INT?", "3")
                .with_reply("SYST:SLOT2:EXIS?", "1")
                .with_reply("SYST:SLOT2:INT:SUPP?", "1")
                .with_reply("SYST:SLOT2:INT?", "0")
                .with_reply("SYST:SLOT3:EXIS?", "0"),
        );
        let mut slots = SlotSubsystem::new(3, &commands(), &SyncContext::silent(mock.clone()));

        assert_eq!(slots.engaged_slots(2).await.unwrap(), vec![1, 3]);
        assert_eq!(mock.queries().len(), 7);
        assert_eq!(slots.interlocks_state(1).await.unwrap(), 3);
        assert!(!slots.exists(3).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_slot_is_an_error() {
        let mock = Arc::new(MockTransport::new());
        let mut slots = SlotSubsystem::new(2, &commands(), &SyncContext::silent(mock.clone()));

        assert!(slots.slot(0).is_none());
        assert!(slots.slot(3).is_none());
        assert!(matches!(
            slots.is_interlock_engaged(5, 1).await,
            Err(SyncError::Configuration(_))
        ));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reset_clears_every_slot() {
        let mock = Arc::new(
            MockTransport::new()
                .with_reply("SYST:SLOT1:EXIS?", "0")
                .with_reply("SYST:SLOT2:EXIS?", "0"),
        );
        let mut slots = SlotSubsystem::new(2, &commands(), &SyncContext::silent(mock.clone()));

        slots.engaged_slots(1).await.unwrap();
        slots.reset();
        slots.engaged_slots(1).await.unwrap();
        assert_eq!(mock.queries().len(), 4);
    }
}
