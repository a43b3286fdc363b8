//! Compensation subsystem: which correction standards are active.
//!
//! The active set is a composite record such as `OPEN,LOAD`. Instruments differ
//! in which standards they implement, so every write is filtered through the
//! profile's supported mask before it is encoded.

use crate::codec::FlagsCodec;
use crate::config::CompensationProfile;
use crate::error::{SyncError, SyncResult};
use crate::flags::FlagSet;
use crate::port::{StateSyncPort, SyncContext};
use crate::token_table::WireEnum;

crate::wire_enum! {
    /// Correction standards.
    pub enum CompensationType {
        /// No compensation.
        None = 0 => "None (NONE)",
        /// Open-circuit compensation.
        OpenCircuit = 1 => "Open circuit (OPEN)",
        /// Short-circuit compensation.
        ShortCircuit = 2 => "Short circuit (SHOR)",
        /// Load compensation.
        Load = 4 => "Load (LOAD)",
    }
}

/// Resolve a list of wire tokens to a supported mask. An empty list means no
/// restriction.
///
/// # Errors
///
/// [`SyncError::Configuration`] naming the first token that does not resolve.
pub fn supported_mask(tokens: &[String]) -> SyncResult<Option<FlagSet<CompensationType>>> {
    if tokens.is_empty() {
        return Ok(None);
    }
    let table = CompensationType::token_table()?;
    tokens
        .iter()
        .map(|token| {
            table.from_token(token).map_err(|_| {
                SyncError::Configuration(format!(
                    "Unsupported compensation token '{}' in profile",
                    token
                ))
            })
        })
        .collect::<SyncResult<FlagSet<_>>>()
        .map(Some)
}

/// Active compensation types.
#[derive(Debug)]
pub struct CompensationSubsystem {
    types: StateSyncPort<FlagSet<CompensationType>, FlagsCodec<CompensationType>>,
}

impl CompensationSubsystem {
    /// Build from profile commands and supported tokens.
    pub fn new(profile: &CompensationProfile, ctx: &SyncContext) -> SyncResult<Self> {
        let mut codec = FlagsCodec::new()?;
        if let Some(supported) = supported_mask(&profile.supported)? {
            codec = codec.with_supported(supported);
        }
        Ok(Self {
            types: StateSyncPort::new(
                "compensation.types",
                profile.types.clone(),
                codec,
                FlagSet::empty(),
                ctx.clone(),
            ),
        })
    }

    /// The composite types port.
    pub fn types(
        &mut self,
    ) -> &mut StateSyncPort<FlagSet<CompensationType>, FlagsCodec<CompensationType>> {
        &mut self.types
    }

    /// True if `kind` is in the cached active set. Queries first if unknown.
    pub async fn is_active(&mut self, kind: CompensationType) -> SyncResult<bool> {
        Ok(self.active().await?.contains(kind))
    }

    /// Add `kind` to the active set and confirm with the device.
    pub async fn enable(
        &mut self,
        kind: CompensationType,
    ) -> SyncResult<FlagSet<CompensationType>> {
        let mut next = self.active().await?;
        next.insert(kind);
        self.types.apply(next).await
    }

    /// Remove `kind` from the active set and confirm with the device.
    pub async fn disable(
        &mut self,
        kind: CompensationType,
    ) -> SyncResult<FlagSet<CompensationType>> {
        let mut next = self.active().await?;
        next.remove(kind);
        self.types.apply(next).await
    }

    /// Return to the empty set without I/O.
    pub fn reset_to_defaults(&mut self) {
        self.types.reset_to_default();
    }

    /// The active set, queried from the device while the cache is unknown.
    async fn active(&mut self) -> SyncResult<FlagSet<CompensationType>> {
        match self.types.cached() {
            Some(active) => Ok(*active),
            None => self.types.query().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::AttributeCommands;
    use crate::transport::MockTransport;
    use std::sync::Arc;

    fn profile(supported: &[&str]) -> CompensationProfile {
        CompensationProfile {
            types: AttributeCommands::new("CORR:COLL {value}", "CORR:COLL?"),
            supported: supported.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_supported_mask() {
        assert_eq!(supported_mask(&[]).unwrap(), None);

        let mask = supported_mask(&["OPEN".into(), "load".into()]).unwrap().unwrap();
        assert_eq!(mask.bits(), 5);

        let err = supported_mask(&["THRU".into()]).unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_enable_filters_through_supported_mask() {
        let mock = Arc::new(
            MockTransport::new()
                .with_reply("CORR:COLL?", "OPEN")
                .with_link("CORR:COLL", "CORR:COLL?"),
        );
        let ctx = SyncContext::silent(mock.clone());
        let mut comp = CompensationSubsystem::new(&profile(&["OPEN", "LOAD"]), &ctx).unwrap();

        assert!(comp.is_active(CompensationType::OpenCircuit).await.unwrap());

        let active = comp.enable(CompensationType::ShortCircuit).await.unwrap();
        assert_eq!(active, FlagSet::from(CompensationType::OpenCircuit));

        let active = comp.enable(CompensationType::Load).await.unwrap();
        assert_eq!(active.bits(), 5);
        assert_eq!(
            mock.commands(),
            vec!["CORR:COLL OPEN".to_string(), "CORR:COLL OPEN,LOAD".to_string()]
        );

        let active = comp.disable(CompensationType::OpenCircuit).await.unwrap();
        assert_eq!(active, FlagSet::from(CompensationType::Load));
    }

    #[tokio::test]
    async fn test_enable_keeps_device_standards_when_cache_unknown() {
        let mock = Arc::new(
            MockTransport::new()
                .with_reply("CORR:COLL?", "OPEN")
                .with_link("CORR:COLL", "CORR:COLL?"),
        );
        let ctx = SyncContext::silent(mock.clone());
        let mut comp = CompensationSubsystem::new(&profile(&[]), &ctx).unwrap();

        let active = comp.enable(CompensationType::Load).await.unwrap();

        assert_eq!(active.bits(), 5);
        assert_eq!(mock.commands(), vec!["CORR:COLL OPEN,LOAD".to_string()]);
        assert_eq!(mock.queries().len(), 2);
    }

    #[tokio::test]
    async fn test_disable_keeps_device_standards_when_cache_unknown() {
        let mock = Arc::new(
            MockTransport::new()
                .with_reply("CORR:COLL?", "OPEN,SHOR,LOAD")
                .with_link("CORR:COLL", "CORR:COLL?"),
        );
        let ctx = SyncContext::silent(mock.clone());
        let mut comp = CompensationSubsystem::new(&profile(&[]), &ctx).unwrap();

        let active = comp.disable(CompensationType::ShortCircuit).await.unwrap();

        assert_eq!(active.bits(), 5);
        assert_eq!(mock.commands(), vec!["CORR:COLL OPEN,LOAD".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_set_reads_as_none() {
        let mock = Arc::new(MockTransport::new().with_reply("CORR:COLL?", "NONE"));
        let ctx = SyncContext::silent(mock);
        let mut comp = CompensationSubsystem::new(&profile(&[]), &ctx).unwrap();

        assert!(comp.is_active(CompensationType::None).await.unwrap());
        assert!(!comp.is_active(CompensationType::Load).await.unwrap());
    }
}
