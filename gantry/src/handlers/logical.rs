use anyhow::{Result, bail};
use smol_str::SmolStr;

use crate::core::{Digest, TargetFingerprint, TargetId};
use crate::handlers::{CookedTarget, TargetHandler};

/// Handler for virtual targets with no filesystem presence.
///
/// Identifiers end with `@`. The fingerprint is derived from the identifier
/// alone and is therefore stable: once a producing rule has run, the target
/// re-runs only when its inputs or configuration change. Because these
/// targets are not externally visible, they can never stand in as un-owned
/// prerequisites.
#[derive(Debug)]
pub struct LogicalTargetHandler;

impl TargetHandler for LogicalTargetHandler {
    fn discriminant(&self) -> char {
        '@'
    }

    fn on_disk_target(&self) -> bool {
        false
    }

    fn cook(
        &self,
        target: &TargetId,
        _previous: Option<&TargetFingerprint>,
    ) -> Result<CookedTarget> {
        Ok(CookedTarget::Logical(SmolStr::new(target.as_str())))
    }

    fn need_rebuild(&self, cooked: &CookedTarget, previous: &TargetFingerprint) -> Result<bool> {
        Ok(match self.compute_fingerprint(cooked)? {
            Some(current) => current != *previous,
            None => true,
        })
    }

    fn compute_fingerprint(&self, cooked: &CookedTarget) -> Result<Option<TargetFingerprint>> {
        let CookedTarget::Logical(name) = cooked else {
            bail!("virtual target handler received foreign cooked value: {cooked:?}");
        };
        let mut digest = Digest::new();
        digest.update(name.as_bytes());
        Ok(Some(TargetFingerprint::new(digest.finish())))
    }

    fn clean(&self, _cooked: &CookedTarget) -> Result<()> {
        // Nothing on disk to remove.
        Ok(())
    }
}
