//! Target handlers: the pluggable layer that knows how to observe, cook and
//! clean concrete target kinds.
//!
//! The engine core talks to targets exclusively through [`TargetHandler`];
//! each handler owns one identifier discriminant and its fingerprint format.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use anyhow::{Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use smol_str::SmolStr;

pub use file::FileTargetHandler;
pub use folder::FolderTargetHandler;
pub use logical::LogicalTargetHandler;

use crate::core::{TargetFingerprint, TargetId, UnknownTargetKindError};

mod file;
mod folder;
mod logical;

/// A handler-specific materialisation of a target identifier, ready to be
/// used by handler operations and rule actions.
///
/// The engine never inspects the payload; it clones the token and passes it
/// back to operations of the handler that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookedTarget {
    OnDisk(Utf8PathBuf),
    Logical(SmolStr),
}

impl CookedTarget {
    pub fn as_path(&self) -> Option<&Utf8Path> {
        match self {
            CookedTarget::OnDisk(path) => Some(path),
            CookedTarget::Logical(_) => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            CookedTarget::OnDisk(_) => None,
            CookedTarget::Logical(name) => Some(name),
        }
    }
}

/// Capability set every target kind must provide.
pub trait TargetHandler: std::fmt::Debug {
    /// The identifier discriminant this handler claims.
    fn discriminant(&self) -> char;

    /// Whether targets of this kind are externally visible on the
    /// filesystem.
    ///
    /// Only on-disk targets may appear as rule inputs without an owning rule
    /// (user-owned prerequisites such as source files).
    fn on_disk_target(&self) -> bool;

    /// Materialise the identifier.
    ///
    /// The previous fingerprint is informational; a handler may use it to
    /// short-circuit expensive probing.
    fn cook(
        &self,
        target: &TargetId,
        previous: Option<&TargetFingerprint>,
    ) -> Result<CookedTarget>;

    /// Whether the target's current state diverges from the recorded
    /// fingerprint.
    fn need_rebuild(&self, cooked: &CookedTarget, previous: &TargetFingerprint) -> Result<bool>;

    /// Compute a fresh fingerprint, or `None` if the target is not currently
    /// observable.
    fn compute_fingerprint(&self, cooked: &CookedTarget) -> Result<Option<TargetFingerprint>>;

    /// Remove the target if it exists. Must succeed if it is already absent.
    fn clean(&self, cooked: &CookedTarget) -> Result<()>;
}

/// Dispatches target identifiers to the handler claiming their discriminant.
pub struct HandlerRegistry {
    handlers: HashMap<char, Box<dyn TargetHandler>>,
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry with the bundled file, folder and virtual target handlers.
    pub fn std() -> Self {
        let mut registry = Self::empty();
        registry.add(Box::new(FileTargetHandler)).unwrap();
        registry.add(Box::new(FolderTargetHandler)).unwrap();
        registry.add(Box::new(LogicalTargetHandler)).unwrap();
        registry
    }

    pub fn add(&mut self, handler: Box<dyn TargetHandler>) -> Result<()> {
        match self.handlers.entry(handler.discriminant()) {
            Entry::Occupied(e) => bail!("found duplicate handler for discriminant `{}`", e.key()),
            Entry::Vacant(e) => {
                e.insert(handler);
                Ok(())
            }
        }
    }

    /// Select the handler for `target` without cooking it.
    pub fn handler_for(&self, target: &TargetId) -> Result<&dyn TargetHandler> {
        target
            .discriminant()
            .and_then(|discriminant| self.handlers.get(&discriminant))
            .map(|handler| &**handler)
            .ok_or_else(|| {
                UnknownTargetKindError {
                    target: target.clone(),
                }
                .into()
            })
    }

    /// Select the handler for `target` and produce its cooked form.
    pub fn cook(
        &self,
        target: &TargetId,
        previous: Option<&TargetFingerprint>,
    ) -> Result<(CookedTarget, &dyn TargetHandler)> {
        let handler = self.handler_for(target)?;
        let cooked = handler.cook(target, previous)?;
        Ok((cooked, handler))
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerRegistry ")?;
        f.debug_set()
            .entries(self.handlers.keys().sorted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{FileTargetHandler, HandlerRegistry};
    use crate::core::{TargetId, UnknownTargetKindError};

    #[test]
    fn dispatch_follows_discriminant() {
        let registry = HandlerRegistry::std();
        assert!(registry.handler_for(&TargetId::from("a.c#")).unwrap().on_disk_target());
        assert!(registry.handler_for(&TargetId::from("gen/")).unwrap().on_disk_target());
        assert!(!registry.handler_for(&TargetId::from("install@")).unwrap().on_disk_target());
    }

    #[test]
    fn unknown_discriminant_is_an_error() {
        let registry = HandlerRegistry::std();
        let err = registry.handler_for(&TargetId::from("mystery!")).unwrap_err();
        assert!(err.downcast_ref::<UnknownTargetKindError>().is_some());
    }

    #[test]
    fn duplicate_handler_is_rejected() {
        let mut registry = HandlerRegistry::std();
        let err = registry.add(Box::new(FileTargetHandler)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "found duplicate handler for discriminant `#`"
        );
    }
}
