//! Core datastructures describing resolved build rules and their observed
//! state.
//!
//! For the traversals operating on them, see [`crate::ops`].

pub use config::{Config, ConfigValue};
pub use errors::{
    ConsistencyError, RuleStage, RunError, UnknownTargetError, UnknownTargetKindError,
};
pub use fingerprint::{Digest, RunFingerprint, TargetFingerprint};
pub use rule::{Rule, RuleAction, RuleSet};
pub use target::TargetId;

mod config;
mod errors;
mod fingerprint;
mod rule;
mod target;
