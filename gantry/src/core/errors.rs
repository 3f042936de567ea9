use std::fmt;

use smol_str::SmolStr;
use thiserror::Error;

use crate::core::TargetId;
use crate::resolver::DependencyChain;

/// A structural defect in the rule set, detected before any rule executes.
#[derive(Debug, Error)]
pub enum ConsistencyError {
    #[error("rules `{first}` and `{second}` both declare target `{target}` as output")]
    DuplicateOutput {
        target: TargetId,
        first: SmolStr,
        second: SmolStr,
    },
    #[error("dependency cycle detected in rules `{chain}`")]
    Cycle { chain: DependencyChain },
    #[error("rule `{rule_id}` reads config key `{key}` which is not set")]
    MissingConfig { rule_id: SmolStr, key: String },
}

/// A depended-upon target has no owning rule and is not an on-disk
/// prerequisite either.
#[derive(Debug, Error)]
#[error("no rule has target `{target}` as output{}", needed_by(.chain))]
pub struct UnknownTargetError {
    pub target: TargetId,
    /// Rule ids on the path from the requested target to the offender;
    /// empty when the requested target itself is unknown.
    pub chain: DependencyChain,
}

fn needed_by(chain: &DependencyChain) -> String {
    if chain.is_empty() {
        String::new()
    } else {
        format!(" (needed by `{chain}`)")
    }
}

/// No registered target handler understands the identifier.
#[derive(Debug, Error)]
#[error("no target handler understands `{target}`")]
pub struct UnknownTargetKindError {
    pub target: TargetId,
}

/// Which rule-level operation a [`RunError`] originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStage {
    Execute,
    Clean,
}

impl fmt::Display for RuleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuleStage::Execute => "execution",
            RuleStage::Clean => "cleanup",
        })
    }
}

/// A rule action, or a handler operation invoked on its behalf, failed.
///
/// Fatal for the current invocation; records committed for previously
/// completed rules stay committed.
#[derive(Debug, Error)]
#[error("{stage} of rule `{rule_id}` failed")]
pub struct RunError {
    pub rule_id: SmolStr,
    pub stage: RuleStage,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl RunError {
    pub(crate) fn new(rule_id: &SmolStr, stage: RuleStage, source: anyhow::Error) -> Self {
        Self {
            rule_id: rule_id.clone(),
            stage,
            source: source.into(),
        }
    }
}
