use std::collections::HashSet;

use anyhow::Result;
use smol_str::SmolStr;
use tracing::debug;

use crate::Executor;
use crate::core::{ConsistencyError, Rule, RuleStage, RunError, TargetId, UnknownTargetError};
use crate::resolver::DependencyChain;
use crate::store::FingerprintDb;

/// Remove the artifacts previously produced for `target` and, recursively,
/// for every rule-produced dependency.
///
/// The previous run record only assists cooking here: if the rule never ran
/// or ran under a different configuration, cleaning proceeds with no
/// previous fingerprints and handlers tolerate that. The store itself is
/// never written by this traversal.
#[tracing::instrument(level = "debug", skip(executor))]
pub fn clean(executor: &Executor<'_>, target: &TargetId) -> Result<()> {
    let Some(rule) = executor.graph().owning_rule(target) else {
        return Err(UnknownTargetError {
            target: target.clone(),
            chain: DependencyChain::default(),
        }
        .into());
    };
    let store = executor.open_store()?;
    let mut traversal = CleanTraversal {
        executor,
        store: &store,
        already_cleaned: HashSet::new(),
    };
    traversal.clean_rule(rule, &mut Vec::new())
}

struct CleanTraversal<'t, 'e> {
    executor: &'t Executor<'e>,
    store: &'t FingerprintDb,
    already_cleaned: HashSet<SmolStr>,
}

impl<'t, 'e> CleanTraversal<'t, 'e> {
    fn clean_rule(&mut self, rule: &'e Rule, parents: &mut Vec<&'e Rule>) -> Result<()> {
        if !self.already_cleaned.insert(rule.id().clone()) {
            return Ok(());
        }

        debug!("cleaning rule `{}`", rule.id());
        let run_fingerprint = self.executor.run_fingerprint(rule)?;
        let previous = self.store.fetch(&run_fingerprint)?.unwrap_or_default();
        for output in rule.outputs() {
            let (cooked, handler) = self
                .executor
                .handlers()
                .cook(output, previous.get(output))?;
            handler
                .clean(&cooked)
                .map_err(|source| RunError::new(rule.id(), RuleStage::Clean, source))?;
        }

        parents.push(rule);
        for input in rule.inputs() {
            match self.executor.graph().owning_rule(input) {
                Some(subrule) => {
                    if parents.iter().any(|parent| parent.id() == subrule.id()) {
                        let chain =
                            DependencyChain::new(parents.iter().map(|parent| parent.id().clone()));
                        return Err(ConsistencyError::Cycle { chain }.into());
                    }
                    self.clean_rule(subrule, parents)?;
                }
                None => {
                    let handler = self.executor.handlers().handler_for(input)?;
                    if !handler.on_disk_target() {
                        let chain =
                            DependencyChain::new(parents.iter().map(|parent| parent.id().clone()));
                        return Err(UnknownTargetError {
                            target: input.clone(),
                            chain,
                        }
                        .into());
                    }
                    // An on-disk prerequisite without an owning rule is a
                    // user-owned source; never remove it.
                }
            }
        }
        parents.pop();

        Ok(())
    }
}
