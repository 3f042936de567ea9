use std::collections::HashMap;

use anyhow::Result;
use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::Executor;
use crate::core::{Rule, RuleStage, RunError, TargetId, UnknownTargetError};
use crate::handlers::{CookedTarget, TargetHandler};
use crate::resolver::DependencyChain;
use crate::store::FingerprintDb;

/// Bring `target` up to date; returns `true` iff any rule was executed.
///
/// The traversal is depth-first through the rule graph, bottom-up: a rule's
/// rebuild verdict is decided after all of its inputs have been brought up
/// to date, and every executed rule commits its fresh fingerprints before
/// the parent rule is considered. Siblings follow input-declaration order,
/// so execution order is deterministic across invocations.
#[tracing::instrument(level = "debug", skip(executor))]
pub fn run(executor: &Executor<'_>, target: &TargetId) -> Result<bool> {
    let Some(rule) = executor.graph().owning_rule(target) else {
        return Err(UnknownTargetError {
            target: target.clone(),
            chain: DependencyChain::default(),
        }
        .into());
    };
    // Reject cycles up front: the rebuild traversal executes and commits
    // rules as it unwinds, and a cycle discovered halfway through would
    // leave those commits behind.
    executor.graph().ensure_acyclic_from(rule)?;
    let store = executor.open_store()?;
    let mut traversal = RunTraversal::new(executor, &store);
    traversal.run_rule(rule)
}

struct CookedEntry<'e> {
    cooked: CookedTarget,
    handler: &'e dyn TargetHandler,
}

/// Per-invocation traversal state.
///
/// `already_evaluated` makes every rule's verdict stable once computed and
/// protects against repeated execution; `targets` ensures every target is
/// cooked at most once per invocation.
struct RunTraversal<'t, 'e> {
    executor: &'t Executor<'e>,
    store: &'t FingerprintDb,
    already_evaluated: HashMap<SmolStr, bool>,
    targets: HashMap<&'e TargetId, CookedEntry<'e>>,
}

impl<'t, 'e> RunTraversal<'t, 'e> {
    fn new(executor: &'t Executor<'e>, store: &'t FingerprintDb) -> Self {
        Self {
            executor,
            store,
            already_evaluated: HashMap::new(),
            targets: HashMap::new(),
        }
    }

    fn run_rule(&mut self, rule: &'e Rule) -> Result<bool> {
        // Fast track if the rule has already been evaluated this invocation.
        if let Some(&rebuilt) = self.already_evaluated.get(rule.id()) {
            return Ok(rebuilt);
        }

        let run_fingerprint = self.executor.run_fingerprint(rule)?;

        // An absent record means the rule either never ran, or ran under a
        // different configuration; both force a rebuild.
        let previous = self.store.fetch(&run_fingerprint)?;
        let mut rebuild_needed = previous.is_none();
        let previous = previous.unwrap_or_default();

        // Targets whose fingerprints belong in this rule's record: its
        // outputs, plus un-owned on-disk inputs. The record is the only
        // place such inputs are persisted; without it they would read as
        // changed on every invocation.
        let mut to_cache: Vec<&'e TargetId> = Vec::new();

        for input in rule.inputs() {
            if let Some(subrule) = self.executor.graph().owning_rule(input) {
                rebuild_needed |= self.run_rule(subrule)?;
                continue;
            }
            // No owning rule: the input must be a prerequisite existing on
            // disk, typically a source file.
            let previous_fingerprint = previous.get(input);
            let (cooked, handler) = match self.targets.get(input) {
                Some(entry) => (entry.cooked.clone(), entry.handler),
                None => self.executor.handlers().cook(input, previous_fingerprint)?,
            };
            if !handler.on_disk_target() {
                return Err(UnknownTargetError {
                    target: input.clone(),
                    chain: DependencyChain::new([rule.id().clone()]),
                }
                .into());
            }
            let changed = match previous_fingerprint {
                Some(fingerprint) => handler.need_rebuild(&cooked, fingerprint)?,
                None => true,
            };
            self.targets.insert(input, CookedEntry { cooked, handler });
            rebuild_needed |= changed;
            to_cache.push(input);
        }

        let mut outputs_cooked = Vec::with_capacity(rule.outputs().len());
        for output in rule.outputs() {
            let previous_fingerprint = previous.get(output);
            let (cooked, handler) = self
                .executor
                .handlers()
                .cook(output, previous_fingerprint)?;
            let changed = match previous_fingerprint {
                Some(fingerprint) => handler.need_rebuild(&cooked, fingerprint)?,
                None => true,
            };
            outputs_cooked.push(cooked.clone());
            self.targets.insert(output, CookedEntry { cooked, handler });
            rebuild_needed |= changed;
            to_cache.push(output);
        }

        self.already_evaluated.insert(rule.id().clone(), rebuild_needed);
        if !rebuild_needed {
            return Ok(false);
        }

        debug!("running rule `{}`", rule.id());
        let inputs_cooked: Vec<CookedTarget> = rule
            .inputs()
            .iter()
            .map(|input| {
                self.targets
                    .get(input)
                    .expect("every input is cooked before its rule runs")
                    .cooked
                    .clone()
            })
            .collect();
        rule.run(&outputs_cooked, &inputs_cooked, self.executor.config())
            .map_err(|source| RunError::new(rule.id(), RuleStage::Execute, source))?;

        let mut fingerprints = Vec::with_capacity(to_cache.len());
        for target in to_cache {
            let entry = &self.targets[target];
            match entry.handler.compute_fingerprint(&entry.cooked)? {
                Some(fingerprint) => fingerprints.push(((*target).clone(), fingerprint)),
                // The rule may be broken, or a concurrent removal has just
                // occurred; the record will treat the target as never seen
                // and the rule will rebuild next time.
                None => warn!(
                    "rule `{}` left target `{target}` without observable state",
                    rule.id()
                ),
            }
        }
        self.store.commit(&run_fingerprint, &fingerprints)?;

        Ok(true)
    }
}
