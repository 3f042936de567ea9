//! Dependency resolution over the rule graph: the inverted target-to-rule
//! table, owning-rule lookup and cycle detection.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;

use anyhow::Result;
use itertools::Itertools;
use smol_str::SmolStr;

use crate::core::{ConsistencyError, Rule, RuleSet, TargetId};

/// An ordered path of rule ids, rendered `a -> b -> c` in error messages.
#[derive(Debug, Clone, Default)]
pub struct DependencyChain(Vec<SmolStr>);

impl DependencyChain {
    pub fn new(ids: impl IntoIterator<Item = SmolStr>) -> Self {
        Self(ids.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DependencyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join(" -> "))
    }
}

/// The rule graph of one invocation, inverted for owning-rule lookup.
///
/// Built once per [`crate::Executor`] construction and immutable afterwards;
/// traversal state lives in the ops layer, not here.
#[derive(Debug)]
pub struct RuleGraph<'r> {
    target_to_rule: HashMap<&'r TargetId, &'r Rule>,
}

impl<'r> RuleGraph<'r> {
    /// Invert every rule's outputs into the `target -> rule` table.
    ///
    /// Each target may be produced by at most one rule; a duplicate output
    /// declaration is a configuration error raised here, before any
    /// traversal.
    pub fn new(rules: &'r RuleSet) -> Result<Self> {
        let mut target_to_rule: HashMap<&'r TargetId, &'r Rule> = HashMap::new();
        for rule in rules.iter() {
            for output in rule.outputs() {
                match target_to_rule.entry(output) {
                    Entry::Occupied(e) => {
                        return Err(ConsistencyError::DuplicateOutput {
                            target: output.clone(),
                            first: e.get().id().clone(),
                            second: rule.id().clone(),
                        }
                        .into());
                    }
                    Entry::Vacant(e) => {
                        e.insert(rule);
                    }
                }
            }
        }
        Ok(Self { target_to_rule })
    }

    /// The rule producing `target`, if any.
    ///
    /// `None` means the target must be an on-disk prerequisite; callers
    /// verify that via the target's handler.
    pub fn owning_rule(&self, target: &TargetId) -> Option<&'r Rule> {
        self.target_to_rule.get(target).copied()
    }

    /// Verify that the rule subgraph reachable from `root` is acyclic.
    ///
    /// Runs before the rebuild traversal so that a cycle is reported before
    /// any rule executes or any record is committed.
    pub fn ensure_acyclic_from(&self, root: &'r Rule) -> Result<()> {
        let mut done: HashSet<&'r str> = HashSet::new();
        let mut path: Vec<&'r Rule> = Vec::new();
        self.visit(root, &mut path, &mut done)
    }

    fn visit(
        &self,
        rule: &'r Rule,
        path: &mut Vec<&'r Rule>,
        done: &mut HashSet<&'r str>,
    ) -> Result<()> {
        if done.contains(rule.id().as_str()) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|on_path| on_path.id() == rule.id()) {
            let chain = DependencyChain::new(path[start..].iter().map(|r| r.id().clone()));
            return Err(ConsistencyError::Cycle { chain }.into());
        }
        path.push(rule);
        for input in rule.inputs() {
            if let Some(subrule) = self.owning_rule(input) {
                self.visit(subrule, path, done)?;
            }
        }
        path.pop();
        done.insert(rule.id().as_str());
        Ok(())
    }
}
