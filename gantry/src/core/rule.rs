use std::collections::BTreeSet;
use std::collections::btree_map::{BTreeMap, Entry};
use std::fmt;

use anyhow::{Result, bail, ensure};
use smol_str::SmolStr;

use crate::core::{Config, TargetId};
use crate::handlers::CookedTarget;

/// Callback producing a rule's output artifacts.
///
/// Invoked with cooked outputs and cooked inputs in declaration order, plus
/// the frozen configuration. A returned error aborts the whole invocation.
pub type RuleAction = Box<dyn Fn(&[CookedTarget], &[CookedTarget], &Config) -> Result<()>>;

/// A fully resolved build rule: inputs, outputs, the configuration keys it
/// reads, and the action producing its outputs.
///
/// Rules are immutable once inserted into a [`RuleSet`] and live for the
/// whole invocation.
pub struct Rule {
    id: SmolStr,
    inputs: Vec<TargetId>,
    outputs: Vec<TargetId>,
    needed_config: BTreeSet<String>,
    action: RuleAction,
}

impl Rule {
    pub fn new<I, O, A>(id: impl Into<SmolStr>, inputs: I, outputs: O, action: A) -> Self
    where
        I: IntoIterator,
        I::Item: Into<TargetId>,
        O: IntoIterator,
        O::Item: Into<TargetId>,
        A: Fn(&[CookedTarget], &[CookedTarget], &Config) -> Result<()> + 'static,
    {
        Self {
            id: id.into(),
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
            needed_config: BTreeSet::new(),
            action: Box::new(action),
        }
    }

    /// Declare the configuration keys this rule reads.
    ///
    /// Only these keys feed the rule's run fingerprint, so mutating any other
    /// configuration key does not force a rebuild.
    pub fn with_config_keys<K>(mut self, keys: K) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
    {
        self.needed_config.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn id(&self) -> &SmolStr {
        &self.id
    }

    pub fn inputs(&self) -> &[TargetId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TargetId] {
        &self.outputs
    }

    /// Configuration keys in sorted order.
    pub fn needed_config(&self) -> impl Iterator<Item = &str> {
        self.needed_config.iter().map(String::as_str)
    }

    pub(crate) fn run(
        &self,
        outputs_cooked: &[CookedTarget],
        inputs_cooked: &[CookedTarget],
        config: &Config,
    ) -> Result<()> {
        (self.action)(outputs_cooked, inputs_cooked, config)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("needed_config", &self.needed_config)
            .finish_non_exhaustive()
    }
}

/// The immutable set of rules of one invocation, keyed by rule id.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: BTreeMap<SmolStr, Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rule: Rule) -> Result<()> {
        ensure!(
            !rule.outputs.is_empty(),
            "rule `{}` declares no outputs",
            rule.id
        );
        match self.rules.entry(rule.id.clone()) {
            Entry::Occupied(e) => bail!("found duplicate rule id `{}`", e.key()),
            Entry::Vacant(e) => {
                e.insert(rule);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Rule, RuleSet};

    fn noop(id: &str, inputs: &[&str], outputs: &[&str]) -> Rule {
        Rule::new(
            id,
            inputs.iter().copied(),
            outputs.iter().copied(),
            |_, _, _| Ok(()),
        )
    }

    #[test]
    fn duplicate_rule_id_is_rejected() {
        let mut rules = RuleSet::new();
        rules.insert(noop("compile", &["a.c#"], &["a.o#"])).unwrap();
        let err = rules
            .insert(noop("compile", &["b.c#"], &["b.o#"]))
            .unwrap_err();
        assert_eq!(err.to_string(), "found duplicate rule id `compile`");
    }

    #[test]
    fn empty_outputs_are_rejected() {
        let mut rules = RuleSet::new();
        assert!(rules.insert(noop("compile", &["a.c#"], &[])).is_err());
    }

    #[test]
    fn config_keys_are_sorted_and_deduplicated() {
        let rule = noop("link", &[], &["app#"]).with_config_keys(["opt", "arch", "opt"]);
        assert_eq!(rule.needed_config().collect::<Vec<_>>(), vec!["arch", "opt"]);
    }
}
