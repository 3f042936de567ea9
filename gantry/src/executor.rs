use anyhow::Result;
use camino::Utf8PathBuf;

use crate::core::{Config, ConsistencyError, Digest, Rule, RuleSet, RunFingerprint, TargetId};
use crate::handlers::HandlerRegistry;
use crate::ops;
use crate::resolver::RuleGraph;
use crate::store::FingerprintDb;

/// The incremental execution engine.
///
/// Borrows the resolved rule set, the frozen configuration and the handler
/// registry for the duration of an invocation; owns nothing but the store
/// path. Construction inverts the rule graph, so a duplicate output
/// declaration fails here, before any traversal.
pub struct Executor<'e> {
    graph: RuleGraph<'e>,
    config: &'e Config,
    handlers: &'e HandlerRegistry,
    store_path: Utf8PathBuf,
}

impl std::fmt::Debug for Executor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("graph", &self.graph)
            .field("config", &self.config)
            .field("store_path", &self.store_path)
            .finish_non_exhaustive()
    }
}

impl<'e> Executor<'e> {
    pub fn new(
        rules: &'e RuleSet,
        config: &'e Config,
        handlers: &'e HandlerRegistry,
        store_path: impl Into<Utf8PathBuf>,
    ) -> Result<Self> {
        Ok(Self {
            graph: RuleGraph::new(rules)?,
            config,
            handlers,
            store_path: store_path.into(),
        })
    }

    /// Bring `target` up to date, executing every out-of-date rule on its
    /// transitive closure in dependency order.
    ///
    /// Returns `true` iff at least one rule was executed.
    pub fn run(&self, target: &TargetId) -> Result<bool> {
        ops::run(self, target)
    }

    /// Remove the artifacts previously produced for `target` and its
    /// rule-produced dependencies.
    ///
    /// On-disk prerequisites without an owning rule are user-owned sources
    /// and are left untouched.
    pub fn clean(&self, target: &TargetId) -> Result<()> {
        ops::clean(self, target)
    }

    pub(crate) fn graph(&self) -> &RuleGraph<'e> {
        &self.graph
    }

    pub(crate) fn config(&self) -> &'e Config {
        self.config
    }

    pub(crate) fn handlers(&self) -> &'e HandlerRegistry {
        self.handlers
    }

    pub(crate) fn open_store(&self) -> Result<FingerprintDb> {
        FingerprintDb::open(&self.store_path)
    }

    /// The cache key of a (rule, configuration-slice) pair.
    ///
    /// Covers the rule id and, in key order, every configuration entry the
    /// rule declares it reads, and nothing else. In particular the rule's
    /// own code is not covered; declaring the relevant source files as
    /// inputs is the supported way to react to code changes.
    pub(crate) fn run_fingerprint(&self, rule: &Rule) -> Result<RunFingerprint> {
        let mut digest = Digest::new();
        digest
            .update_u64(rule.id().len() as u64)
            .update(rule.id().as_bytes());
        for key in rule.needed_config() {
            let Some(value) = self.config.get(key) else {
                return Err(ConsistencyError::MissingConfig {
                    rule_id: rule.id().clone(),
                    key: key.into(),
                }
                .into());
            };
            digest.update_u64(key.len() as u64).update(key.as_bytes());
            value.digest_into(&mut digest);
        }
        Ok(RunFingerprint::from(digest.finish()))
    }
}
