//! The fingerprint store: transactional persistence of previous-run records.
//!
//! It uses [`redb`] as a local key-value database holding:
//! 1. Multimap table `runs`: mapping from a _run fingerprint_ to every
//!    (target id, target fingerprint) pair observed the last time the rule
//!    ran under that configuration.
//! 2. Table `run_markers`: mapping from a _run fingerprint_ to its recorded
//!    entry count, which distinguishes "this rule never ran under this
//!    configuration" from "it ran and recorded nothing".
//!
//! The file name carries a format version ([`crate::STORE_FILE_NAME`]); a new
//! format means a new file, never a migration. If the database file appears
//! to be corrupted it is deleted and recreated from scratch; the store is
//! just a cache, and the worst case is a full rebuild.

use std::collections::HashMap;

use anyhow::{Context, Result};
use camino::Utf8Path;
use redb::{MultimapTableDefinition, TableDefinition};
use tracing::{trace, warn};

use crate::core::{RunFingerprint, TargetFingerprint, TargetId};
use crate::internal::fsx;

/// Multimap: `run fingerprint -> (target id, target fingerprint)`.
const RUNS: MultimapTableDefinition<'_, &[u8], (&str, &[u8])> = MultimapTableDefinition::new("runs");

/// Map: `run fingerprint -> recorded entry count`.
const RUN_MARKERS: TableDefinition<'_, &[u8], u64> = TableDefinition::new("run_markers");

/// The set of target fingerprints recorded at the last successful execution
/// of a rule under a given configuration.
#[derive(Debug, Default)]
pub struct PreviousRun {
    targets: HashMap<TargetId, TargetFingerprint>,
}

impl PreviousRun {
    pub fn get(&self, target: &TargetId) -> Option<&TargetFingerprint> {
        self.targets.get(target)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn insert(&mut self, target: TargetId, fingerprint: TargetFingerprint) {
        self.targets.insert(target, fingerprint);
    }
}

/// A scoped session on the fingerprint database.
///
/// Opened once per top-level engine invocation; dropping it releases the
/// underlying database on every exit path. While the session is alive the
/// database file is locked for this process, so concurrent invocations on
/// the same store path serialise on open.
pub struct FingerprintDb {
    db: redb::Database,
}

impl FingerprintDb {
    #[tracing::instrument(level = "trace")]
    pub fn open(path: &Utf8Path) -> Result<Self> {
        fn create(path: &Utf8Path) -> Result<redb::Database> {
            redb::Builder::new()
                .set_repair_callback(|s| s.abort())
                .create(path)
                .context("failed to open fingerprint store, trying to recreate it")
                .or_else(|error| {
                    warn!("{error:?}");
                    fsx::remove_file_idempotent(path)
                        .context("failed to remove fingerprint store")?;
                    redb::Database::create(path).context("failed to recreate fingerprint store")
                })
        }

        fn init_tables(db: &redb::Database) -> Result<()> {
            let tx = db.begin_write()?;
            {
                tx.open_multimap_table(RUNS)?;
                tx.open_table(RUN_MARKERS)?;
            }
            tx.commit()?;
            Ok(())
        }

        if let Some(parent) = path.parent() {
            fsx::create_dir_all(parent)?;
        }
        trace!("opening fingerprint store: {path}");
        let db = create(path)?;
        init_tables(&db).context("failed to initialize fingerprint store tables")?;
        Ok(Self { db })
    }

    /// Fetch the record of the last run keyed by `run_fingerprint`, or `None`
    /// if the rule never ran under this configuration.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn fetch(&self, run_fingerprint: &RunFingerprint) -> Result<Option<PreviousRun>> {
        let tx = self
            .db
            .begin_read()
            .context("failed to read fingerprint store")?;
        let markers = tx.open_table(RUN_MARKERS)?;
        if markers.get(run_fingerprint.as_bytes())?.is_none() {
            trace!("no previous run recorded for {run_fingerprint}");
            return Ok(None);
        }
        let runs = tx.open_multimap_table(RUNS)?;
        let mut previous = PreviousRun::default();
        for entry in runs.get(run_fingerprint.as_bytes())? {
            let entry = entry?;
            let (target, fingerprint) = entry.value();
            previous.insert(TargetId::from(target), TargetFingerprint::new(fingerprint));
        }
        trace!(
            "fetched {} target fingerprints for {run_fingerprint}",
            previous.len()
        );
        Ok(Some(previous))
    }

    /// Overwrite the record for `run_fingerprint` with the given target
    /// fingerprints.
    ///
    /// The write is a single transaction: concurrent readers at the same
    /// path observe either the old record or the new one, never a partial
    /// write.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn commit(
        &self,
        run_fingerprint: &RunFingerprint,
        fingerprints: &[(TargetId, TargetFingerprint)],
    ) -> Result<()> {
        let tx = self
            .db
            .begin_write()
            .context("failed to write fingerprint store")?;
        {
            let mut markers = tx.open_table(RUN_MARKERS)?;
            markers.insert(run_fingerprint.as_bytes(), fingerprints.len() as u64)?;
        }
        {
            let mut runs = tx.open_multimap_table(RUNS)?;
            runs.remove_all(run_fingerprint.as_bytes())?;
            for (target, fingerprint) in fingerprints {
                runs.insert(
                    run_fingerprint.as_bytes(),
                    (target.as_str(), fingerprint.as_bytes()),
                )?;
            }
        }
        tx.commit()
            .context("failed to commit fingerprint store record")?;
        trace!(
            "committed {} target fingerprints for {run_fingerprint}",
            fingerprints.len()
        );
        Ok(())
    }
}
