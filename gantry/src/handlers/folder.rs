use std::io;

use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;

use crate::core::{Digest, TargetFingerprint, TargetId};
use crate::handlers::{CookedTarget, TargetHandler};
use crate::internal::fsx;

/// Handler for targets backed by a directory on disk.
///
/// Identifiers end with `/`; the fingerprint covers the sorted entry-name
/// listing, absent while the directory does not exist. Contents of the
/// entries are deliberately not hashed; rules whose outputs depend on file
/// contents should declare those files as targets themselves.
#[derive(Debug)]
pub struct FolderTargetHandler;

impl FolderTargetHandler {
    fn path_of<'c>(&self, cooked: &'c CookedTarget) -> Result<&'c Utf8Path> {
        match cooked {
            CookedTarget::OnDisk(path) => Ok(path),
            other => bail!("folder target handler received foreign cooked value: {other:?}"),
        }
    }
}

impl TargetHandler for FolderTargetHandler {
    fn discriminant(&self) -> char {
        '/'
    }

    fn on_disk_target(&self) -> bool {
        true
    }

    fn cook(
        &self,
        target: &TargetId,
        _previous: Option<&TargetFingerprint>,
    ) -> Result<CookedTarget> {
        let Some(path) = target.as_str().strip_suffix('/') else {
            bail!("folder target handler cannot cook `{target}`");
        };
        Ok(CookedTarget::OnDisk(Utf8PathBuf::from(path)))
    }

    fn need_rebuild(&self, cooked: &CookedTarget, previous: &TargetFingerprint) -> Result<bool> {
        Ok(match self.compute_fingerprint(cooked)? {
            Some(current) => current != *previous,
            None => true,
        })
    }

    fn compute_fingerprint(&self, cooked: &CookedTarget) -> Result<Option<TargetFingerprint>> {
        let path = self.path_of(cooked)?;
        let entries = match path.read_dir_utf8() {
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            other => other.with_context(|| format!("failed to read directory `{path}`"))?,
        };
        let names: Vec<_> = entries
            .map_ok(|entry| entry.file_name().to_owned())
            .try_collect()
            .with_context(|| format!("failed to read directory `{path}`"))?;
        let mut digest = Digest::new();
        digest.update_u64(names.len() as u64);
        for name in names.iter().sorted() {
            digest.update_u64(name.len() as u64).update(name.as_bytes());
        }
        Ok(Some(TargetFingerprint::new(digest.finish())))
    }

    fn clean(&self, cooked: &CookedTarget) -> Result<()> {
        fsx::remove_dir_all_idempotent(self.path_of(cooked)?)
    }
}
