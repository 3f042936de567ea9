use std::fs::File;
use std::io;

use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};

use crate::core::{Digest, TargetFingerprint, TargetId};
use crate::handlers::{CookedTarget, TargetHandler};
use crate::internal::fsx;

/// Handler for targets backed by a single file on disk.
///
/// Identifiers end with `#`; the fingerprint is the SHA-256 of the file
/// contents, absent while the file does not exist.
#[derive(Debug)]
pub struct FileTargetHandler;

impl FileTargetHandler {
    fn path_of<'c>(&self, cooked: &'c CookedTarget) -> Result<&'c Utf8Path> {
        match cooked {
            CookedTarget::OnDisk(path) => Ok(path),
            other => bail!("file target handler received foreign cooked value: {other:?}"),
        }
    }
}

impl TargetHandler for FileTargetHandler {
    fn discriminant(&self) -> char {
        '#'
    }

    fn on_disk_target(&self) -> bool {
        true
    }

    fn cook(
        &self,
        target: &TargetId,
        _previous: Option<&TargetFingerprint>,
    ) -> Result<CookedTarget> {
        let Some(path) = target.as_str().strip_suffix('#') else {
            bail!("file target handler cannot cook `{target}`");
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
        let file = match File::open(path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            other => other.with_context(|| format!("failed to open `{path}`"))?,
        };
        let mut digest = Digest::new();
        digest
            .update_read(file)
            .with_context(|| format!("failed to hash `{path}`"))?;
        Ok(Some(TargetFingerprint::new(digest.finish())))
    }

    fn clean(&self, cooked: &CookedTarget) -> Result<()> {
        fsx::remove_file_idempotent(self.path_of(cooked)?)
    }
}

#[cfg(test)]
mod tests {
    use assert_fs::TempDir;
    use assert_fs::prelude::*;

    use super::FileTargetHandler;
    use crate::core::TargetId;
    use crate::handlers::TargetHandler;

    fn target_in(t: &TempDir, name: &str) -> TargetId {
        TargetId::from(format!("{}/{name}#", t.path().to_str().unwrap()))
    }

    #[test]
    fn fingerprint_tracks_contents() {
        let t = TempDir::new().unwrap();
        t.child("a.txt").write_str("one").unwrap();
        let handler = FileTargetHandler;
        let cooked = handler.cook(&target_in(&t, "a.txt"), None).unwrap();

        let first = handler.compute_fingerprint(&cooked).unwrap().unwrap();
        assert!(!handler.need_rebuild(&cooked, &first).unwrap());

        t.child("a.txt").write_str("two").unwrap();
        assert!(handler.need_rebuild(&cooked, &first).unwrap());
    }

    #[test]
    fn missing_file_has_no_fingerprint() {
        let t = TempDir::new().unwrap();
        let handler = FileTargetHandler;
        let cooked = handler.cook(&target_in(&t, "absent.txt"), None).unwrap();
        assert!(handler.compute_fingerprint(&cooked).unwrap().is_none());
    }

    #[test]
    fn clean_is_idempotent() {
        let t = TempDir::new().unwrap();
        t.child("a.txt").write_str("one").unwrap();
        let handler = FileTargetHandler;
        let cooked = handler.cook(&target_in(&t, "a.txt"), None).unwrap();
        handler.clean(&cooked).unwrap();
        handler.clean(&cooked).unwrap();
        assert!(!t.child("a.txt").path().exists());
    }
}
