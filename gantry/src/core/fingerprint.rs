use std::fmt;
use std::io::Read;

use anyhow::Result;
use data_encoding::HEXLOWER;
use sha2::Digest as _;

/// The cache key identifying a (rule, configuration-slice) pair.
///
/// Derived from the rule id and the canonical serialisation of every
/// configuration value the rule declares it reads. Notably the rule's own
/// code is *not* part of the fingerprint; users who want code-change
/// detection must declare the relevant source files as rule inputs.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunFingerprint([u8; 32]);

impl RunFingerprint {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for RunFingerprint {
    fn from(digest: [u8; 32]) -> Self {
        Self(digest)
    }
}

impl fmt::Display for RunFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", HEXLOWER.encode(&self.0))
    }
}

impl fmt::Debug for RunFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RunFingerprint({self})")
    }
}

/// A handler-defined byte string summarising the observable state of a
/// target.
///
/// The engine never interprets the contents; it only compares values for
/// equality and round-trips them through the fingerprint store. "No
/// observable state right now" (a missing file, for instance) is represented
/// by the *absence* of a fingerprint, not by a sentinel value.
#[derive(Clone, PartialEq, Eq)]
pub struct TargetFingerprint(Vec<u8>);

impl TargetFingerprint {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for TargetFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetFingerprint({})", HEXLOWER.encode(&self.0))
    }
}

/// Incremental SHA-256 hasher behind both fingerprint kinds.
pub struct Digest(sha2::Sha256);

impl Digest {
    pub fn new() -> Self {
        Self(sha2::Sha256::new())
    }

    pub fn update(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.update(bytes);
        self
    }

    /// Feed a length or other integer in a fixed-width encoding.
    ///
    /// Used to frame variable-length fields so that adjacent fields cannot
    /// collide by concatenation.
    pub fn update_u64(&mut self, value: u64) -> &mut Self {
        self.update(&value.to_le_bytes())
    }

    pub fn update_read(&mut self, mut input: impl Read) -> Result<&mut Self> {
        let mut buf = [0; 64 * 1024];
        loop {
            let n = input.read(&mut buf)?;
            if n == 0 {
                break Ok(self);
            }
            self.update(&buf[..n]);
        }
    }

    pub fn finish(&mut self) -> [u8; 32] {
        self.0.finalize_reset().into()
    }
}

impl Default for Digest {
    fn default() -> Self {
        Self::new()
    }
}
