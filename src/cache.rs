// src/cache.rs
//
// Versioned cache artifacts for the two expensive stages: the full
// normalized TrackStore (stage 1) and the CameraMovement sequence
// (stage 3). One artifact file per (recording, kind).
//
// Envelope layout, all fixed-width fields little-endian:
//
//   magic [4] | version u32 | kind u8 | source_len u64 | source_sha [32]
//   | lz4(msgpack body, size-prepended) | sha256 of everything before [32]
//
// A hit is trusted only when magic, version, kind, and the source
// fingerprint all match and the trailing checksum verifies. Any
// mismatch is a typed error; callers log it and recompute instead of
// silently consuming stale data.

use crate::error::CacheError;
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use rmp_serde::{from_slice, to_vec_named};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MAGIC: [u8; 4] = *b"FTVC";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 1 + 8 + 32;
const CHECKSUM_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Tracks,
    CameraMovement,
}

impl ArtifactKind {
    fn tag(self) -> u8 {
        match self {
            ArtifactKind::Tracks => 1,
            ArtifactKind::CameraMovement => 2,
        }
    }

    fn stem(self) -> &'static str {
        match self {
            ArtifactKind::Tracks => "tracks",
            ArtifactKind::CameraMovement => "camera",
        }
    }
}

/// Content identity of the input an artifact was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub len: u64,
    pub sha256: [u8; 32],
}

impl Fingerprint {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            len: bytes.len() as u64,
            sha256: hasher.finalize().into(),
        }
    }

    pub fn of_file(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let bytes = fs::read(path)?;
        Ok(Self::of_bytes(&bytes))
    }
}

pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// One cache path per (recording, kind): concurrent writers to the
    /// same path are avoided by key design, not locking.
    fn path_for(&self, recording: &str, kind: ArtifactKind) -> PathBuf {
        self.dir.join(format!("{}_{}.ftvc", kind.stem(), recording))
    }

    pub fn store<T: Serialize>(
        &self,
        recording: &str,
        kind: ArtifactKind,
        fingerprint: &Fingerprint,
        value: &T,
    ) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;

        let body = to_vec_named(value)?;
        let compressed = compress_prepend_size(&body);

        let mut out = Vec::with_capacity(HEADER_LEN + compressed.len() + CHECKSUM_LEN);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.push(kind.tag());
        out.extend_from_slice(&fingerprint.len.to_le_bytes());
        out.extend_from_slice(&fingerprint.sha256);
        out.extend_from_slice(&compressed);

        let mut hasher = Sha256::new();
        hasher.update(&out);
        let checksum: [u8; 32] = hasher.finalize().into();
        out.extend_from_slice(&checksum);

        let path = self.path_for(recording, kind);
        fs::write(&path, out)?;
        debug!("cache: wrote {} ({} bytes)", path.display(), body.len());
        Ok(())
    }

    /// Load an artifact. `Ok(None)` when no artifact exists; a typed
    /// error when one exists but fails validation.
    pub fn load<T: DeserializeOwned>(
        &self,
        recording: &str,
        kind: ArtifactKind,
        fingerprint: &Fingerprint,
    ) -> Result<Option<T>, CacheError> {
        let path = self.path_for(recording, kind);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(CacheError::Truncated);
        }

        let (payload, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        let mut hasher = Sha256::new();
        hasher.update(payload);
        if checksum != hasher.finalize().as_slice() {
            return Err(CacheError::ChecksumMismatch);
        }

        if payload[0..4] != MAGIC {
            return Err(CacheError::BadMagic);
        }

        let version = u32::from_le_bytes(payload[4..8].try_into().unwrap_or_default());
        if version != VERSION {
            return Err(CacheError::VersionMismatch {
                found: version,
                expected: VERSION,
            });
        }

        let tag = payload[8];
        if tag != kind.tag() {
            return Err(CacheError::KindMismatch {
                found: tag,
                expected: kind.tag(),
            });
        }

        let len = u64::from_le_bytes(payload[9..17].try_into().unwrap_or_default());
        let sha: [u8; 32] = payload[17..HEADER_LEN].try_into().unwrap_or_default();
        if len != fingerprint.len || sha != fingerprint.sha256 {
            return Err(CacheError::FingerprintMismatch);
        }

        let body = decompress_size_prepended(&payload[HEADER_LEN..])
            .map_err(|_| CacheError::Decompression)?;
        let value: T = from_slice(&body)?;
        debug!("cache: hit {}", path.display());
        Ok(Some(value))
    }

    /// Load-or-recompute helper: validation failures are logged and
    /// treated as misses, then the recomputed value is stored back.
    pub fn load_or_else<T, F>(
        &self,
        recording: &str,
        kind: ArtifactKind,
        fingerprint: &Fingerprint,
        compute: F,
    ) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        match self.load(recording, kind, fingerprint) {
            Ok(Some(value)) => return value,
            Ok(None) => {}
            Err(err) => {
                warn!(
                    "cache artifact for {} ({:?}) rejected: {}; recomputing",
                    recording, kind, err
                );
            }
        }

        let value = compute();
        if let Err(err) = self.store(recording, kind, fingerprint, &value) {
            warn!("failed to write cache artifact for {}: {}", recording, err);
        }
        value
    }
}
