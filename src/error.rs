// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("detection file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("empty or unreadable video: {path}")]
    EmptyVideo { path: PathBuf },

    #[error("frame sequence has no metadata file: {path}")]
    MissingSequenceMeta { path: PathBuf },

    #[error("degenerate court landmarks: the four pixel points do not span a quadrilateral")]
    DegenerateHomography,

    #[error("cache artifact error: {0}")]
    Cache(#[from] CacheError),
}

/// Typed validation failures for cache artifacts. Every variant except
/// `Io`/`Encode` means the artifact on disk must not be trusted.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("cache decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("cache artifact too short to hold an envelope")]
    Truncated,

    #[error("bad magic bytes: not a footyvision cache artifact")]
    BadMagic,

    #[error("schema version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("artifact kind mismatch: found {found}, expected {expected}")]
    KindMismatch { found: u8, expected: u8 },

    #[error("source fingerprint mismatch: cache was written for a different input")]
    FingerprintMismatch,

    #[error("checksum mismatch: cache artifact is corrupted")]
    ChecksumMismatch,

    #[error("decompression failed: cache artifact is corrupted")]
    Decompression,
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
