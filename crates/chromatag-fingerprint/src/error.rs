// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FingerprintError>;

/// The audio could not be fingerprinted.
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// Neither libchromaprint nor a usable `fpcalc` executable is available.
    #[error("Fingerprint backend not found: {0}")]
    BackendNotFound(String),

    #[error("Audio could not be decoded: {0}")]
    Decode(String),

    #[error("Invalid audio parameters: {0}")]
    InvalidParameters(String),

    #[error("Fingerprint calculation failed: {0}")]
    Native(String),

    #[error("fpcalc failed: {0}")]
    Tool(String),

    #[error("No audio samples available")]
    NoAudio,

    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FingerprintError {
    /// Whether this error means no fingerprint backend could be used at all.
    pub fn is_backend_not_found(&self) -> bool {
        matches!(self, Self::BackendNotFound(_))
    }
}
