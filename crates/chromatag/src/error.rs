// SPDX-License-Identifier: GPL-3.0-or-later

use chromatag_acoustid::WebServiceError;
use chromatag_fingerprint::FingerprintError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AcoustidError>;

/// Any failure while identifying a file.
///
/// Errors from the fingerprinting and web service layers are carried
/// unchanged so callers can decide whether to retry, skip, or abort.
#[derive(Debug, Error)]
pub enum AcoustidError {
    #[error(transparent)]
    FingerprintGeneration(#[from] FingerprintError),

    #[error(transparent)]
    WebService(#[from] WebServiceError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Fingerprint worker failed: {0}")]
    Worker(String),
}
