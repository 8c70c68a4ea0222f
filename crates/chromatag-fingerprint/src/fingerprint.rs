// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;

use serde::{Deserialize, Serialize};

/// Audio fingerprint (Chromaprint).
///
/// The hash is Chromaprint's compressed representation, base64-encoded with
/// the URL-safe alphabet. It is only meaningful as a lookup key and is never
/// modified after generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fingerprint {
    /// Compressed fingerprint hash.
    pub hash: String,
    /// Duration of the fingerprinted audio in seconds.
    pub duration: f64,
}

impl Fingerprint {
    /// Create a new fingerprint.
    pub fn new(hash: impl Into<String>, duration: f64) -> Self {
        Self {
            hash: hash.into(),
            duration,
        }
    }

    /// Whole seconds of audio, as the AcoustID API expects it.
    pub fn duration_secs(&self) -> u32 {
        self.duration.max(0.0) as u32
    }

    /// Validate the fingerprint format.
    ///
    /// A valid fingerprint has a non-empty hash in either base64 alphabet and
    /// a duration of at least one second.
    pub fn validate(&self) -> crate::Result<()> {
        if self.hash.is_empty() {
            return Err(crate::FingerprintError::InvalidFingerprint(
                "fingerprint hash is empty".to_string(),
            ));
        }

        if !self.duration.is_finite() || self.duration_secs() == 0 {
            return Err(crate::FingerprintError::InvalidFingerprint(
                "duration must be at least one second".to_string(),
            ));
        }

        let trimmed = self.hash.trim_end_matches('=');

        let padding_len = self.hash.len() - trimmed.len();
        if padding_len > 2 {
            return Err(crate::FingerprintError::InvalidFingerprint(
                "invalid base64 padding: too many '=' characters".to_string(),
            ));
        }

        if trimmed.contains('=') {
            return Err(crate::FingerprintError::InvalidFingerprint(
                "padding character '=' must only appear at the end".to_string(),
            ));
        }

        // Chromaprint emits the URL-safe alphabet; fpcalc builds of some
        // distributions still use the standard one.
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '-' | '_'))
        {
            return Err(crate::FingerprintError::InvalidFingerprint(
                "fingerprint contains invalid characters".to_string(),
            ));
        }

        Ok(())
    }
}

/// Uncompressed Chromaprint fingerprint: one 32-bit sub-fingerprint per frame.
///
/// Displays as comma-separated integers, the way `fpcalc -raw` prints it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawFingerprint {
    pub values: Vec<u32>,
    /// Duration of the fingerprinted audio in seconds.
    pub duration: f64,
}

impl RawFingerprint {
    pub fn new(values: Vec<u32>, duration: f64) -> Self {
        Self { values, duration }
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration.max(0.0) as u32
    }
}

impl fmt::Display for RawFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", value)?;
        }
        Ok(())
    }
}
