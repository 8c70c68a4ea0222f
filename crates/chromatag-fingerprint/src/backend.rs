// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::fpcalc::FpcalcBackend;
use crate::{FingerprintError, Result};

/// Which backend a caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// Linked libchromaprint if present, `fpcalc` otherwise.
    #[default]
    Auto,
    Native,
    Fpcalc,
}

impl FromStr for BackendPreference {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "native" | "chromaprint" => Ok(Self::Native),
            "fpcalc" => Ok(Self::Fpcalc),
            other => Err(FingerprintError::InvalidParameters(format!(
                "unknown fingerprint backend '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Native => "native",
            Self::Fpcalc => "fpcalc",
        })
    }
}

/// The fingerprinting implementation in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// libchromaprint linked into this binary.
    Native,
    /// An external `fpcalc` executable.
    Fpcalc(FpcalcBackend),
}

impl Backend {
    /// Whether libchromaprint was compiled in.
    pub fn native_available() -> bool {
        cfg!(feature = "native")
    }

    /// Probe for an available backend honoring the caller's preference.
    pub fn detect(preference: BackendPreference, fpcalc_path: Option<&Path>) -> Result<Self> {
        let backend = match preference {
            BackendPreference::Native => {
                if !Self::native_available() {
                    return Err(FingerprintError::BackendNotFound(
                        "built without libchromaprint support".to_string(),
                    ));
                }
                Self::Native
            }
            BackendPreference::Fpcalc => Self::Fpcalc(FpcalcBackend::locate(fpcalc_path)?),
            BackendPreference::Auto if Self::native_available() => Self::Native,
            BackendPreference::Auto => Self::Fpcalc(FpcalcBackend::locate(fpcalc_path)?),
        };

        match &backend {
            Self::Fpcalc(fpcalc) => match fpcalc.version() {
                Ok(version) => debug!(
                    target: "fingerprint",
                    backend = %backend,
                    version = %version,
                    "selected fingerprint backend"
                ),
                Err(e) => warn!(
                    target: "fingerprint",
                    backend = %backend,
                    "selected fingerprint backend, version unknown: {}",
                    e
                ),
            },
            Self::Native => {
                debug!(target: "fingerprint", backend = %backend, "selected fingerprint backend")
            }
        }
        Ok(backend)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("libchromaprint"),
            Self::Fpcalc(fpcalc) => write!(f, "fpcalc ({})", fpcalc.path().display()),
        }
    }
}
