// SPDX-License-Identifier: GPL-3.0-or-later

//! Chromaprint audio fingerprinting.
//!
//! This crate provides functionality for:
//! - Selecting a fingerprint backend (linked libchromaprint or the `fpcalc` tool)
//! - Streaming interleaved 16-bit PCM into a fingerprint context
//! - Decoding audio files into PCM blocks with symphonia
//! - Fingerprinting whole files with a duration cap

pub mod backend;
pub mod decoder;
pub mod error;
pub mod fingerprint;
pub mod fingerprinter;
pub mod fpcalc;
#[cfg(feature = "native")]
mod native;

pub use backend::{Backend, BackendPreference};
pub use decoder::AudioDecoder;
pub use error::{FingerprintError, Result};
pub use fingerprint::{Fingerprint, RawFingerprint};
pub use fingerprinter::{fingerprint_file, fingerprint_pcm, raw_fingerprint_file, Fingerprinter};
pub use fpcalc::FpcalcBackend;

/// Default cap on the amount of audio used for a fingerprint, in seconds.
pub const DEFAULT_MAX_LENGTH_SECS: u32 = 120;
