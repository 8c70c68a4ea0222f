// SPDX-License-Identifier: GPL-3.0-or-later

//! Identify audio files with Chromaprint and AcoustID.
//!
//! This crate ties the fingerprinting and web service crates together:
//! decode a file, fingerprint it, look the fingerprint up, and hand back
//! the recording matches.
//!
//! ```no_run
//! # async fn example() -> Result<(), chromatag::AcoustidError> {
//! for m in chromatag::match_file("your-api-key", "song.flac").await? {
//!     println!("{:.0}% {} - {:?}", m.score * 100.0, m.recording_id, m.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod matcher;

pub use chromatag_acoustid::{
    parse_lookup_result, AcoustidClient, LookupResponse, Meta, RateLimiter, RecordingMatch,
    Submission, SubmissionStatus, WebServiceError,
};
pub use chromatag_fingerprint::{
    Backend, BackendPreference, Fingerprint, FingerprintError, RawFingerprint,
    DEFAULT_MAX_LENGTH_SECS,
};
pub use error::{AcoustidError, Result};
pub use matcher::{match_file, Matcher};
