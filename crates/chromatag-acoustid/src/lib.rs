// SPDX-License-Identifier: GPL-3.0-or-later

//! AcoustID web service client.
//!
//! This crate provides a client for the AcoustID API: fingerprint lookup,
//! fingerprint submission, and submission status checks. Every request goes
//! through a shared rate limiter (3 requests per second by default) and is
//! sent as a gzip-compressed form body.

pub mod client;
#[cfg(test)]
mod client_tests;
pub mod error;
pub mod models;
pub mod rate_limiter;

pub use client::{AcoustidClient, AcoustidClientBuilder};
pub use error::{Result, WebServiceError};
pub use models::{
    parse_lookup_result, LookupResponse, LookupResult, Meta, Recording, RecordingArtist,
    RecordingMatch, ReleaseGroup, Submission, SubmissionStatus,
};
pub use rate_limiter::RateLimiter;
