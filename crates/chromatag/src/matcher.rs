// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::Path;

use chromatag_acoustid::{
    parse_lookup_result, AcoustidClient, LookupResponse, Meta, RecordingMatch,
};
use chromatag_config::AppConfig;
use chromatag_fingerprint::{
    fingerprint_file, Backend, BackendPreference, Fingerprint, DEFAULT_MAX_LENGTH_SECS,
};
use tracing::{debug, info, instrument};

use crate::{AcoustidError, Result};

/// Decode → fingerprint → lookup pipeline for audio files.
#[derive(Debug, Clone)]
pub struct Matcher {
    client: AcoustidClient,
    backend: Backend,
    max_length_secs: u32,
    meta: Vec<Meta>,
}

impl Matcher {
    pub fn new(client: AcoustidClient, backend: Backend) -> Self {
        Self {
            client,
            backend,
            max_length_secs: DEFAULT_MAX_LENGTH_SECS,
            meta: vec![Meta::Recordings],
        }
    }

    /// Build a matcher from loaded configuration.
    ///
    /// # Errors
    /// - `Configuration` if no API key is configured or the backend name is unknown.
    /// - `FingerprintGeneration` if no fingerprint backend can be found.
    /// - `WebService` if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = config.acoustid.api_key.clone().ok_or_else(|| {
            AcoustidError::Configuration("acoustid.api_key is not set".to_string())
        })?;

        let client = AcoustidClient::builder(api_key)
            .base_url(config.acoustid.base_url.clone())
            .timeout(config.acoustid.timeout())
            .rate_limit(config.acoustid.requests_per_window, config.acoustid.window())
            .build()?;

        let preference: BackendPreference = config
            .fingerprint
            .backend
            .parse()
            .map_err(|e: chromatag_fingerprint::FingerprintError| {
                AcoustidError::Configuration(e.to_string())
            })?;
        let backend = Backend::detect(preference, config.fingerprint.fpcalc_path.as_deref())?;

        Ok(Self::new(client, backend).max_length(config.fingerprint.max_length_secs))
    }

    /// Cap on the seconds of audio used for the fingerprint.
    pub fn max_length(mut self, secs: u32) -> Self {
        self.max_length_secs = secs;
        self
    }

    /// Metadata sections requested from the server.
    pub fn meta(mut self, meta: Vec<Meta>) -> Self {
        self.meta = meta;
        self
    }

    pub fn client(&self) -> &AcoustidClient {
        &self.client
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Fingerprint a file on a blocking worker thread.
    pub async fn fingerprint_file(&self, path: impl AsRef<Path>) -> Result<Fingerprint> {
        let backend = self.backend.clone();
        let path = path.as_ref().to_path_buf();
        let max_length_secs = self.max_length_secs;

        let fingerprint = tokio::task::spawn_blocking(move || {
            fingerprint_file(&backend, &path, max_length_secs)
        })
        .await
        .map_err(|e| AcoustidError::Worker(e.to_string()))??;

        debug!(
            target: "acoustid",
            duration = fingerprint.duration,
            "fingerprint generated"
        );
        Ok(fingerprint)
    }

    /// Fingerprint a file and return the full lookup response.
    #[instrument(skip(self, path), fields(file = %path.as_ref().display()))]
    pub async fn match_file_raw(&self, path: impl AsRef<Path>) -> Result<LookupResponse> {
        let fingerprint = self.fingerprint_file(path).await?;
        Ok(self.client.lookup(&fingerprint, &self.meta).await?)
    }

    /// Fingerprint a file and return its recording matches in server order.
    pub async fn match_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<impl Iterator<Item = RecordingMatch>> {
        let response = self.match_file_raw(path).await?;
        let matches = parse_lookup_result(response)?;
        info!(target: "acoustid", "lookup complete");
        Ok(matches)
    }
}

/// Identify one file with default settings and the best available backend.
pub async fn match_file(
    api_key: &str,
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = RecordingMatch>> {
    let client = AcoustidClient::new(api_key)?;
    let backend = Backend::detect(BackendPreference::Auto, None)?;
    Matcher::new(client, backend).match_file(path).await
}
