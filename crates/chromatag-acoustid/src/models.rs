// SPDX-License-Identifier: GPL-3.0-or-later

use chromatag_fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WebServiceError};

/// Metadata sections that a lookup can ask the server to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Meta {
    Recordings,
    RecordingIds,
    Releases,
    ReleaseIds,
    ReleaseGroups,
    ReleaseGroupIds,
    Tracks,
    Compress,
    UserMeta,
    Sources,
}

impl Meta {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recordings => "recordings",
            Self::RecordingIds => "recordingids",
            Self::Releases => "releases",
            Self::ReleaseIds => "releaseids",
            Self::ReleaseGroups => "releasegroups",
            Self::ReleaseGroupIds => "releasegroupids",
            Self::Tracks => "tracks",
            Self::Compress => "compress",
            Self::UserMeta => "usermeta",
            Self::Sources => "sources",
        }
    }

    /// Space-separated list as the API expects it. Form encoding turns the
    /// spaces into `+`.
    pub fn join(meta: &[Meta]) -> String {
        meta.iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Error body returned alongside `"status": "error"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
}

/// Common shape of every AcoustID response.
pub(crate) trait ApiResponse {
    fn status(&self) -> &str;
    fn error(&self) -> Option<&ApiErrorBody>;

    fn check_status(&self) -> Result<()> {
        if self.status().eq_ignore_ascii_case("ok") {
            return Ok(());
        }

        Err(match self.error() {
            Some(error) => WebServiceError::Service {
                code: error.code,
                message: error.message.clone(),
            },
            None => WebServiceError::Service {
                code: None,
                message: format!("status: {}", self.status()),
            },
        })
    }
}

/// Minimal envelope used to read the error from a non-2xx body.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub(crate) error: Option<ApiErrorBody>,
}

/// Parsed `/lookup` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupResponse {
    pub status: String,
    #[serde(default)]
    pub results: Option<Vec<LookupResult>>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

impl ApiResponse for LookupResponse {
    fn status(&self) -> &str {
        &self.status
    }

    fn error(&self) -> Option<&ApiErrorBody> {
        self.error.as_ref()
    }
}

/// One AcoustID track matching the fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupResult {
    /// AcoustID track ID.
    pub id: String,
    /// Match score (0-1), higher is more confident.
    pub score: f32,
    /// MusicBrainz recordings linked to the track (needs `Meta::Recordings`).
    #[serde(default)]
    pub recordings: Vec<Recording>,
}

/// MusicBrainz recording attached to a lookup result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recording {
    /// MusicBrainz recording ID.
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Length in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub artists: Vec<RecordingArtist>,
    #[serde(default)]
    pub releasegroups: Vec<ReleaseGroup>,
}

/// Artist credited on a recording.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordingArtist {
    /// MusicBrainz artist ID.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    /// Join phrase (e.g., " & ", " feat. ").
    #[serde(default)]
    pub joinphrase: Option<String>,
}

/// Release group (album) a recording appears on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseGroup {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Lookup match: one per result, in server order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordingMatch {
    pub score: f32,
    pub recording_id: String,
    pub title: Option<String>,
    /// Name of the first credited artist.
    pub artist: Option<String>,
}

impl RecordingMatch {
    fn new(score: f32, recording: Recording) -> Self {
        Self {
            score,
            artist: recording.artists.into_iter().next().map(|a| a.name),
            recording_id: recording.id,
            title: recording.title,
        }
    }
}

/// Turn a lookup response into matches.
///
/// Each result contributes one match built from its first recording.
/// Results without any linked recording are skipped. An empty result list
/// produces an empty iterator.
///
/// # Errors
/// - `Service` if the response status is not `ok`.
/// - `InvalidResponse` if the response has no `results` field.
pub fn parse_lookup_result(
    response: LookupResponse,
) -> Result<impl Iterator<Item = RecordingMatch>> {
    response.check_status()?;

    let results = response.results.ok_or_else(|| {
        WebServiceError::InvalidResponse("results not included".to_string())
    })?;

    Ok(results.into_iter().filter_map(|result| {
        let score = result.score;
        result
            .recordings
            .into_iter()
            .next()
            .map(|recording| RecordingMatch::new(score, recording))
    }))
}

/// A fingerprint to contribute to the AcoustID database, with optional tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    pub fingerprint: String,
    /// Whole seconds.
    pub duration: u32,
    pub mbid: Option<String>,
    pub track: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub file_format: Option<String>,
    pub bitrate: Option<u32>,
}

impl Submission {
    pub fn new(fingerprint: &Fingerprint) -> Self {
        Self {
            fingerprint: fingerprint.hash.clone(),
            duration: fingerprint.duration_secs(),
            ..Self::default()
        }
    }

    pub fn mbid(mut self, mbid: impl Into<String>) -> Self {
        self.mbid = Some(mbid.into());
        self
    }

    pub fn track(mut self, track: impl Into<String>) -> Self {
        self.track = Some(track.into());
        self
    }

    pub fn artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// Form fields for this submission, suffixed with `.index`.
    pub(crate) fn form_fields(&self, index: usize) -> Vec<(String, String)> {
        let optional = [
            ("mbid", self.mbid.clone()),
            ("track", self.track.clone()),
            ("artist", self.artist.clone()),
            ("album", self.album.clone()),
            ("albumartist", self.album_artist.clone()),
            ("year", self.year.map(|v| v.to_string())),
            ("trackno", self.track_number.map(|v| v.to_string())),
            ("discno", self.disc_number.map(|v| v.to_string())),
            ("fileformat", self.file_format.clone()),
            ("bitrate", self.bitrate.map(|v| v.to_string())),
        ];

        let mut fields = vec![
            (format!("fingerprint.{}", index), self.fingerprint.clone()),
            (format!("duration.{}", index), self.duration.to_string()),
        ];
        fields.extend(
            optional
                .into_iter()
                .filter_map(|(key, value)| value.map(|v| (format!("{}.{}", key, index), v))),
        );
        fields
    }
}

/// State of a submitted fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionStatus {
    /// Submission ID, used for later status checks.
    pub id: u64,
    /// `pending` until the server has processed it, then `imported`.
    pub status: String,
    #[serde(default)]
    pub result: Option<SubmissionResult>,
}

impl SubmissionStatus {
    pub fn is_imported(&self) -> bool {
        self.status == "imported"
    }

    /// AcoustID track ID assigned on import.
    pub fn acoustid(&self) -> Option<&str> {
        self.result.as_ref().map(|r| r.id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionResult {
    pub id: String,
}

/// Parsed `/submit` and `/submission_status` response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubmissionsResponse {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) submissions: Vec<SubmissionStatus>,
    #[serde(default)]
    pub(crate) error: Option<ApiErrorBody>,
}

impl ApiResponse for SubmissionsResponse {
    fn status(&self) -> &str {
        &self.status
    }

    fn error(&self) -> Option<&ApiErrorBody> {
        self.error.as_ref()
    }
}
