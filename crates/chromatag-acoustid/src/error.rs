// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WebServiceError>;

/// The web service request failed.
#[derive(Debug, Error)]
pub enum WebServiceError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid response from AcoustID API: {0}")]
    InvalidResponse(String),

    /// The server answered with `"status": "error"`.
    #[error("AcoustID error: {message}")]
    Service { code: Option<i64>, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to compress request body: {0}")]
    Encoding(#[from] std::io::Error),
}
