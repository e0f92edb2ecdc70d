// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for vidsage

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for vidsage operations
pub type Result<T> = std::result::Result<T, VidsageError>;

/// vidsage error types
#[derive(Error, Debug)]
pub enum VidsageError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(String),

    #[error("Unsupported video format: .{0} (allowed: {1})")]
    UnsupportedFormat(String, String),

    #[error("Upload too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("Upload exceeds the {0} byte request limit")]
    PayloadTooLarge(u64),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider error {status} {reason}: {message}")]
    Provider {
        status: u16,
        reason: String,
        message: String,
    },

    #[error("Provider failed to process the uploaded video")]
    ProcessingFailed,

    #[error("Provider did not finish processing the video within {0} seconds")]
    ProcessingTimeout(u64),

    #[error("Provider returned no text: {0}")]
    EmptyResponse(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Server error: {0}")]
    Server(String),
}

impl VidsageError {
    /// Errors the user can fix by changing the submission
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::UnsupportedFormat(..)
                | Self::TooLarge { .. }
                | Self::PayloadTooLarge(_)
        )
    }

    /// HTTP status used when this error ends a web request
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedFormat(..) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::TooLarge { .. } | Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Download(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Http(_)
            | Self::Provider { .. }
            | Self::ProcessingFailed
            | Self::ProcessingTimeout(_)
            | Self::EmptyResponse(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_)
            | Self::FileSystem(_)
            | Self::Json(_)
            | Self::Template(_)
            | Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
