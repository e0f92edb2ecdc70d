// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Staging of uploaded videos on local disk
//!
//! A [`StagedVideo`] owns its temporary file. Dropping it (or calling
//! [`StagedVideo::cleanup`]) deletes the file, so every exit path of a
//! request releases what it staged.

use axum::body::Bytes;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::{Result, VidsageError};

/// Extension assumed when an upload's name has none
pub const FALLBACK_EXTENSION: &str = "mp4";

/// A video as received from the user
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub file_name: String,
    pub data: Bytes,
}

impl VideoUpload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }
}

/// Writes uploads to uniquely named temporary files
#[derive(Debug, Clone)]
pub struct Stager {
    dir: PathBuf,
    max_bytes: u64,
    allowed: Vec<String>,
}

impl Stager {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64, allowed: &[String]) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
            allowed: allowed.iter().map(|e| e.to_ascii_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.staging_dir(),
            config.upload.max_bytes,
            &config.upload.allowed_extensions,
        )
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed
    }

    /// Check name and size of an upload without touching the disk
    pub fn check(&self, upload: &VideoUpload) -> Result<String> {
        let extension = self.check_extension(&upload.file_name)?;
        if upload.data.is_empty() {
            return Err(VidsageError::Validation(
                "Please upload a video file to analyze.".to_string(),
            ));
        }
        self.check_size(upload.data.len() as u64)?;
        Ok(extension)
    }

    /// Write an upload to a new staged file
    pub fn stage(&self, upload: &VideoUpload) -> Result<StagedVideo> {
        let extension = self.check(upload)?;

        let (id, mut file) = self.create(&extension)?;
        // On error `file` is dropped here and the partial file removed.
        file.write_all(&upload.data)?;
        file.flush()?;

        let staged = StagedVideo {
            path: file.into_temp_path(),
            id,
            extension,
            display_name: display_name(&upload.file_name),
            size: upload.data.len() as u64,
        };
        debug!("Staged {} ({} bytes) at {:?}", staged.display_name, staged.size, staged.path());
        Ok(staged)
    }

    /// Create an empty staged file for producers that write it themselves
    pub fn reserve(&self, extension: &str, display: &str) -> Result<StagedVideo> {
        let extension = self.check_extension(&format!("video.{}", extension))?;
        let (id, file) = self.create(&extension)?;
        Ok(StagedVideo {
            path: file.into_temp_path(),
            id,
            extension,
            display_name: display_name(display),
            size: 0,
        })
    }

    /// Reject sizes over the configured limit
    pub fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_bytes {
            return Err(VidsageError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    fn check_extension(&self, file_name: &str) -> Result<String> {
        let extension = extension_for(file_name);
        if self.allowed.iter().any(|a| *a == extension) {
            Ok(extension)
        } else {
            Err(VidsageError::UnsupportedFormat(
                extension,
                self.allowed.join(", "),
            ))
        }
    }

    fn create(&self, extension: &str) -> Result<(String, tempfile::NamedTempFile)> {
        let id = short_id();
        let suffix = format!("_{}.{}", id, extension);
        let file = tempfile::Builder::new()
            .prefix("vidsage_")
            .suffix(&suffix)
            .tempfile_in(&self.dir)?;
        Ok((id, file))
    }
}

/// A staged temporary copy of an upload, owned by one request
#[derive(Debug)]
pub struct StagedVideo {
    path: TempPath,
    id: String,
    extension: String,
    display_name: String,
    size: u64,
}

impl StagedVideo {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Random identifier embedded in the file name
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Name shown to the provider and in logs
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mime_type(&self) -> &'static str {
        mime_for_extension(&self.extension)
    }

    /// Re-read the size after an external writer filled the file
    pub fn refresh_size(&mut self) -> io::Result<u64> {
        self.size = std::fs::metadata(&self.path)?.len();
        Ok(self.size)
    }

    /// Delete the staged file now and report whether that worked
    pub fn cleanup(self) -> io::Result<()> {
        match self.path.close() {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Lowercased extension of a file name, `mp4` when it has none
pub fn extension_for(file_name: &str) -> String {
    let name = display_name(file_name);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => FALLBACK_EXTENSION.to_string(),
    }
}

/// MIME type the provider expects for a video extension
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mpeg" | "mpg" => "video/mpeg",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "3gp" => "video/3gpp",
        _ => "application/octet-stream",
    }
}

/// Final path component of a client-supplied name
fn display_name(file_name: &str) -> String {
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    if name.is_empty() {
        "upload".to_string()
    } else {
        name.to_string()
    }
}

/// 12 hex characters of a v4 UUID
fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}
