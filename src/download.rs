// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Staging of videos referenced by URL, using yt-dlp

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::DownloadConfig;
use crate::stager::{StagedVideo, Stager};
use crate::{Result, VidsageError};

/// Single-file mp4, or mp4 video and m4a audio merged into an mp4 container
const MP4_FORMAT: &str = "b[ext=mp4]/bv*[ext=mp4]+ba[ext=m4a]";

/// Downloads a video page (YouTube and similar) into a staged file
#[derive(Debug, Clone)]
pub struct UrlFetcher {
    enabled: bool,
    ytdlp_path: String,
}

impl UrlFetcher {
    pub fn new(config: &DownloadConfig) -> Self {
        Self {
            enabled: config.enabled,
            ytdlp_path: config.ytdlp_path.clone(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Download `url` into a new staged file
    pub async fn fetch(&self, url: &str, stager: &Stager) -> Result<StagedVideo> {
        if !self.enabled {
            return Err(VidsageError::Validation(
                "Submitting videos by URL is disabled on this server.".to_string(),
            ));
        }
        let url = check_url(url)?;

        let mut staged = stager.reserve("mp4", url)?;
        // yt-dlp refuses to overwrite, so it gets the path to itself.
        tokio::fs::remove_file(staged.path()).await?;

        info!("Downloading {}", url);
        let output = Command::new(&self.ytdlp_path)
            .args(["-f", MP4_FORMAT, "--merge-output-format", "mp4"])
            .args(["--no-part", "--no-playlist", "--quiet", "--no-warnings"])
            .arg("--max-filesize")
            .arg(stager.max_bytes().to_string())
            .arg("-o")
            .arg(staged.path())
            .arg(url)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                return Err(VidsageError::Download(format!(
                    "Failed to run {}: {}",
                    self.ytdlp_path, e
                )))
            }
        };

        if !output.status.success() {
            remove_leftovers(staged.path()).await;

            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("unknown error")
                .trim()
                .to_string();
            return Err(VidsageError::Download(format!(
                "Error downloading video: {}",
                reason
            )));
        }

        let size = staged.refresh_size().map_err(|_| {
            VidsageError::Download(
                "Download produced no file; the video may exceed the size limit".to_string(),
            )
        })?;
        stager.check_size(size)?;

        debug!("Downloaded {} bytes to {:?}", size, staged.path());
        Ok(staged)
    }
}

/// Remove the side files yt-dlp may leave next to an unfinished download
async fn remove_leftovers(path: &Path) {
    for suffix in [".part", ".ytdl"] {
        let leftover = with_suffix(path, suffix);
        match tokio::fs::remove_file(&leftover).await {
            Ok(()) => debug!("Removed partial download {:?}", leftover),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove partial download {:?}: {}", leftover, e),
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Accept only absolute http(s) URLs
fn check_url(url: &str) -> Result<&str> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() && !url.chars().any(char::is_whitespace) => Ok(url),
        _ => Err(VidsageError::Validation(
            "Please enter a valid http(s) video URL.".to_string(),
        )),
    }
}
