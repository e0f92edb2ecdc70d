// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Request lifecycle: validate, stage, analyze, clean up
//!
//! Each request moves through `Idle -> Staged -> AwaitingResponse ->
//! (Rendered | Errored) -> Cleaned`. The staged file is consumed by
//! [`run_analysis`], so it is deleted on every path out of a request.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analysis::{Question, VideoAnalyst};
use crate::download::UrlFetcher;
use crate::stager::{StagedVideo, Stager, VideoUpload};
use crate::{Result, VidsageError};

/// Where a request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestState {
    Idle,
    Staged,
    AwaitingResponse,
    Rendered,
    Errored,
    Cleaned,
}

/// Outcome of one analysis attempt
#[derive(Debug)]
pub struct AnalysisReport {
    pub video_name: String,
    pub question: String,
    pub model: String,
    /// Model text, or the error that ended the attempt
    pub outcome: Result<String>,
    /// State reached before cleanup (`Rendered` or `Errored`)
    pub terminal_state: RequestState,
    /// Whether the local staged file was deleted without error
    pub cleaned_up: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

fn transition(id: &str, from: RequestState, to: RequestState) -> RequestState {
    debug!("request {}: {:?} -> {:?}", id, from, to);
    to
}

/// Ask `analyst` about a staged video, then delete the staged file
pub async fn run_analysis(
    analyst: &dyn VideoAnalyst,
    video: StagedVideo,
    question: &Question,
) -> AnalysisReport {
    let started_at = Utc::now();
    let id = video.id().to_string();
    let video_name = video.display_name().to_string();

    let state = transition(&id, RequestState::Staged, RequestState::AwaitingResponse);
    info!("Analyzing {} with {}", video_name, analyst.name());

    let outcome = analyst.analyze(&video, question).await;
    let terminal_state = match &outcome {
        Ok(_) => transition(&id, state, RequestState::Rendered),
        Err(e) => {
            warn!("Analysis of {} failed: {}", video_name, e);
            transition(&id, state, RequestState::Errored)
        }
    };

    let cleaned_up = match video.cleanup() {
        Ok(()) => true,
        Err(e) => {
            warn!("Could not delete staged file for {}: {}", video_name, e);
            false
        }
    };
    transition(&id, terminal_state, RequestState::Cleaned);

    AnalysisReport {
        video_name,
        question: question.as_str().to_string(),
        model: analyst.name().to_string(),
        outcome,
        terminal_state,
        cleaned_up,
        started_at,
        finished_at: Utc::now(),
    }
}

/// Everything a request needs, shared by the web UI and the CLI
#[derive(Clone)]
pub struct Pipeline {
    stager: Stager,
    fetcher: UrlFetcher,
    analyst: Arc<dyn VideoAnalyst>,
}

impl Pipeline {
    pub fn new(stager: Stager, fetcher: UrlFetcher, analyst: Arc<dyn VideoAnalyst>) -> Self {
        Self { stager, fetcher, analyst }
    }

    pub fn stager(&self) -> &Stager {
        &self.stager
    }

    pub fn analyst(&self) -> &dyn VideoAnalyst {
        self.analyst.as_ref()
    }

    pub fn url_enabled(&self) -> bool {
        self.fetcher.enabled()
    }

    /// Validate and stage an upload, then analyze it
    ///
    /// `Err` means the request was rejected before anything was sent to the
    /// provider; remote failures are in [`AnalysisReport::outcome`].
    pub async fn analyze_upload(
        &self,
        upload: VideoUpload,
        question: &str,
    ) -> Result<AnalysisReport> {
        let question = Question::new(question)?;
        self.stager.check(&upload)?;

        let stager = self.stager.clone();
        let staged = tokio::task::spawn_blocking(move || stager.stage(&upload))
            .await
            .map_err(|e| VidsageError::Server(format!("Staging task failed: {}", e)))??;

        Ok(run_analysis(self.analyst.as_ref(), staged, &question).await)
    }

    /// Download a video by URL, then analyze it
    pub async fn analyze_url(&self, url: &str, question: &str) -> Result<AnalysisReport> {
        let question = Question::new(question)?;
        let staged = self.fetcher.fetch(url, &self.stager).await?;
        Ok(run_analysis(self.analyst.as_ref(), staged, &question).await)
    }

    /// Analyze a video already on disk; it is copied into staging first
    pub async fn analyze_path(&self, path: &Path, question: &str) -> Result<AnalysisReport> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let size = tokio::fs::metadata(path).await?.len();
        Question::new(question)?;
        self.stager.check_size(size)?;

        let data = tokio::fs::read(path).await?;
        self.analyze_upload(VideoUpload::new(file_name, data), question).await
    }
}
