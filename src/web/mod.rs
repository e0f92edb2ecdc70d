// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Web UI for vidsage

mod templates;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use minijinja::{context, Environment};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::pipeline::{AnalysisReport, Pipeline};
use crate::render::{render_markdown, FailureNotice};
use crate::stager::VideoUpload;
use crate::{Result, VidsageError};

/// Room for multipart framing and the text fields on top of the video
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Shared application state
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: Pipeline,
    templates: Environment<'static>,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: Pipeline) -> Result<Self> {
        Ok(Self {
            config,
            pipeline,
            templates: templates::environment()?,
        })
    }

    fn body_limit(&self) -> u64 {
        self.pipeline.stager().max_bytes() + MULTIPART_OVERHEAD
    }
}

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.body_limit()).unwrap_or(usize::MAX);

    Router::new()
        // Pages
        .route("/", get(index_page))
        .route("/analyze", post(analyze_page))
        // API endpoints
        .route("/api/analyze", post(api_analyze))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Form Input ===

/// Fields of the analysis form
#[derive(Debug, Default)]
struct AnalyzeForm {
    video: Option<VideoUpload>,
    url: Option<String>,
    question: String,
}

async fn read_form(state: &AppState, mut multipart: Multipart) -> Result<AnalyzeForm> {
    let mut form = AnalyzeForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(state, e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(|e| multipart_error(state, e))?;
                // Browsers send an empty part when no file was chosen.
                if !file_name.is_empty() || !data.is_empty() {
                    form.video = Some(VideoUpload::new(file_name, data));
                }
            }
            "url" => {
                let text = field.text().await.map_err(|e| multipart_error(state, e))?;
                if !text.trim().is_empty() {
                    form.url = Some(text);
                }
            }
            "question" => {
                form.question = field.text().await.map_err(|e| multipart_error(state, e))?;
            }
            other => warn!("Ignoring unexpected form field {:?}", other),
        }
    }

    Ok(form)
}

fn multipart_error(state: &AppState, e: MultipartError) -> VidsageError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        VidsageError::PayloadTooLarge(state.pipeline.stager().max_bytes())
    } else {
        VidsageError::Validation(format!("Malformed upload: {}", e.body_text()))
    }
}

/// Read the form and run whichever analysis it asks for
async fn analyze_form(
    state: &AppState,
    multipart: Multipart,
) -> (String, Result<AnalysisReport>) {
    let form = match read_form(state, multipart).await {
        Ok(form) => form,
        Err(e) => return (String::new(), Err(e)),
    };

    let report = match (form.video, form.url) {
        (Some(video), _) => state.pipeline.analyze_upload(video, &form.question).await,
        (None, Some(url)) => state.pipeline.analyze_url(&url, &form.question).await,
        (None, None) => Err(VidsageError::Validation(
            "Please upload a video file to analyze.".to_string(),
        )),
    };
    (form.question, report)
}

// === Page Handlers ===

async fn index_page(State(state): State<Arc<AppState>>) -> Response {
    render_page(&state, StatusCode::OK, PageResult::Empty, "")
}

async fn analyze_page(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let (question, report) = analyze_form(&state, multipart).await;

    match report {
        Ok(report) => match report.outcome {
            Ok(ref answer) => {
                info!(
                    "Answered {:?} about {} in {} ms",
                    report.question,
                    report.video_name,
                    report.elapsed_ms()
                );
                render_page(&state, StatusCode::OK, PageResult::Answer(&report, answer), &question)
            }
            Err(ref e) => render_page(&state, e.status_code(), PageResult::Failure(e), &question),
        },
        Err(e) => render_page(&state, e.status_code(), PageResult::Failure(&e), &question),
    }
}

// === API Handlers ===

#[derive(Serialize)]
struct AnalyzeResponse {
    answer: String,
    model: String,
    video: String,
    elapsed_ms: i64,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    headline: String,
    action: Option<String>,
}

async fn api_analyze(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let (_, report) = analyze_form(&state, multipart).await;

    let report = match report {
        Ok(report) => report,
        Err(e) => return api_error(&e),
    };

    match report.outcome {
        Ok(ref answer) => Json(AnalyzeResponse {
            answer: answer.clone(),
            model: report.model.clone(),
            video: report.video_name.clone(),
            elapsed_ms: report.elapsed_ms(),
        })
        .into_response(),
        Err(ref e) => api_error(e),
    }
}

fn api_error(err: &VidsageError) -> Response {
    let notice = FailureNotice::from_error(err);
    let body = ErrorResponse {
        error: notice.detail,
        headline: notice.headline,
        action: notice.action,
    };
    (err.status_code(), Json(body)).into_response()
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    model: String,
    max_bytes: u64,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.pipeline.analyst().name().to_string(),
        max_bytes: state.pipeline.stager().max_bytes(),
    })
}

// === Template Rendering ===

enum PageResult<'a> {
    Empty,
    Answer(&'a AnalysisReport, &'a str),
    Failure(&'a VidsageError),
}

fn render_page(
    state: &AppState,
    status: StatusCode,
    result: PageResult<'_>,
    question: &str,
) -> Response {
    let stager = state.pipeline.stager();
    let extensions = stager.allowed_extensions();
    let accept = extensions
        .iter()
        .map(|e| format!(".{}", e))
        .collect::<Vec<_>>()
        .join(",");

    let (answer_html, video_name, elapsed_ms, notice) = match result {
        PageResult::Empty => (None, None, None, None),
        PageResult::Answer(report, answer) => (
            Some(render_markdown(answer)),
            Some(report.video_name.clone()),
            Some(report.elapsed_ms()),
            None,
        ),
        PageResult::Failure(e) => (None, None, None, Some(FailureNotice::from_error(e))),
    };

    // Keep the question when the user has to resubmit.
    let question = if answer_html.is_some() { "" } else { question };

    let rendered = state
        .templates
        .get_template("index.html")
        .and_then(|t| {
            t.render(context! {
                title => "Analyze",
                model => state.pipeline.analyst().name(),
                question => question,
                answer_html => answer_html,
                video_name => video_name,
                elapsed_ms => elapsed_ms,
                notice => notice,
                accept => accept,
                accept_list => extensions.join(", "),
                max_mb => stager.max_bytes() / (1024 * 1024),
                url_enabled => state.pipeline.url_enabled(),
            })
        });

    match rendered {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("Template rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template rendering failed").into_response()
        }
    }
}

/// Start the web server
pub async fn start_server(config: AppConfig, pipeline: Pipeline) -> Result<()> {
    let addr = format!("{}:{}", config.web.host, config.web.port);
    let state = Arc::new(AppState::new(config, pipeline)?);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Web UI available at http://{}", addr);

    let router = create_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| VidsageError::Server(e.to_string()))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
