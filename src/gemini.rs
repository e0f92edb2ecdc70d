// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Gemini API client for hosted video understanding
//!
//! One analysis is upload, wait until the provider reports the file
//! `ACTIVE`, a single `generateContent` call, then deletion of the remote
//! copy. Nothing is retried.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::analysis::{build_prompt, Question, VideoAnalyst};
use crate::config::{AppConfig, Credential};
use crate::stager::StagedVideo;
use crate::{Result, VidsageError};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    base_url: String,
    credential: Credential,
    model: String,
    prompt_template: String,
    poll_interval: Duration,
    processing_timeout: Duration,
    web_search: bool,
}

/// Lifecycle state of an uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    #[default]
    StateUnspecified,
    Processing,
    Active,
    Failed,
    #[serde(other)]
    Unknown,
}

/// File resource as returned by the Files API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub state: FileState,
}

#[derive(Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Serialize)]
struct UploadStart<'a> {
    file: UploadMetadata<'a>,
}

#[derive(Serialize)]
struct UploadMetadata<'a> {
    display_name: &'a str,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    File { file_data: FileData<'a> },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiStatus,
}

#[derive(Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
    status: Option<String>,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: &AppConfig, credential: Credential) -> Result<Self> {
        let provider = &config.provider;
        let client = Client::builder()
            .timeout(Duration::from_secs(provider.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            credential,
            model: provider.model.clone(),
            prompt_template: config.prompt.analysis.clone(),
            poll_interval: Duration::from_millis(provider.poll_interval_ms),
            processing_timeout: Duration::from_secs(provider.processing_timeout_secs),
            web_search: provider.web_search,
        })
    }

    /// List model ids available to this key
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1beta/models?pageSize=1000", self.base_url);

        let response = self.client
            .get(&url)
            .header(API_KEY_HEADER, self.credential.expose())
            .send()
            .await?;

        let models: ModelsResponse = check_status(response).await?.json().await?;
        Ok(models
            .models
            .into_iter()
            .map(|m| m.name.trim_start_matches("models/").to_string())
            .collect())
    }

    /// Upload a staged video with the resumable upload protocol
    pub async fn upload_file(&self, video: &StagedVideo) -> Result<RemoteFile> {
        let url = format!("{}/upload/v1beta/files", self.base_url);

        debug!("Starting upload of {} ({} bytes)", video.display_name(), video.size());

        let response = self.client
            .post(&url)
            .header(API_KEY_HEADER, self.credential.expose())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", video.size().to_string())
            .header("X-Goog-Upload-Header-Content-Type", video.mime_type())
            .json(&UploadStart {
                file: UploadMetadata {
                    display_name: video.display_name(),
                },
            })
            .send()
            .await?;

        let response = check_status(response).await?;
        let upload_url = response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| VidsageError::EmptyResponse(
                "upload session did not return an upload URL".to_string(),
            ))?;

        let data = tokio::fs::read(video.path()).await?;

        let response = self.client
            .post(&upload_url)
            .header(API_KEY_HEADER, self.credential.expose())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(data)
            .send()
            .await?;

        let uploaded: UploadResponse = check_status(response).await?.json().await?;
        info!("Uploaded {} as {}", video.display_name(), uploaded.file.name);
        Ok(uploaded.file)
    }

    /// Fetch the current metadata of an uploaded file
    pub async fn get_file(&self, name: &str) -> Result<RemoteFile> {
        let url = format!("{}/v1beta/{}", self.base_url, name);

        let response = self.client
            .get(&url)
            .header(API_KEY_HEADER, self.credential.expose())
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    /// Poll until the provider has finished processing `file`
    pub async fn wait_until_active(&self, mut file: RemoteFile) -> Result<RemoteFile> {
        let started = Instant::now();

        loop {
            match file.state {
                FileState::Processing => {}
                FileState::Failed => return Err(VidsageError::ProcessingFailed),
                _ => return Ok(file),
            }

            if started.elapsed() >= self.processing_timeout {
                return Err(VidsageError::ProcessingTimeout(self.processing_timeout.as_secs()));
            }

            debug!("Waiting for {} to finish processing", file.name);
            tokio::time::sleep(self.poll_interval).await;
            file = self.get_file(&file.name).await?;
        }
    }

    /// Ask the model about an active file
    pub async fn generate(&self, file: &RemoteFile, prompt: &str) -> Result<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::File {
                        file_data: FileData {
                            mime_type: &file.mime_type,
                            file_uri: &file.uri,
                        },
                    },
                    Part::Text { text: prompt },
                ],
            }],
            tools: if self.web_search {
                vec![Tool { google_search: GoogleSearch {} }]
            } else {
                Vec::new()
            },
        };

        debug!("Sending request to Gemini: model={}", self.model);

        let response = self.client
            .post(&url)
            .header(API_KEY_HEADER, self.credential.expose())
            .json(&request)
            .send()
            .await?;

        let result: GenerateResponse = check_status(response).await?.json().await?;
        extract_text(result)
    }

    /// Delete an uploaded file from the provider
    pub async fn delete_file(&self, name: &str) -> Result<()> {
        let url = format!("{}/v1beta/{}", self.base_url, name);

        let response = self.client
            .delete(&url)
            .header(API_KEY_HEADER, self.credential.expose())
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl VideoAnalyst for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn analyze(&self, video: &StagedVideo, question: &Question) -> Result<String> {
        let prompt = build_prompt(&self.prompt_template, question);
        let uploaded = self.upload_file(video).await?;

        let result = async {
            let active = self.wait_until_active(uploaded.clone()).await?;
            self.generate(&active, &prompt).await
        }
        .await;

        if let Err(e) = self.delete_file(&uploaded.name).await {
            warn!("Could not delete server file {}: {}", uploaded.name, e);
        }

        result
    }
}

/// Turn a non-success response into a provider error
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(provider_error(status, &body))
}

fn provider_error(status: StatusCode, body: &str) -> VidsageError {
    let canonical = status.canonical_reason().unwrap_or("").to_string();
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => VidsageError::Provider {
            status: status.as_u16(),
            reason: envelope.error.status.unwrap_or(canonical),
            message: envelope.error.message,
        },
        Err(_) => VidsageError::Provider {
            status: status.as_u16(),
            reason: canonical,
            message: body.trim().to_string(),
        },
    }
}

fn extract_text(response: GenerateResponse) -> Result<String> {
    let candidate = response.candidates.into_iter().next();
    let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());

    let text: String = candidate
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }

    let detail = match (response.prompt_feedback.and_then(|f| f.block_reason), finish_reason) {
        (Some(reason), _) => format!("prompt blocked ({})", reason),
        (None, Some(reason)) => format!("generation finished with {}", reason),
        (None, None) => "no candidates in response".to_string(),
    };
    Err(VidsageError::EmptyResponse(detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stager::{Stager, VideoUpload};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, web_search: bool) -> GeminiClient {
        let mut config = AppConfig::default();
        config.provider.base_url = server.uri();
        config.provider.poll_interval_ms = 10;
        config.provider.processing_timeout_secs = 5;
        config.provider.web_search = web_search;
        GeminiClient::new(&config, Credential::new("test-key")).unwrap()
    }

    fn staged(dir: &std::path::Path) -> StagedVideo {
        let allowed = vec!["mp4".to_string()];
        Stager::new(dir, 1024, &allowed)
            .stage(&VideoUpload::new("clip.mp4", vec![9u8; 32]))
            .unwrap()
    }

    fn file_json(state: &str) -> serde_json::Value {
        json!({
            "name": "files/abc123",
            "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc123",
            "mimeType": "video/mp4",
            "state": state
        })
    }

    async fn mount_upload(server: &MockServer, state: &str) {
        Mock::given(method("POST"))
            .and(path("/upload/v1beta/files"))
            .and(header("x-goog-upload-command", "start"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(
                ResponseTemplate::new(200).insert_header(
                    "x-goog-upload-url",
                    format!("{}/upload-session/1", server.uri()),
                ),
            )
            .expect(1)
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/upload-session/1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "file": file_json(state) })),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_delete(server: &MockServer) {
        Mock::given(method("DELETE"))
            .and(path("/v1beta/files/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_analyze_full_sequence() {
        let server = MockServer::start().await;
        mount_upload(&server, "PROCESSING").await;

        Mock::given(method("GET"))
            .and(path("/v1beta/files/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file_json("ACTIVE")))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [
                        { "text": "thinking...", "thought": true },
                        { "text": "A cat " },
                        { "text": "plays **piano**." }
                    ]},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        mount_delete(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let video = staged(dir.path());
        let client = client_for(&server, true);
        let question = Question::new("What is happening in this video?").unwrap();

        let answer = client.analyze(&video, &question).await.unwrap();
        assert_eq!(answer, "A cat plays **piano**.");

        let requests = server.received_requests().await.unwrap();
        let generate = requests
            .iter()
            .find(|r| r.url.path().ends_with(":generateContent"))
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&generate.body).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["file_data"]["file_uri"], file_json("ACTIVE")["uri"]);
        assert_eq!(parts[0]["file_data"]["mime_type"], "video/mp4");
        assert!(parts[1]["text"].as_str().unwrap().contains("What is happening in this video?"));
        assert!(body["tools"][0]["google_search"].is_object());

        let upload = requests.iter().find(|r| r.url.path() == "/upload-session/1").unwrap();
        assert_eq!(upload.body, vec![9u8; 32]);
    }

    #[tokio::test]
    async fn test_web_search_can_be_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, false);
        let file: RemoteFile = serde_json::from_value(file_json("ACTIVE")).unwrap();
        assert_eq!(client.generate(&file, "prompt").await.unwrap(), "ok");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("tools").is_none());
    }

    #[tokio::test]
    async fn test_processing_failure_still_deletes_remote_file() {
        let server = MockServer::start().await;
        mount_upload(&server, "PROCESSING").await;

        Mock::given(method("GET"))
            .and(path("/v1beta/files/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file_json("FAILED")))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        mount_delete(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let video = staged(dir.path());
        let client = client_for(&server, true);
        let question = Question::new("Summarize").unwrap();

        let err = client.analyze(&video, &question).await.unwrap_err();
        assert!(matches!(err, VidsageError::ProcessingFailed));
    }

    #[tokio::test]
    async fn test_processing_timeout_still_deletes_remote_file() {
        let server = MockServer::start().await;
        mount_upload(&server, "PROCESSING").await;

        Mock::given(method("GET"))
            .and(path("/v1beta/files/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file_json("PROCESSING")))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        mount_delete(&server).await;

        let mut config = AppConfig::default();
        config.provider.base_url = server.uri();
        config.provider.poll_interval_ms = 10;
        config.provider.processing_timeout_secs = 1;
        let client = GeminiClient::new(&config, Credential::new("test-key")).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let video = staged(dir.path());
        let question = Question::new("Summarize").unwrap();

        let err = client.analyze(&video, &question).await.unwrap_err();
        assert!(matches!(err, VidsageError::ProcessingTimeout(1)));
    }

    #[tokio::test]
    async fn test_failed_remote_delete_keeps_answer() {
        let server = MockServer::start().await;
        mount_upload(&server, "ACTIVE").await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "Two people shake hands." }] },
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/v1beta/files/abc123"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": { "code": 500, "message": "Internal error", "status": "INTERNAL" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let video = staged(dir.path());
        let client = client_for(&server, true);
        let question = Question::new("What happens?").unwrap();

        let answer = client.analyze(&video, &question).await.unwrap();
        assert_eq!(answer, "Two people shake hands.");
    }

    #[tokio::test]
    async fn test_permission_denied_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/v1beta/files"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": 403,
                    "message": "The caller does not have permission",
                    "status": "PERMISSION_DENIED"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let video = staged(dir.path());
        let client = client_for(&server, true);
        let question = Question::new("Summarize").unwrap();

        match client.analyze(&video, &question).await {
            Err(VidsageError::Provider { status, reason, message }) => {
                assert_eq!(status, 403);
                assert_eq!(reason, "PERMISSION_DENIED");
                assert_eq!(message, "The caller does not have permission");
            }
            other => panic!("Expected provider error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, true);
        let file: RemoteFile = serde_json::from_value(file_json("ACTIVE")).unwrap();
        let err = client.generate(&file, "prompt").await.unwrap_err();
        assert!(matches!(err, VidsageError::EmptyResponse(ref d) if d.contains("SAFETY")));
    }

    #[tokio::test]
    async fn test_list_models_strips_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [
                    { "name": "models/gemini-2.5-flash" },
                    { "name": "models/gemini-2.5-pro" }
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, true);
        assert_eq!(client.list_models().await.unwrap(), vec!["gemini-2.5-flash", "gemini-2.5-pro"]);
    }

    #[test]
    fn test_non_json_error_body() {
        let err = provider_error(StatusCode::SERVICE_UNAVAILABLE, "upstream overloaded\n");
        match err {
            VidsageError::Provider { status, reason, message } => {
                assert_eq!(status, 503);
                assert_eq!(reason, "Service Unavailable");
                assert_eq!(message, "upstream overloaded");
            }
            other => panic!("Expected provider error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_file_state_deserializes() {
        let file: RemoteFile =
            serde_json::from_value(json!({ "name": "files/x", "state": "ARCHIVED" })).unwrap();
        assert_eq!(file.state, FileState::Unknown);
        let file: RemoteFile = serde_json::from_value(json!({ "name": "files/x" })).unwrap();
        assert_eq!(file.state, FileState::StateUnspecified);
    }
}
