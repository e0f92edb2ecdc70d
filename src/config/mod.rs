// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for vidsage
//!
//! Non-secret settings live in a JSON file. The provider credential is read
//! once from the environment (after loading `.env`) and passed explicitly to
//! the analysis client.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Hosted model provider
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Upload limits and staging
    #[serde(default)]
    pub upload: UploadConfig,

    /// Prompt templates
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Web UI settings
    #[serde(default)]
    pub web: WebConfig,

    /// Video URL fetching
    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Delay between readiness checks of an uploaded video
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Upper bound on waiting for the provider to process a video
    #[serde(default = "default_processing_timeout")]
    pub processing_timeout_secs: u64,
    /// Let the model ground its answer with web search
    #[serde(default = "default_true")]
    pub web_search: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Directory for staged files; platform temp dir when unset
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    /// Analysis prompt; `{question}` is replaced by the user's question
    #[serde(default = "default_analysis_prompt")]
    pub analysis: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DownloadConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ytdlp")]
    pub ytdlp_path: String,
}

// Default value functions
fn default_base_url() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_model() -> String { "gemini-2.5-flash".to_string() }
fn default_api_key_env() -> String { "GOOGLE_API_KEY".to_string() }
fn default_timeout() -> u64 { 300 }
fn default_poll_interval() -> u64 { 2000 }
fn default_processing_timeout() -> u64 { 300 }
fn default_true() -> bool { true }
fn default_max_bytes() -> u64 { 200 * 1024 * 1024 }
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 8080 }
fn default_ytdlp() -> String { "yt-dlp".to_string() }

fn default_extensions() -> Vec<String> {
    vec!["mp4", "mov", "avi"].into_iter().map(String::from).collect()
}

fn default_analysis_prompt() -> String {
    "Analyze the uploaded video for content and context.\n\
     Respond to the following query using video insights and supplementary web research\n\
     {question}\n\n\
     Provide a detailed, user-friendly, and actionable response.".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            upload: UploadConfig::default(),
            prompt: PromptConfig::default(),
            web: WebConfig::default(),
            download: DownloadConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout(),
            poll_interval_ms: default_poll_interval(),
            processing_timeout_secs: default_processing_timeout(),
            web_search: true,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            allowed_extensions: default_extensions(),
            staging_dir: None,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            analysis: default_analysis_prompt(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ytdlp_path: default_ytdlp(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content).map_err(|e| {
                crate::VidsageError::Config(format!("Failed to parse config: {}", e))
            })?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that would make every request fail
    pub fn validate(&self) -> crate::Result<()> {
        let fail = |msg: &str| Err(crate::VidsageError::Config(msg.to_string()));

        if self.provider.model.trim().is_empty() {
            return fail("provider.model must not be empty");
        }
        if self.provider.poll_interval_ms == 0 {
            return fail("provider.poll_interval_ms must be greater than zero");
        }
        if self.upload.max_bytes == 0 {
            return fail("upload.max_bytes must be greater than zero");
        }
        if self.upload.allowed_extensions.is_empty() {
            return fail("upload.allowed_extensions must list at least one format");
        }
        if !self.prompt.analysis.contains("{question}") {
            return fail("prompt.analysis must contain a {question} placeholder");
        }
        Ok(())
    }

    /// Directory staged uploads are written to
    pub fn staging_dir(&self) -> PathBuf {
        self.upload
            .staging_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// API key for the model provider
///
/// `Debug` and `Display` never print the key itself.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read the key from the environment, loading `.env` first
    pub fn from_env(var: &str) -> crate::Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("Failed to load .env file: {}", e);
            }
        }
        Self::from_lookup(var, |name| std::env::var(name).ok())
    }

    /// Resolve the key through an arbitrary lookup (environment in production)
    pub fn from_lookup<F>(var: &str, lookup: F) -> crate::Result<Self>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        match lookup(var) {
            Some(key) if !key.trim().is_empty() => Ok(Self(key.trim().to_string())),
            _ => Err(crate::VidsageError::Config(format!(
                "{} environment variable not found! Please check your .env file.",
                var
            ))),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.upload.max_bytes, 200 * 1024 * 1024);
        assert_eq!(config.upload.allowed_extensions, vec!["mp4", "mov", "avi"]);
        assert_eq!(config.provider.poll_interval_ms, 2000);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidsage.json");
        std::fs::write(
            &path,
            r#"{"provider": {"model": "gemini-2.5-pro"}, "web": {"port": 9000}}"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.provider.model, "gemini-2.5-pro");
        assert_eq!(config.provider.api_key_env, "GOOGLE_API_KEY");
        assert_eq!(config.web.port, 9000);
        assert_eq!(config.web.host, "127.0.0.1");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.provider.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidsage.json");
        let mut config = AppConfig::default();
        config.upload.max_bytes = 1024;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.upload.max_bytes, 1024);
    }

    #[test]
    fn test_prompt_without_placeholder_rejected() {
        let mut config = AppConfig::default();
        config.prompt.analysis = "Describe the video".into();
        assert!(matches!(config.validate(), Err(crate::VidsageError::Config(_))));
    }

    #[test]
    fn test_missing_credential_is_config_error() {
        let err = Credential::from_lookup("GOOGLE_API_KEY", |_| None).unwrap_err();
        assert!(matches!(err, crate::VidsageError::Config(_)));
        assert!(err.to_string().contains("GOOGLE_API_KEY"));

        let blank = Credential::from_lookup("GOOGLE_API_KEY", |_| Some("  ".into()));
        assert!(blank.is_err());
    }

    #[test]
    fn test_credential_is_redacted() {
        let key = Credential::from_lookup("K", |_| Some("secret-key".into())).unwrap();
        assert_eq!(key.expose(), "secret-key");
        assert_eq!(format!("{:?}", key), "Credential(***)");
    }
}
