// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Rendering of answers and failures for the UI

use pulldown_cmark::{html, Event, Options, Parser};
use serde::Serialize;

use crate::VidsageError;

/// Render model output as HTML; raw HTML in the text is shown escaped
pub fn render_markdown(text: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let parser = Parser::new_ext(text, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// A failure as presented to the user
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailureNotice {
    /// One-line summary
    pub headline: String,
    /// Description of the underlying error
    pub detail: String,
    /// What the user should do next, if anything specific
    pub action: Option<String>,
    /// Whether this is a warning about the submission rather than a failure
    pub warning: bool,
}

impl FailureNotice {
    pub fn from_error(err: &VidsageError) -> Self {
        let detail = err.to_string();

        if err.is_user_error() {
            return Self {
                headline: detail.clone(),
                detail,
                action: None,
                warning: true,
            };
        }

        if is_permission_denied(err, &detail) {
            return Self {
                headline: "Analysis failed due to PERMISSION DENIED (403).".to_string(),
                detail,
                action: Some(
                    "Verify your Google Cloud billing status and API key restrictions.".to_string(),
                ),
                warning: false,
            };
        }

        if detail.contains("contents are required") {
            return Self {
                headline: "Analysis failed: The video upload failed entirely.".to_string(),
                detail,
                action: Some("Check the provider error above and try uploading again.".to_string()),
                warning: false,
            };
        }

        Self {
            headline: format!("Analysis failed: {}", detail),
            detail,
            action: None,
            warning: false,
        }
    }
}

fn is_permission_denied(err: &VidsageError, detail: &str) -> bool {
    match err {
        VidsageError::Provider { status, reason, .. } => {
            *status == 403 || reason == "PERMISSION_DENIED"
        }
        _ => detail.contains("403") || detail.contains("PERMISSION_DENIED"),
    }
}
