// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Video analysis through a hosted multimodal model

use async_trait::async_trait;

use crate::stager::StagedVideo;
use crate::{Result, VidsageError};

/// A non-empty question about a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// Trim the user's text; blank input is a validation error
    pub fn new(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VidsageError::Validation(
                "Please enter a question or insight to analyze the video.".to_string(),
            ));
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Trait for services that answer questions about a staged video
#[async_trait]
pub trait VideoAnalyst: Send + Sync {
    /// Model or service name, shown in the UI
    fn name(&self) -> &str;

    /// Answer `question` about `video`, returning the model's text verbatim
    async fn analyze(&self, video: &StagedVideo, question: &Question) -> Result<String>;
}

/// Fill the analysis template with the user's question
pub fn build_prompt(template: &str, question: &Question) -> String {
    template.replace("{question}", question.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_question_rejected() {
        assert!(matches!(Question::new(""), Err(VidsageError::Validation(_))));
        assert!(matches!(Question::new(" \n\t "), Err(VidsageError::Validation(_))));
    }

    #[test]
    fn test_question_is_trimmed() {
        let q = Question::new("  What is happening in this video?\n").unwrap();
        assert_eq!(q.as_str(), "What is happening in this video?");
    }

    #[test]
    fn test_build_prompt() {
        let q = Question::new("Who are the speakers?").unwrap();
        let template = crate::config::PromptConfig::default().analysis;
        let prompt = build_prompt(&template, &q);

        assert!(prompt.starts_with("Analyze the uploaded video for content and context."));
        assert!(prompt.contains("supplementary web research\nWho are the speakers?\n"));
        assert!(!prompt.contains("{question}"));
    }
}
