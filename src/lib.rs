// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! vidsage: Video Q&A through a hosted multimodal model
//!
//! Upload a short video, ask a question about it, and get the model's
//! answer rendered in a web UI. The video is staged to a temporary file for
//! the duration of one request and deleted afterwards.

pub mod analysis;
pub mod config;
pub mod download;
pub mod error;
pub mod gemini;
pub mod pipeline;
pub mod render;
pub mod stager;
pub mod web;

pub use config::{AppConfig, Credential};
pub use error::{Result, VidsageError};
