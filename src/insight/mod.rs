//! AI-generated commentary on detected outliers.
//!
//! The analysis core only sees the [`InsightProvider`] trait: it hands over a
//! bounded sample of rows and gets back an [`Insight`] or an error. The
//! bundled [`LlmInsightProvider`] talks to a hosted LLM (BYOK, keys read from
//! the environment); tests substitute their own providers.
//!
//! # Environment Variables
//!
//! - `ANTHROPIC_API_KEY`: Required for the Anthropic backend
//! - `OPENAI_API_KEY`: Required for the OpenAI backend

pub mod client;
mod prompt;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::InsightConfig;
use crate::data::model::Row;

pub use client::LlmInsightProvider;

/// Errors that can occur while fetching an insight
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InsightError {
    #[error("Missing API key: {env_var} not set")]
    MissingApiKey { env_var: String },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error("no response within {after:?}")]
    Timeout { after: Duration },
}

pub type InsightResult<T> = Result<T, InsightError>;

// ---------------------------------------------------------------------------
// Request / response payloads
// ---------------------------------------------------------------------------

/// What the provider gets to see: outlier rows plus a few inliers.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightRequest {
    pub rows: Vec<Row>,
    pub columns: Vec<String>,
    /// Positions in the full dataset, not in `rows`.
    pub outlier_indices: Vec<usize>,
    pub x_field: String,
    pub y_field: String,
}

/// Narrative produced for one analysis state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub summary: String,
    pub outlier_analysis: String,
    #[serde(default)]
    pub actionable_insights: Vec<String>,
}

impl Insight {
    /// Stand-in shown when the provider fails, so the panel always has content.
    pub fn fallback(error: &InsightError) -> Self {
        Self {
            summary: "AI insights are currently unavailable.".to_string(),
            outlier_analysis: format!("The insight request failed: {error}"),
            actionable_insights: vec![
                "Check that the API key is set and the service is reachable.".to_string(),
                "Request the insights again.".to_string(),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Provider seam
// ---------------------------------------------------------------------------

/// Anything that can turn an [`InsightRequest`] into an [`Insight`].
///
/// Called from a worker thread; implementations may block.
pub trait InsightProvider: Send + Sync {
    fn generate(&self, request: &InsightRequest) -> InsightResult<Insight>;
}

/// Provider used when no credentials are configured: always fails.
struct MissingCredentials {
    env_var: String,
}

impl InsightProvider for MissingCredentials {
    fn generate(&self, _request: &InsightRequest) -> InsightResult<Insight> {
        Err(InsightError::MissingApiKey {
            env_var: self.env_var.clone(),
        })
    }
}

/// Build the configured LLM provider, or a failing one if its key is unset.
pub fn provider_from_env(config: &InsightConfig) -> Arc<dyn InsightProvider> {
    match LlmInsightProvider::from_env(config) {
        Ok(provider) => {
            log::info!("AI insights via {:?} ({})", config.backend, config.model());
            Arc::new(provider)
        }
        Err(InsightError::MissingApiKey { env_var }) => {
            log::warn!("{env_var} not set; AI insights disabled");
            Arc::new(MissingCredentials { env_var })
        }
        Err(e) => {
            log::warn!("AI insights disabled: {e}");
            Arc::new(MissingCredentials {
                env_var: config.backend.env_key().to_string(),
            })
        }
    }
}
