use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::analysis::outliers::{DEFAULT_JOINT_MULTIPLIER, DEFAULT_THRESHOLD, OutlierParams};
use crate::editor::DEFAULT_PAGE_SIZE;
use crate::insight::client::LlmBackend;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "RUSTY_SCATTER_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "rusty-scatter.toml";

// ---------------------------------------------------------------------------
// Application configuration
// ---------------------------------------------------------------------------

/// Tunables, read from TOML. Every field has a default.
///
/// ```toml
/// [analysis]
/// threshold = 2.5
/// joint_multiplier = 1.4
/// inlier_sample_size = 10
///
/// [editor]
/// page_size = 10
///
/// [insight]
/// backend = "openai"
/// timeout_secs = 30
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub editor: EditorConfig,
    pub insight: InsightConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub threshold: f64,
    pub joint_multiplier: f64,
    /// Non-outlier rows sent along with the outliers for AI context.
    pub inlier_sample_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            joint_multiplier: DEFAULT_JOINT_MULTIPLIER,
            inlier_sample_size: 10,
        }
    }
}

impl AnalysisConfig {
    pub fn params(&self) -> OutlierParams {
        OutlierParams {
            threshold: self.threshold,
            joint_multiplier: self.joint_multiplier,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    pub page_size: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct InsightConfig {
    pub backend: LlmBackend,
    /// Overrides the backend's default model.
    pub model: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::default(),
            model: None,
            max_tokens: 1024,
            timeout_secs: 45,
        }
    }
}

impl InsightConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.backend.default_model())
    }
}

impl AppConfig {
    /// Parse a config file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config.validated())
    }

    /// Replace out-of-range values with their defaults, warning for each.
    pub fn validated(mut self) -> Self {
        let defaults = AnalysisConfig::default();
        let analysis = &mut self.analysis;
        if !is_positive(analysis.threshold) {
            log::warn!(
                "Config threshold {} must be finite and positive; using {}",
                analysis.threshold,
                defaults.threshold
            );
            analysis.threshold = defaults.threshold;
        }
        if !is_positive(analysis.joint_multiplier) {
            log::warn!(
                "Config joint_multiplier {} must be finite and positive; using {}",
                analysis.joint_multiplier,
                defaults.joint_multiplier
            );
            analysis.joint_multiplier = defaults.joint_multiplier;
        }
        if self.editor.page_size == 0 {
            log::warn!("Config page_size must be at least 1; using {DEFAULT_PAGE_SIZE}");
            self.editor.page_size = DEFAULT_PAGE_SIZE;
        }
        if self.insight.timeout_secs == 0 {
            let fallback = InsightConfig::default().timeout_secs;
            log::warn!("Config timeout_secs must be at least 1; using {fallback}");
            self.insight.timeout_secs = fallback;
        }
        self
    }

    /// Load from `$RUSTY_SCATTER_CONFIG`, else `./rusty-scatter.toml` if it
    /// exists, else defaults. A broken file is logged and ignored.
    pub fn load() -> Self {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()));

        let Some(path) = path else {
            return Self::default();
        };
        match Self::from_path(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Ignoring config: {e:#}");
                Self::default()
            }
        }
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.analysis.threshold, 2.5);
        assert_eq!(config.analysis.joint_multiplier, 1.4);
        assert_eq!(config.analysis.inlier_sample_size, 10);
        assert_eq!(config.editor.page_size, 10);
        assert_eq!(config.insight.backend, LlmBackend::Anthropic);
        assert_eq!(config.analysis.params(), OutlierParams::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[analysis]\nthreshold = 3.0\n\n[insight]\nbackend = \"openai\"\nmodel = \"gpt-4o-mini\""
        )
        .expect("write");

        let config = AppConfig::from_path(file.path()).expect("config parses");
        assert_eq!(config.analysis.threshold, 3.0);
        assert_eq!(config.analysis.joint_multiplier, 1.4);
        assert_eq!(config.editor.page_size, 10);
        assert_eq!(config.insight.backend, LlmBackend::OpenAi);
        assert_eq!(config.insight.model(), "gpt-4o-mini");
        assert_eq!(config.insight.timeout(), Duration::from_secs(45));
    }

    fn parse(text: &str) -> AppConfig {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{text}").expect("write");
        AppConfig::from_path(file.path()).expect("config parses")
    }

    #[test]
    fn test_zero_threshold_falls_back_to_default() {
        let config = parse("[analysis]\nthreshold = 0.0\njoint_multiplier = 2.0");
        assert_eq!(config.analysis.threshold, DEFAULT_THRESHOLD);
        assert_eq!(config.analysis.joint_multiplier, 2.0);
    }

    #[test]
    fn test_nan_and_negative_threshold_fall_back_to_default() {
        assert_eq!(parse("[analysis]\nthreshold = nan").analysis.threshold, DEFAULT_THRESHOLD);
        assert_eq!(parse("[analysis]\nthreshold = -3.0").analysis.threshold, DEFAULT_THRESHOLD);
        assert_eq!(parse("[analysis]\nthreshold = inf").analysis.threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_non_positive_joint_multiplier_falls_back_to_default() {
        let config = parse("[analysis]\nthreshold = 3.0\njoint_multiplier = -1.0");
        assert_eq!(config.analysis.threshold, 3.0);
        assert_eq!(config.analysis.joint_multiplier, DEFAULT_JOINT_MULTIPLIER);
        assert_eq!(
            parse("[analysis]\njoint_multiplier = 0.0").analysis.joint_multiplier,
            DEFAULT_JOINT_MULTIPLIER
        );
    }

    #[test]
    fn test_zero_timeout_and_page_size_fall_back_to_default() {
        let config = parse("[editor]\npage_size = 0\n\n[insight]\ntimeout_secs = 0");
        assert_eq!(config.insight.timeout(), Duration::from_secs(45));
        assert_eq!(config.editor.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_validated_keeps_sane_values() {
        let config = parse("[analysis]\nthreshold = 1.5\njoint_multiplier = 1.2\n\n[insight]\ntimeout_secs = 5");
        assert_eq!(config.analysis.params(), OutlierParams { threshold: 1.5, joint_multiplier: 1.2 });
        assert_eq!(config.insight.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[analysis]\nthreshold = \"high\"").expect("write");
        assert!(AppConfig::from_path(file.path()).is_err());
    }
}
