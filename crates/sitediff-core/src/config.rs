//! Run configuration
//!
//! [`CompareConfig`] is immutable for the duration of a run. Thresholds are
//! `Option`s: an unset threshold and a zero threshold mean different things.

use crate::error::CompareError;
use crate::raster_diff::RasterOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default report file name
pub const DEFAULT_REPORT_PATH: &str = "report.html";

/// Default artifact directory, colocated with the report
pub const DEFAULT_ARTIFACT_DIR: &str = "diff_output";

/// Comparison run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompareConfig {
    /// Maximum comparisons in flight
    pub concurrency: usize,
    /// Drop OK records whose score is at least `100 - mismatch_threshold`
    pub mismatch_threshold: Option<u32>,
    /// Write markup-diff artifacts above this HTML divergence (unset behaves as 0)
    pub html_threshold: Option<u32>,
    /// Write visual-diff artifacts above this pixel divergence (unset writes none)
    pub image_threshold: Option<u32>,
    /// Compare markup byte-for-byte, skipping normalization
    pub strict_markup: bool,
    /// Base URL of the reference variant, rewritten during normalization
    pub reference_base_url: Option<String>,
    /// Base URL of the candidate variant, rewritten during normalization
    pub candidate_base_url: Option<String>,
    /// Where the report is written
    pub output_path: PathBuf,
    /// Artifact directory name, relative to the report's directory
    pub artifact_dir_name: String,
    /// Pixel comparison tuning
    pub raster: RasterOptions,
}

impl CompareConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With concurrency bound
    #[inline]
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// With mismatch threshold
    #[inline]
    #[must_use]
    pub fn with_mismatch_threshold(mut self, threshold: u32) -> Self {
        self.mismatch_threshold = Some(threshold);
        self
    }

    /// With HTML threshold
    #[inline]
    #[must_use]
    pub fn with_html_threshold(mut self, threshold: u32) -> Self {
        self.html_threshold = Some(threshold);
        self
    }

    /// With image threshold
    #[inline]
    #[must_use]
    pub fn with_image_threshold(mut self, threshold: u32) -> Self {
        self.image_threshold = Some(threshold);
        self
    }

    /// With strict markup comparison
    #[inline]
    #[must_use]
    pub fn with_strict_markup(mut self, strict: bool) -> Self {
        self.strict_markup = strict;
        self
    }

    /// With base URLs of both variants
    #[inline]
    #[must_use]
    pub fn with_base_urls(
        mut self,
        reference: impl Into<String>,
        candidate: impl Into<String>,
    ) -> Self {
        self.reference_base_url = Some(reference.into());
        self.candidate_base_url = Some(candidate.into());
        self
    }

    /// With report output path
    #[inline]
    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// With raster options
    #[inline]
    #[must_use]
    pub fn with_raster(mut self, raster: RasterOptions) -> Self {
        self.raster = raster;
        self
    }

    /// Base URLs handed to the normalizer, unset ones skipped
    #[must_use]
    pub fn base_urls(&self) -> Vec<&str> {
        [&self.reference_base_url, &self.candidate_base_url]
            .into_iter()
            .filter_map(|url| url.as_deref())
            .collect()
    }

    /// HTML threshold applied by the report builder
    #[inline]
    #[must_use]
    pub fn effective_html_threshold(&self) -> u32 {
        self.html_threshold.unwrap_or(0)
    }

    /// Directory holding the report
    #[must_use]
    pub fn report_dir(&self) -> &Path {
        match self.output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Artifact directory, colocated with the report
    #[must_use]
    pub fn artifact_dir(&self) -> PathBuf {
        self.report_dir().join(&self.artifact_dir_name)
    }

    /// Check configuration before a run
    ///
    /// # Errors
    /// Returns `CompareError::InvalidConfig` for a zero concurrency bound,
    /// an empty artifact directory name or out-of-range raster options
    pub fn validate(&self) -> Result<(), CompareError> {
        if self.concurrency == 0 {
            return Err(CompareError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.artifact_dir_name.trim().is_empty() {
            return Err(CompareError::InvalidConfig(
                "artifact directory name must not be empty".to_string(),
            ));
        }
        self.raster.validate()
    }
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            mismatch_threshold: None,
            html_threshold: None,
            image_threshold: None,
            strict_markup: false,
            reference_base_url: None,
            candidate_base_url: None,
            output_path: PathBuf::from(DEFAULT_REPORT_PATH),
            artifact_dir_name: DEFAULT_ARTIFACT_DIR.to_string(),
            raster: RasterOptions::default(),
        }
    }
}

/// Host parallelism, or 4 when it cannot be determined
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().max(1))
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = CompareConfig::new();
        assert!(config.concurrency >= 1);
        assert_eq!(config.mismatch_threshold, None);
        assert_eq!(config.image_threshold, None);
        assert_eq!(config.effective_html_threshold(), 0);
        assert!(!config.strict_markup);
        assert_eq!(config.artifact_dir(), Path::new(".").join("diff_output"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_builder() {
        let config = CompareConfig::new()
            .with_concurrency(2)
            .with_mismatch_threshold(5)
            .with_html_threshold(3)
            .with_base_urls("https://prod.example", "https://test.example")
            .with_output_path("out/report.html");

        assert_eq!(config.concurrency, 2);
        assert_eq!(config.mismatch_threshold, Some(5));
        assert_eq!(config.effective_html_threshold(), 3);
        assert_eq!(
            config.base_urls(),
            vec!["https://prod.example", "https://test.example"]
        );
        assert_eq!(config.artifact_dir(), PathBuf::from("out/diff_output"));
    }

    #[test]
    fn zero_threshold_is_not_unset() {
        let config = CompareConfig::new().with_image_threshold(0);
        assert_eq!(config.image_threshold, Some(0));
        assert_ne!(config.image_threshold, CompareConfig::new().image_threshold);
    }

    #[test]
    fn zero_concurrency_rejected() {
        let config = CompareConfig::new().with_concurrency(0);
        assert!(matches!(
            config.validate(),
            Err(CompareError::InvalidConfig(_))
        ));
    }

    #[test]
    fn config_from_toml() {
        let config: CompareConfig = toml::from_str(
            r#"
            concurrency = 3
            image_threshold = 0
            strict_markup = true
            output_path = "reports/site.html"

            [raster]
            sensitivity = 0.2
            "#,
        )
        .unwrap();

        assert_eq!(config.concurrency, 3);
        assert_eq!(config.image_threshold, Some(0));
        assert_eq!(config.html_threshold, None);
        assert!(config.strict_markup);
        assert_eq!(config.artifact_dir(), PathBuf::from("reports/diff_output"));
        assert!((config.raster.sensitivity - 0.2).abs() < f64::EPSILON);
        assert!(config.raster.detect_antialiasing);
    }

    #[test]
    fn unknown_toml_keys_rejected() {
        assert!(toml::from_str::<CompareConfig>("mismatch = 5").is_err());
    }
}
