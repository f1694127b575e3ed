//! Core data model
//!
//! Defines the values that flow through a comparison run:
//! - Captured pages and the per-variant page sets
//! - Per-path comparison status
//! - The comparison record emitted once per path

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// A captured page: rendered markup plus an encoded screenshot
///
/// Produced by the capture layer; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPage {
    /// Rendered markup text
    pub markup: String,
    /// Encoded raster (PNG or JPEG bytes)
    pub raster: Vec<u8>,
}

impl CapturedPage {
    /// Create new captured page
    #[inline]
    #[must_use]
    pub fn new(markup: impl Into<String>, raster: impl Into<Vec<u8>>) -> Self {
        Self {
            markup: markup.into(),
            raster: raster.into(),
        }
    }
}

/// All captured pages of one variant, keyed by path
///
/// Pages are stored behind `Arc` so worker tasks can hold them without copying.
#[derive(Debug, Clone, Default)]
pub struct PageVariantSet {
    pages: BTreeMap<String, Arc<CapturedPage>>,
}

impl PageVariantSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert page for path, replacing any previous capture
    pub fn insert(&mut self, path: impl Into<String>, page: CapturedPage) {
        self.pages.insert(path.into(), Arc::new(page));
    }

    /// Builder-style insert
    #[inline]
    #[must_use]
    pub fn with_page(mut self, path: impl Into<String>, page: CapturedPage) -> Self {
        self.insert(path, page);
        self
    }

    /// Get page for path
    #[inline]
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Arc<CapturedPage>> {
        self.pages.get(path)
    }

    /// Check whether a path was captured
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.pages.contains_key(path)
    }

    /// Captured paths in sorted order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.pages.keys().map(String::as_str)
    }

    /// Number of captured pages
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Check if no page was captured
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl<P: Into<String>> FromIterator<(P, CapturedPage)> for PageVariantSet {
    fn from_iter<I: IntoIterator<Item = (P, CapturedPage)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (path, page) in iter {
            set.insert(path, page);
        }
        set
    }
}

/// Outcome class of one path's comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComparisonStatus {
    /// Both captures present and compared
    Ok,
    /// Path absent from the reference variant
    MissingOnReference,
    /// Path absent from the candidate variant
    MissingOnCandidate,
    /// Path absent from both variants
    MissingOnBoth,
    /// Comparison failed for this path (decode or artifact I/O)
    ComparisonError,
}

impl ComparisonStatus {
    /// Default note rendered for non-OK statuses
    #[must_use]
    pub fn default_note(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::MissingOnReference => "Missing on reference site",
            Self::MissingOnCandidate => "Missing on candidate site",
            Self::MissingOnBoth => "Missing on both sites",
            Self::ComparisonError => "Error comparing pages",
        }
    }

    /// Check if the path is missing from at least one variant
    #[inline]
    #[must_use]
    pub fn is_missing(self) -> bool {
        matches!(
            self,
            Self::MissingOnReference | Self::MissingOnCandidate | Self::MissingOnBoth
        )
    }

    /// All statuses in report order
    pub const ALL: [ComparisonStatus; 5] = [
        Self::Ok,
        Self::MissingOnReference,
        Self::MissingOnCandidate,
        Self::MissingOnBoth,
        Self::ComparisonError,
    ];
}

impl fmt::Display for ComparisonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ok => "OK",
            Self::MissingOnReference => "MissingOnReference",
            Self::MissingOnCandidate => "MissingOnCandidate",
            Self::MissingOnBoth => "MissingOnBoth",
            Self::ComparisonError => "ComparisonError",
        };
        f.write_str(label)
    }
}

/// Result of comparing one path
///
/// Created exactly once per path by the pipeline. Only the report builder
/// touches it afterwards, to attach a lazily written markup-diff artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    /// Compared path
    pub path: String,
    /// Combined similarity, 0..=100
    pub match_score: Option<u8>,
    /// Pixel divergence percent
    pub visual_diff_percent: Option<f64>,
    /// Token divergence percent of normalized markup
    pub html_diff_percent: Option<f64>,
    /// Outcome class
    pub status: ComparisonStatus,
    /// Human-readable note
    pub notes: String,
    /// Written visual-diff image
    pub visual_artifact: Option<PathBuf>,
    /// Written markup-diff document
    pub markup_artifact: Option<PathBuf>,
    /// Reference markup after normalization
    #[serde(skip)]
    pub normalized_reference_markup: Option<String>,
    /// Candidate markup after normalization
    #[serde(skip)]
    pub normalized_candidate_markup: Option<String>,
}

impl ComparisonRecord {
    /// Record for a path missing from one or both variants
    #[must_use]
    pub fn missing(path: impl Into<String>, status: ComparisonStatus) -> Self {
        debug_assert!(status.is_missing());
        Self::zeroed(path, status, status.default_note())
    }

    /// Record for a path whose comparison failed
    #[must_use]
    pub fn failed(path: impl Into<String>, note: impl Into<String>) -> Self {
        Self::zeroed(path, ComparisonStatus::ComparisonError, note)
    }

    fn zeroed(path: impl Into<String>, status: ComparisonStatus, note: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            match_score: Some(0),
            visual_diff_percent: None,
            html_diff_percent: None,
            status,
            notes: note.into(),
            visual_artifact: None,
            markup_artifact: None,
            normalized_reference_markup: None,
            normalized_candidate_markup: None,
        }
    }

    /// Check if both normalized markups are available
    #[inline]
    #[must_use]
    pub fn has_markup(&self) -> bool {
        self.normalized_reference_markup.is_some() && self.normalized_candidate_markup.is_some()
    }
}

/// Combine visual and structural divergence into a 0..=100 match score
///
/// Unweighted average of both similarities, rounded half away from zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn match_score(visual_diff_percent: f64, html_diff_percent: f64) -> u8 {
    let similarity = ((100.0 - visual_diff_percent) + (100.0 - html_diff_percent)) / 2.0;
    // Clamped to 0..=100 before the cast.
    similarity.round().clamp(0.0, 100.0) as u8
}
