//! Site Diff Core - comparison and reporting engine
//!
//! Compares two renderings of the same page paths and reports how far
//! they diverge:
//! - Normalizes markup so environment-specific hosts and nonces do not count
//! - Scores markup divergence with a token-level diff
//! - Scores visual divergence with a perceptual pixel diff
//! - Runs comparisons over a bounded pool of tasks
//! - Persists diff artifacts and a deterministic HTML report
//!
//! # Example
//!
//! ```rust,ignore
//! use sitediff_core::{CompareConfig, Comparator, PageVariantSet};
//!
//! # async fn example(prod: PageVariantSet, next: PageVariantSet) -> Result<(), Box<dyn std::error::Error>> {
//! let config = CompareConfig::new()
//!     .with_mismatch_threshold(5)
//!     .with_image_threshold(1);
//! let summary = Comparator::new(config).run(&prod, &next, None).await?;
//!
//! println!("{} of {} pages reported", summary.retained, summary.compared);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod artifact;
pub mod config;
pub mod error;
pub mod event;
pub mod normalize;
pub mod pipeline;
pub mod raster_diff;
pub mod report;
pub mod text_diff;
pub mod types;

pub use artifact::{sanitize, ArtifactWriter};
pub use config::{default_concurrency, CompareConfig};
pub use error::{ArtifactError, CompareError, CompareResult, ScoreError, Side};
pub use event::{CompareEvent, EventSink, MemorySink, NullSink, TracingSink};
pub use normalize::{normalize, Normalizer};
pub use pipeline::{CompareRun, Comparator, RunSummary};
pub use raster_diff::{score_raster, Dimensions, RasterDiff, RasterOptions};
pub use report::{render_html, render_json, Thresholds};
pub use text_diff::{score_text, TextDiff};
pub use types::{match_score, CapturedPage, ComparisonRecord, ComparisonStatus, PageVariantSet};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running comparisons
    pub use crate::{
        CapturedPage, CompareConfig, CompareError, CompareEvent, Comparator, ComparisonRecord,
        ComparisonStatus, EventSink, PageVariantSet, RunSummary,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
