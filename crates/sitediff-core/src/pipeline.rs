//! Comparison pipeline
//!
//! Fans the path universe out over a bounded pool of tokio tasks:
//! - one task per path, admitted by a semaphore sized by `concurrency`
//! - normalization, diffing and PNG encoding on the blocking pool
//! - artifact writes on the async runtime
//! - results land in one slot per path, read after every task joined
//!
//! Per-path failures are converted into `ComparisonError` records. Only
//! run-level failures (artifact directory, report) surface as errors.

use crate::artifact::ArtifactWriter;
use crate::config::CompareConfig;
use crate::error::{ArtifactError, CompareError, CompareResult, ScoreError};
use crate::event::{CompareEvent, EventSink, TracingSink};
use crate::normalize::Normalizer;
use crate::raster_diff::{encode_png, score_raster, RasterDiff};
use crate::report::{self, Thresholds};
use crate::text_diff::score_text;
use crate::types::{match_score, CapturedPage, ComparisonRecord, ComparisonStatus, PageVariantSet};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Drives comparisons of two page variant sets
#[derive(Clone)]
pub struct Comparator {
    config: Arc<CompareConfig>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Comparator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Comparator {
    /// Create new comparator reporting through `tracing`
    #[inline]
    #[must_use]
    pub fn new(config: CompareConfig) -> Self {
        Self {
            config: Arc::new(config),
            sink: Arc::new(TracingSink),
        }
    }

    /// Route events to a custom sink
    #[inline]
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CompareConfig {
        &self.config
    }

    /// Compare every path of the universe
    ///
    /// `paths` defaults to the sorted union of both sets' keys. Explicit
    /// lists are de-duplicated, keeping the first occurrence.
    ///
    /// # Errors
    /// - `CompareError::InvalidConfig` if the configuration is rejected
    /// - `CompareError::OutputDir` if the artifact directory cannot be created
    pub async fn compare(
        &self,
        reference: &PageVariantSet,
        candidate: &PageVariantSet,
        paths: Option<Vec<String>>,
    ) -> CompareResult<CompareRun> {
        self.config.validate()?;

        let universe = path_universe(reference, candidate, paths);
        let writer = Arc::new(ArtifactWriter::new(
            self.config.artifact_dir(),
            universe.iter().map(String::as_str),
        ));
        writer
            .ensure_dir()
            .await
            .map_err(|e| CompareError::output_dir(writer.dir(), e))?;

        let concurrency = self.config.concurrency;
        self.sink.emit(&CompareEvent::Started {
            total: universe.len(),
            concurrency,
        });

        let shared = Arc::new(TaskContext {
            normalizer: Normalizer::new(&self.config.base_urls(), self.config.strict_markup),
            config: Arc::clone(&self.config),
            writer: Arc::clone(&writer),
            sink: Arc::clone(&self.sink),
        });
        let permits = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();

        for (index, path) in universe.iter().enumerate() {
            let job = PathJob {
                path: path.clone(),
                reference: reference.get(path).cloned(),
                candidate: candidate.get(path).cloned(),
            };
            let ctx = Arc::clone(&shared);
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                let record = match permits.acquire_owned().await {
                    Ok(_permit) => ctx.compare_path(job).await,
                    Err(_) => ComparisonRecord::failed(job.path, "Comparison pool closed"),
                };
                (index, record)
            });
        }

        let mut slots: Vec<Option<ComparisonRecord>> = vec![None; universe.len()];
        // A task that panicked leaves its slot empty
        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, record)) = joined {
                slots[index] = Some(record);
            }
        }

        let compared = slots.len();
        let mut records = Vec::with_capacity(compared);
        for (slot, path) in slots.into_iter().zip(&universe) {
            let record = slot.unwrap_or_else(|| {
                let error = "comparison task panicked".to_string();
                self.sink.emit(&CompareEvent::Failed {
                    path: path.clone(),
                    error: error.clone(),
                });
                ComparisonRecord::failed(path.as_str(), format!("Error comparing pages: {error}"))
            });

            if self.is_filtered(&record) {
                self.sink.emit(&CompareEvent::Filtered {
                    path: record.path.clone(),
                    match_score: record.match_score.unwrap_or(0),
                });
                continue;
            }
            records.push(record);
        }

        self.sink.emit(&CompareEvent::Finished {
            compared,
            retained: records.len(),
        });

        Ok(CompareRun {
            records,
            artifacts: writer,
            thresholds: Thresholds::from_config(&self.config),
            compared,
        })
    }

    /// Compare and write the report to `config.output_path`
    ///
    /// # Errors
    /// Any error of [`Comparator::compare`] or [`CompareRun::write_report`]
    pub async fn run(
        &self,
        reference: &PageVariantSet,
        candidate: &PageVariantSet,
        paths: Option<Vec<String>>,
    ) -> CompareResult<RunSummary> {
        let mut run = self.compare(reference, candidate, paths).await?;
        let report_path = run
            .write_report(&self.config.output_path, self.config.effective_html_threshold())
            .await?;
        Ok(run.summary(report_path))
    }

    /// Check whether an OK record is too similar to report
    fn is_filtered(&self, record: &ComparisonRecord) -> bool {
        if record.status != ComparisonStatus::Ok {
            return false;
        }
        match (self.config.mismatch_threshold, record.match_score) {
            (Some(threshold), Some(score)) => i64::from(score) >= 100 - i64::from(threshold),
            _ => false,
        }
    }
}

/// Build the ordered, duplicate-free path universe
fn path_universe(
    reference: &PageVariantSet,
    candidate: &PageVariantSet,
    paths: Option<Vec<String>>,
) -> Vec<String> {
    match paths {
        Some(list) => {
            let mut seen = HashSet::with_capacity(list.len());
            list.into_iter()
                .filter(|path| seen.insert(path.clone()))
                .collect()
        }
        None => {
            let mut union: Vec<String> = reference
                .paths()
                .chain(candidate.paths())
                .map(str::to_string)
                .collect();
            union.sort();
            union.dedup();
            union
        }
    }
}

/// Inputs of one path task
struct PathJob {
    path: String,
    reference: Option<Arc<CapturedPage>>,
    candidate: Option<Arc<CapturedPage>>,
}

/// State shared read-only by all tasks of a run
struct TaskContext {
    normalizer: Normalizer,
    config: Arc<CompareConfig>,
    writer: Arc<ArtifactWriter>,
    sink: Arc<dyn EventSink>,
}

/// CPU-side result of scoring one pair
struct Scored {
    reference_markup: String,
    candidate_markup: String,
    html_percent: f64,
    raster: RasterDiff,
    png: Option<Vec<u8>>,
}

impl TaskContext {
    async fn compare_path(&self, job: PathJob) -> ComparisonRecord {
        let PathJob {
            path,
            reference,
            candidate,
        } = job;

        let (reference, candidate) = match (reference, candidate) {
            (Some(reference), Some(candidate)) => (reference, candidate),
            (None, None) => return self.missing(path, ComparisonStatus::MissingOnBoth),
            (None, Some(_)) => return self.missing(path, ComparisonStatus::MissingOnReference),
            (Some(_), None) => return self.missing(path, ComparisonStatus::MissingOnCandidate),
        };

        self.sink.emit(&CompareEvent::Comparing { path: path.clone() });
        match self.score_pair(&path, reference, candidate).await {
            Ok(record) => record,
            Err(e) => {
                self.sink.emit(&CompareEvent::Failed {
                    path: path.clone(),
                    error: e.to_string(),
                });
                ComparisonRecord::failed(path, format!("Error comparing pages: {e}"))
            }
        }
    }

    fn missing(&self, path: String, status: ComparisonStatus) -> ComparisonRecord {
        self.sink.emit(&CompareEvent::Missing {
            path: path.clone(),
            status,
        });
        ComparisonRecord::missing(path, status)
    }

    async fn score_pair(
        &self,
        path: &str,
        reference: Arc<CapturedPage>,
        candidate: Arc<CapturedPage>,
    ) -> Result<ComparisonRecord, ScoreError> {
        let normalizer = self.normalizer.clone();
        let options = self.config.raster;
        let image_threshold = self.config.image_threshold;

        let scored = tokio::task::spawn_blocking(move || -> Result<Scored, ScoreError> {
            let reference_markup = normalizer.normalize(&reference.markup);
            let candidate_markup = normalizer.normalize(&candidate.markup);
            let html_percent = score_text(&reference_markup, &candidate_markup);

            let raster = score_raster(&reference.raster, &candidate.raster, &options)?;
            let png = match (image_threshold, &raster.image) {
                (Some(threshold), Some(image)) if raster.percent > f64::from(threshold) => {
                    Some(encode_png(image).map_err(ArtifactError::from)?)
                }
                _ => None,
            };

            Ok(Scored {
                reference_markup,
                candidate_markup,
                html_percent,
                raster,
                png,
            })
        })
        .await
        .map_err(|e| ScoreError::Task(e.to_string()))??;

        if let Some((reference, candidate)) = scored.raster.size_mismatch {
            self.sink.emit(&CompareEvent::SizeMismatch {
                path: path.to_string(),
                reference,
                candidate,
            });
        }

        let visual_percent = scored.raster.percent;
        let visual_artifact = match scored.png {
            Some(png) => {
                let artifact = self.writer.write_visual_diff(path, &png).await?;
                self.sink.emit(&CompareEvent::ArtifactWritten {
                    path: path.to_string(),
                    artifact: artifact.clone(),
                });
                Some(artifact)
            }
            None => None,
        };

        let notes = if visual_artifact.is_some() {
            format!("Visual diff: {visual_percent:.2}% mismatch")
        } else {
            "OK".to_string()
        };

        Ok(ComparisonRecord {
            path: path.to_string(),
            match_score: Some(match_score(visual_percent, scored.html_percent)),
            visual_diff_percent: Some(visual_percent),
            html_diff_percent: Some(scored.html_percent),
            status: ComparisonStatus::Ok,
            notes,
            visual_artifact,
            markup_artifact: None,
            normalized_reference_markup: Some(scored.reference_markup),
            normalized_candidate_markup: Some(scored.candidate_markup),
        })
    }
}

/// Outcome of a comparison, before the report is written
#[derive(Debug)]
pub struct CompareRun {
    /// Retained records in universe order
    pub records: Vec<ComparisonRecord>,
    artifacts: Arc<ArtifactWriter>,
    thresholds: Thresholds,
    compared: usize,
}

impl CompareRun {
    /// Writer owning the artifact directory of this run
    #[inline]
    #[must_use]
    pub fn artifacts(&self) -> &ArtifactWriter {
        &self.artifacts
    }

    /// Number of paths compared before filtering
    #[inline]
    #[must_use]
    pub fn compared(&self) -> usize {
        self.compared
    }

    /// Consume into the retained records
    #[inline]
    #[must_use]
    pub fn into_records(self) -> Vec<ComparisonRecord> {
        self.records
    }

    /// Build the HTML report at `output_path`
    ///
    /// Records are sorted by path; markup diffs above `html_threshold` are
    /// written on demand.
    ///
    /// A markup diff that cannot be written is noted on its record.
    ///
    /// # Errors
    /// Returns `CompareError::Report` if the report cannot be written
    pub async fn write_report(
        &mut self,
        output_path: &Path,
        html_threshold: u32,
    ) -> CompareResult<PathBuf> {
        let thresholds = Thresholds {
            html: html_threshold,
            ..self.thresholds
        };
        report::build(&mut self.records, &self.artifacts, output_path, thresholds).await?;
        Ok(output_path.to_path_buf())
    }

    /// Summarize the retained records
    #[must_use]
    pub fn summary(&self, report_path: PathBuf) -> RunSummary {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        RunSummary {
            report_path,
            compared: self.compared,
            retained: self.records.len(),
            counts,
        }
    }
}

/// Totals of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Written report
    pub report_path: PathBuf,
    /// Paths compared
    pub compared: usize,
    /// Records kept after the mismatch threshold
    pub retained: usize,
    /// Retained records per status
    pub counts: BTreeMap<ComparisonStatus, usize>,
}

impl RunSummary {
    /// Retained records with the given status
    #[must_use]
    pub fn count(&self, status: ComparisonStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::MemorySink;

    fn page(markup: &str, raster: &[u8]) -> CapturedPage {
        CapturedPage::new(markup, raster.to_vec())
    }

    fn comparator(dir: &Path, config: CompareConfig) -> (Comparator, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let comparator = Comparator::new(config.with_output_path(dir.join("report.html")))
            .with_sink(Arc::clone(&sink) as Arc<dyn EventSink>);
        (comparator, sink)
    }

    #[test]
    fn universe_defaults_to_sorted_union() {
        let a = PageVariantSet::new()
            .with_page("/b", page("", b""))
            .with_page("/a", page("", b""));
        let b = PageVariantSet::new()
            .with_page("/c", page("", b""))
            .with_page("/a", page("", b""));
        assert_eq!(path_universe(&a, &b, None), ["/a", "/b", "/c"]);
    }

    #[test]
    fn explicit_universe_deduplicated_in_order() {
        let empty = PageVariantSet::new();
        let list = vec!["/z".to_string(), "/a".to_string(), "/z".to_string()];
        assert_eq!(path_universe(&empty, &empty, Some(list)), ["/z", "/a"]);
    }

    #[tokio::test]
    async fn missing_pages_become_records() {
        let tmp = tempfile::tempdir().unwrap();
        let (comparator, sink) = comparator(tmp.path(), CompareConfig::new().with_concurrency(2));
        let reference = PageVariantSet::new().with_page("/only-ref", page("x", b"raw"));
        let candidate = PageVariantSet::new().with_page("/only-cand", page("x", b"raw"));
        let paths = vec![
            "/only-ref".to_string(),
            "/only-cand".to_string(),
            "/nowhere".to_string(),
        ];

        let run = comparator
            .compare(&reference, &candidate, Some(paths))
            .await
            .unwrap();

        let statuses: Vec<_> = run.records.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            [
                ComparisonStatus::MissingOnCandidate,
                ComparisonStatus::MissingOnReference,
                ComparisonStatus::MissingOnBoth,
            ]
        );
        assert!(run.records.iter().all(|r| r.match_score == Some(0)));
        assert_eq!(run.records[2].notes, "Missing on both sites");
        assert_eq!(sink.count(|e| matches!(e, CompareEvent::Missing { .. })), 3);
    }

    #[tokio::test]
    async fn identical_pages_score_full_match() {
        let tmp = tempfile::tempdir().unwrap();
        let (comparator, _) = comparator(tmp.path(), CompareConfig::new().with_image_threshold(0));
        let reference = PageVariantSet::new().with_page("/", page("<p>same</p>", b"not-an-image"));
        let candidate = reference.clone();

        let run = comparator.compare(&reference, &candidate, None).await.unwrap();

        let record = &run.records[0];
        assert_eq!(record.status, ComparisonStatus::Ok);
        assert_eq!(record.match_score, Some(100));
        assert_eq!(record.visual_diff_percent, Some(0.0));
        assert_eq!(record.html_diff_percent, Some(0.0));
        assert_eq!(record.notes, "OK");
        assert!(record.visual_artifact.is_none());
    }

    #[tokio::test]
    async fn undecodable_screenshot_is_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let (comparator, sink) = comparator(tmp.path(), CompareConfig::new());
        let reference = PageVariantSet::new()
            .with_page("/bad", page("a", b"garbage-a"))
            .with_page("/good", page("a", b"same"));
        let candidate = PageVariantSet::new()
            .with_page("/bad", page("a", b"garbage-b"))
            .with_page("/good", page("a", b"same"));

        let run = comparator.compare(&reference, &candidate, None).await.unwrap();

        assert_eq!(run.records.len(), 2);
        let bad = &run.records[0];
        assert_eq!(bad.status, ComparisonStatus::ComparisonError);
        assert_eq!(bad.match_score, Some(0));
        assert!(bad.notes.contains("reference"));
        assert_eq!(run.records[1].status, ComparisonStatus::Ok);
        assert_eq!(sink.count(|e| matches!(e, CompareEvent::Failed { .. })), 1);
    }

    #[tokio::test]
    async fn zero_concurrency_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let (comparator, _) = comparator(tmp.path(), CompareConfig::new().with_concurrency(0));
        let empty = PageVariantSet::new();
        let err = comparator.compare(&empty, &empty, None).await.unwrap_err();
        assert!(matches!(err, CompareError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn unwritable_output_dir_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let (comparator, _) = comparator(&blocker, CompareConfig::new());
        let empty = PageVariantSet::new();

        let err = comparator.compare(&empty, &empty, None).await.unwrap_err();
        assert!(matches!(err, CompareError::OutputDir { .. }));
    }

    #[tokio::test]
    async fn summary_counts_statuses() {
        let tmp = tempfile::tempdir().unwrap();
        let (comparator, _) = comparator(tmp.path(), CompareConfig::new());
        let reference = PageVariantSet::new()
            .with_page("/", page("a", b"px"))
            .with_page("/gone", page("a", b"px"));
        let candidate = PageVariantSet::new().with_page("/", page("a", b"px"));

        let summary = comparator.run(&reference, &candidate, None).await.unwrap();

        assert_eq!(summary.compared, 2);
        assert_eq!(summary.retained, 2);
        assert_eq!(summary.count(ComparisonStatus::Ok), 1);
        assert_eq!(summary.count(ComparisonStatus::MissingOnCandidate), 1);
        assert!(summary.report_path.exists());
    }
}
