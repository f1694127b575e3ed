//! Report builder
//!
//! Renders retained records into a single self-contained HTML document with
//! relative links into the artifact directory. Output is a pure function of
//! the records and thresholds: rows are ordered by path and nothing
//! time-dependent is rendered, so re-running yields identical bytes.

use crate::artifact::ArtifactWriter;
use crate::config::CompareConfig;
use crate::error::{CompareError, CompareResult};
use crate::types::{ComparisonRecord, ComparisonStatus};
use htmlize::{escape_attribute, escape_text};
use std::fmt::Write as _;
use std::path::{Component, Path};

/// Thresholds shown in the report summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Thresholds {
    /// Markup divergence above which markup diffs are written
    pub html: u32,
    /// Visual divergence above which visual diffs were written
    pub image: Option<u32>,
    /// Mismatch threshold used to drop similar records
    pub mismatch: Option<u32>,
}

impl Thresholds {
    /// Thresholds in effect for a configuration
    #[must_use]
    pub fn from_config(config: &CompareConfig) -> Self {
        Self {
            html: config.effective_html_threshold(),
            image: config.image_threshold,
            mismatch: config.mismatch_threshold,
        }
    }
}

/// Sort records, write pending markup diffs and the report document
///
/// A markup diff that cannot be written leaves the record without a markup
/// artifact and adds the failure to its notes; the report is still built.
///
/// # Errors
/// Returns `CompareError::Report` if the report cannot be written
pub async fn build(
    records: &mut [ComparisonRecord],
    writer: &ArtifactWriter,
    output_path: &Path,
    thresholds: Thresholds,
) -> CompareResult<()> {
    records.sort_by(|a, b| a.path.cmp(&b.path));

    for record in records.iter_mut() {
        if !needs_markup_diff(record, thresholds.html) {
            continue;
        }
        if let (Some(reference), Some(candidate)) = (
            record.normalized_reference_markup.as_deref(),
            record.normalized_candidate_markup.as_deref(),
        ) {
            let written = writer
                .write_markup_diff(&record.path, reference, candidate)
                .await;
            match written {
                Ok(artifact) => {
                    tracing::debug!(path = %record.path, artifact = %artifact.display(), "markup diff written");
                    record.markup_artifact = Some(artifact);
                }
                Err(e) => {
                    tracing::warn!(path = %record.path, error = %e, "markup diff not written");
                    note_failure(record, &format!("Markup diff failed: {e}"));
                }
            }
        }
    }

    let report_dir = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    tokio::fs::create_dir_all(report_dir)
        .await
        .map_err(|e| CompareError::report(output_path, e))?;

    let document = render_html(records, report_dir, thresholds);
    tokio::fs::write(output_path, document)
        .await
        .map_err(|e| CompareError::report(output_path, e))?;

    tracing::info!(report = %output_path.display(), records = records.len(), "report written");
    Ok(())
}

fn note_failure(record: &mut ComparisonRecord, note: &str) {
    if record.notes == "OK" {
        record.notes = note.to_string();
    } else {
        record.notes.push_str("; ");
        record.notes.push_str(note);
    }
}

fn needs_markup_diff(record: &ComparisonRecord, html_threshold: u32) -> bool {
    record.status == ComparisonStatus::Ok
        && record.markup_artifact.is_none()
        && record.has_markup()
        && record
            .html_diff_percent
            .is_some_and(|percent| percent > f64::from(html_threshold))
}

/// Render the report document
///
/// Records are rendered in the given order; artifact links are made
/// relative to `report_dir`.
#[must_use]
pub fn render_html(records: &[ComparisonRecord], report_dir: &Path, thresholds: Thresholds) -> String {
    let mut rows = String::new();
    for record in records {
        render_row(&mut rows, record, report_dir);
    }

    let mut summary = String::new();
    let _ = write!(summary, "{} pages reported", records.len());
    for status in ComparisonStatus::ALL {
        let count = records.iter().filter(|r| r.status == status).count();
        if count > 0 {
            let _ = write!(summary, ", {count} {status}");
        }
    }

    let mut applied = format!("HTML threshold {}%", thresholds.html);
    if let Some(image) = thresholds.image {
        let _ = write!(applied, ", image threshold {image}%");
    }
    if let Some(mismatch) = thresholds.mismatch {
        let _ = write!(applied, ", mismatch threshold {mismatch}%");
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <title>Site Diff Report</title>
  <style>
    body {{ font-family: sans-serif; }}
    table {{ border-collapse: collapse; width: 100%; }}
    th, td {{ padding: 8px 12px; border: 1px solid #ccc; }}
    th {{ background-color: #eee; }}
    tr.missing td {{ background-color: #fff4d6; }}
    tr.error td {{ background-color: #fbe0e0; }}
  </style>
</head>
<body>
  <h1>Site Diff Report</h1>
  <p class="summary">{summary}</p>
  <p class="thresholds">{applied}</p>
  <table>
    <thead>
      <tr>
        <th>Path</th>
        <th>Match Score</th>
        <th>Visual Diff</th>
        <th>HTML Diff</th>
        <th>Status</th>
        <th>Notes</th>
        <th>Visual Artifact</th>
        <th>Markup Artifact</th>
      </tr>
    </thead>
    <tbody>
{rows}    </tbody>
  </table>
</body>
</html>
"#,
        summary = escape_text(summary),
        applied = escape_text(applied),
    )
}

fn render_row(out: &mut String, record: &ComparisonRecord, report_dir: &Path) {
    let class = match record.status {
        ComparisonStatus::Ok => "ok",
        ComparisonStatus::ComparisonError => "error",
        _ => "missing",
    };
    let path = escape_attribute(record.path.as_str());
    let score = record
        .match_score
        .map_or_else(|| "N/A".to_string(), |score| format!("{score}%"));

    let visual = match &record.visual_artifact {
        Some(artifact) => {
            let href = escape_attribute(relative_link(report_dir, artifact));
            format!(r#"<a href="{href}"><img src="{href}" width="200" alt="visual diff"/></a>"#)
        }
        None => "N/A".to_string(),
    };
    let markup = match &record.markup_artifact {
        Some(artifact) => {
            let href = escape_attribute(relative_link(report_dir, artifact));
            format!(r#"<a href="{href}">markup diff</a>"#)
        }
        None => "N/A".to_string(),
    };

    let _ = writeln!(
        out,
        r#"      <tr class="{class}">
        <td><a href="{path}" target="_blank">{label}</a></td>
        <td>{score}</td>
        <td>{visual_percent}</td>
        <td>{html_percent}</td>
        <td>{status}</td>
        <td>{notes}</td>
        <td>{visual}</td>
        <td>{markup}</td>
      </tr>"#,
        label = escape_text(record.path.as_str()),
        visual_percent = percent_cell(record.visual_diff_percent),
        html_percent = percent_cell(record.html_diff_percent),
        status = record.status,
        notes = escape_text(record.notes.as_str()),
    );
}

fn percent_cell(percent: Option<f64>) -> String {
    percent.map_or_else(|| "N/A".to_string(), |p| format!("{p:.2}%"))
}

/// Render retained records as pretty JSON
///
/// # Errors
/// Returns `CompareError::Serialize` if serialization fails
pub fn render_json(records: &[ComparisonRecord]) -> CompareResult<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Link from a directory to a file, using forward slashes
///
/// Falls back to the target as given when either path cannot be made
/// absolute.
#[must_use]
pub fn relative_link(from_dir: &Path, target: &Path) -> String {
    let (Ok(from), Ok(to)) = (std::path::absolute(from_dir), std::path::absolute(target)) else {
        return join_slashed(target.components());
    };

    let from: Vec<Component<'_>> = from
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let to: Vec<Component<'_>> = to
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let shared = from
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - shared];
    parts.extend(
        to[shared..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

fn join_slashed<'a>(components: impl Iterator<Item = Component<'a>>) -> String {
    components
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn ok_record(path: &str, html: f64) -> ComparisonRecord {
        ComparisonRecord {
            path: path.to_string(),
            match_score: Some(90),
            visual_diff_percent: Some(0.0),
            html_diff_percent: Some(html),
            status: ComparisonStatus::Ok,
            notes: "OK".to_string(),
            visual_artifact: None,
            markup_artifact: None,
            normalized_reference_markup: Some("<a>prod</a>".to_string()),
            normalized_candidate_markup: Some("<a>test</a>".to_string()),
        }
    }

    #[test]
    fn relative_links_use_forward_slashes() {
        let link = relative_link(Path::new("/srv/out"), Path::new("/srv/out/diff_output/_diff.png"));
        assert_eq!(link, "diff_output/_diff.png");

        let up = relative_link(Path::new("/srv/out/reports"), Path::new("/srv/out/diff_output/a.png"));
        assert_eq!(up, "../diff_output/a.png");
    }

    #[test]
    fn relative_links_from_current_dir() {
        let link = relative_link(Path::new("."), Path::new("diff_output/x_diff.png"));
        assert_eq!(link, "diff_output/x_diff.png");
    }

    #[test]
    fn rows_escape_user_text() {
        let mut record = ComparisonRecord::failed("/q?a=<b>", "boom <script>");
        record.visual_artifact = Some(PathBuf::from("/r/diff_output/q_diff.png"));
        let html = render_html(&[record], Path::new("/r"), Thresholds::default());

        assert!(html.contains("/q?a=&lt;b&gt;"));
        assert!(html.contains("boom &lt;script&gt;"));
        assert!(html.contains(r#"src="diff_output/q_diff.png""#));
        assert!(html.contains("1 pages reported, 1 ComparisonError"));
    }

    #[test]
    fn render_is_deterministic() {
        let records = [ok_record("/a", 10.0), ok_record("/b", 0.0)];
        let thresholds = Thresholds {
            html: 0,
            image: Some(5),
            mismatch: None,
        };
        let first = render_html(&records, Path::new("/r"), thresholds);
        let second = render_html(&records, Path::new("/r"), thresholds);
        assert_eq!(first, second);
        assert!(first.contains("HTML threshold 0%, image threshold 5%"));
    }

    #[test]
    fn json_omits_normalized_markup() {
        let json = render_json(&[ok_record("/", 1.0)]).unwrap();
        assert!(json.contains(r#""path": "/""#));
        assert!(!json.contains("prod"));
    }

    #[tokio::test]
    async fn build_sorts_and_gates_markup_diffs() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("report.html");
        let writer = ArtifactWriter::new(tmp.path().join("diff_output"), ["/a", "/b", "/c"]);
        let mut records = vec![
            ok_record("/c", 0.0),
            ok_record("/a", 53.3),
            ok_record("/b", 3.0),
        ];
        let thresholds = Thresholds {
            html: 5,
            ..Thresholds::default()
        };

        build(&mut records, &writer, &out, thresholds).await.unwrap();

        let paths: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, ["/a", "/b", "/c"]);
        assert!(records[0].markup_artifact.as_ref().is_some_and(|p| p.exists()));
        assert!(records[1].markup_artifact.is_none());
        assert!(records[2].markup_artifact.is_none());

        let html = std::fs::read_to_string(&out).unwrap();
        assert!(html.contains(r#"href="diff_output/a_html_diff.html""#));
    }

    #[tokio::test]
    async fn markup_diff_failure_stays_on_its_record() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("report.html");
        let dir = tmp.path().join("diff_output");
        let writer = ArtifactWriter::new(&dir, ["/a", "/b"]);
        std::fs::create_dir_all(dir.join("a_html_diff.html")).unwrap();

        let mut records = vec![ok_record("/a", 20.0), ok_record("/b", 20.0)];
        build(&mut records, &writer, &out, Thresholds::default()).await.unwrap();

        assert!(records[0].markup_artifact.is_none());
        assert!(records[0].notes.starts_with("Markup diff failed"));
        assert_eq!(records[0].status, ComparisonStatus::Ok);
        assert!(records[1].markup_artifact.as_ref().is_some_and(|p| p.exists()));
        assert!(out.exists());
    }

    #[tokio::test]
    async fn build_overwrites_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("report.html");
        std::fs::write(&out, "stale").unwrap();
        let writer = ArtifactWriter::new(tmp.path().join("diff_output"), ["/"]);

        let mut records = vec![ok_record("/", 20.0)];
        build(&mut records, &writer, &out, Thresholds::default()).await.unwrap();
        let first = std::fs::read(&out).unwrap();
        build(&mut records, &writer, &out, Thresholds::default()).await.unwrap();
        let second = std::fs::read(&out).unwrap();

        assert_eq!(first, second);
        assert!(!String::from_utf8_lossy(&first).contains("stale"));
    }
}
