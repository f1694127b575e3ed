//! Diff artifact persistence
//!
//! Writes visual-diff images and markup-diff documents into the artifact
//! directory. File names are derived from the page path:
//!
//! ```text
//! /Blog/Post-1?x=2  ->  blog_post_1_x_2_diff.png
//!                       blog_post_1_x_2_html_diff.html
//! ```
//!
//! Sanitizing is many-to-one, so the writer is built from the full path
//! universe and paths that share a stem get a short content hash appended.
//! The choice only depends on the set of paths, never on write order.

use crate::error::ArtifactError;
use crate::text_diff::{DiffTag, TextDiff};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

/// Suffix of visual-diff images
pub const VISUAL_DIFF_SUFFIX: &str = "_diff.png";

/// Suffix of markup-diff documents
pub const MARKUP_DIFF_SUFFIX: &str = "_html_diff.html";

/// Sanitize a page path into a file stem
///
/// Leading slashes are stripped, every non-alphanumeric char becomes `_`,
/// and the result is lowercased.
#[must_use]
pub fn sanitize(path: &str) -> String {
    path.trim_start_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// Writer for per-path diff artifacts
#[derive(Debug)]
pub struct ArtifactWriter {
    dir: PathBuf,
    /// Stem -> the only path producing it
    owners: HashMap<String, String>,
    /// Stems produced by more than one path
    shared: HashSet<String>,
    ready: OnceCell<()>,
}

impl ArtifactWriter {
    /// Create writer for a directory and the paths it will serve
    pub fn new<'a>(dir: impl Into<PathBuf>, paths: impl IntoIterator<Item = &'a str>) -> Self {
        let mut owners: HashMap<String, String> = HashMap::new();
        let mut shared = HashSet::new();

        for path in paths {
            let stem = sanitize(path);
            match owners.get(&stem) {
                Some(owner) if owner != path => {
                    shared.insert(stem);
                }
                Some(_) => {}
                None => {
                    owners.insert(stem, path.to_string());
                }
            }
        }

        Self {
            dir: dir.into(),
            owners,
            shared,
            ready: OnceCell::new(),
        }
    }

    /// Artifact directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the artifact directory if missing
    ///
    /// Runs at most once per writer; concurrent callers wait for the first.
    ///
    /// # Errors
    /// Returns the IO error if the directory cannot be created
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        self.ready
            .get_or_try_init(|| tokio::fs::create_dir_all(&self.dir))
            .await
            .map(|_| ())
    }

    /// Collision-free file stem for a path
    #[must_use]
    pub fn file_stem(&self, path: &str) -> String {
        let stem = sanitize(path);
        let clashes = self.shared.contains(&stem)
            || self.owners.get(&stem).is_some_and(|owner| owner != path);
        if clashes {
            let hash = blake3::hash(path.as_bytes());
            format!("{stem}_{}", hex::encode(&hash.as_bytes()[..4]))
        } else {
            stem
        }
    }

    /// Target location of a path's visual diff
    #[must_use]
    pub fn visual_diff_path(&self, path: &str) -> PathBuf {
        self.dir
            .join(format!("{}{VISUAL_DIFF_SUFFIX}", self.file_stem(path)))
    }

    /// Target location of a path's markup diff
    #[must_use]
    pub fn markup_diff_path(&self, path: &str) -> PathBuf {
        self.dir
            .join(format!("{}{MARKUP_DIFF_SUFFIX}", self.file_stem(path)))
    }

    /// Persist a PNG-encoded visual diff
    ///
    /// # Errors
    /// Returns `ArtifactError::Io` if the directory or file cannot be written
    pub async fn write_visual_diff(&self, path: &str, png: &[u8]) -> Result<PathBuf, ArtifactError> {
        let target = self.visual_diff_path(path);
        self.write_atomic(&target, png).await?;
        Ok(target)
    }

    /// Render and persist the markup diff of two normalized texts
    ///
    /// The token diff is computed on a blocking thread.
    ///
    /// # Errors
    /// Returns `ArtifactError::Io` if the directory or file cannot be written
    pub async fn write_markup_diff(
        &self,
        path: &str,
        reference: &str,
        candidate: &str,
    ) -> Result<PathBuf, ArtifactError> {
        let target = self.markup_diff_path(path);
        let (owned_path, a, b) = (path.to_string(), reference.to_string(), candidate.to_string());
        let document = tokio::task::spawn_blocking(move || render_markup_diff(&owned_path, &a, &b))
            .await
            .map_err(|e| ArtifactError::io_error(&target, std::io::Error::other(e.to_string())))?;
        self.write_atomic(&target, document.as_bytes()).await?;
        Ok(target)
    }

    /// Write through a temporary sibling so readers never see partial files
    async fn write_atomic(&self, target: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
        self.ensure_dir()
            .await
            .map_err(|e| ArtifactError::io_error(&self.dir, e))?;

        let mut partial = target.as_os_str().to_owned();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        if let Err(e) = tokio::fs::write(&partial, bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(ArtifactError::io_error(&partial, e));
        }
        tokio::fs::rename(&partial, target)
            .await
            .map_err(|e| ArtifactError::io_error(target, e))
    }
}

/// Render a standalone HTML document visualising the token diff
#[must_use]
pub fn render_markup_diff(path: &str, reference: &str, candidate: &str) -> String {
    let diff = TextDiff::compute(reference, candidate);
    let title = htmlize::escape_text(path);

    let mut body = String::new();
    for op in diff.ops() {
        let text = htmlize::escape_text(op.text.as_str());
        let _ = match op.tag {
            DiffTag::Equal => write!(body, "{text}"),
            DiffTag::Insert => write!(body, "<ins>{text}</ins>"),
            DiffTag::Delete => write!(body, "<del>{text}</del>"),
        };
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <title>Markup diff: {title}</title>
  <style>
    body {{ font-family: sans-serif; }}
    pre {{ white-space: pre-wrap; word-break: break-all; font-family: monospace; }}
    ins {{ background-color: #d4f8d4; text-decoration: none; }}
    del {{ background-color: #f8d4d4; }}
  </style>
</head>
<body>
  <h1>Markup diff: {title}</h1>
  <p>{percent:.2}% of markup differs (<del>reference only</del>, <ins>candidate only</ins>)</p>
  <pre>{body}</pre>
</body>
</html>
"#,
        percent = diff.percent(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_rules() {
        assert_eq!(sanitize("/"), "");
        assert_eq!(sanitize("//Blog/Post-1?x=2"), "blog_post_1_x_2");
        assert_eq!(sanitize("/a.b"), "a_b");
    }

    #[test]
    fn unique_paths_keep_plain_names() {
        let writer = ArtifactWriter::new("out", ["/", "/about"]);
        assert_eq!(writer.visual_diff_path("/"), Path::new("out/_diff.png"));
        assert_eq!(
            writer.markup_diff_path("/about"),
            Path::new("out/about_html_diff.html")
        );
    }

    #[test]
    fn colliding_paths_disambiguated() {
        let writer = ArtifactWriter::new("out", ["/a-b", "/a_b", "/a.b", "/c"]);
        let names: HashSet<String> = ["/a-b", "/a_b", "/a.b"]
            .iter()
            .map(|p| writer.file_stem(p))
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.iter().all(|n| n.starts_with("a_b_")));
        assert_eq!(writer.file_stem("/c"), "c");
    }

    #[test]
    fn naming_independent_of_order() {
        let forward = ArtifactWriter::new("out", ["/x-y", "/x_y"]);
        let backward = ArtifactWriter::new("out", ["/x_y", "/x-y"]);
        assert_eq!(forward.file_stem("/x-y"), backward.file_stem("/x-y"));
        assert_eq!(forward.file_stem("/x_y"), backward.file_stem("/x_y"));
    }

    #[test]
    fn unknown_path_clashing_with_known_stem_is_hashed() {
        let writer = ArtifactWriter::new("out", ["/a-b"]);
        assert_eq!(writer.file_stem("/a-b"), "a_b");
        assert_ne!(writer.file_stem("/a.b"), "a_b");
    }

    #[test]
    fn markup_diff_escapes_and_marks_changes() {
        let doc = render_markup_diff("/p?q=<x>", "<a>prod</a>", "<a>test</a>");
        assert!(doc.contains("<del>prod</del>"));
        assert!(doc.contains("<ins>test</ins>"));
        assert!(doc.contains("&lt;a&gt;"));
        assert!(doc.contains("/p?q=&lt;x&gt;"));
    }

    #[tokio::test]
    async fn writes_are_atomic_and_dir_created_once() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("diff_output");
        let writer = ArtifactWriter::new(&dir, ["/"]);

        let (a, b) = tokio::join!(writer.ensure_dir(), writer.ensure_dir());
        assert!(a.is_ok() && b.is_ok());

        let written = writer.write_visual_diff("/", b"png-bytes").await.unwrap();
        assert_eq!(written, dir.join("_diff.png"));
        assert_eq!(std::fs::read(&written).unwrap(), b"png-bytes");
        assert!(!dir.join("_diff.png.partial").exists());
    }
}
