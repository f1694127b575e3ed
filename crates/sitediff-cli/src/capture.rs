//! Capture directories written by the page fetcher
//!
//! A capture directory holds a `pages.json` manifest mapping each page path
//! to its files, relative to the directory:
//!
//! ```json
//! { "/about": { "markup": "about.html", "screenshot": "about.png" } }
//! ```

use anyhow::Context as _;
use serde::Deserialize;
use sitediff_core::{CapturedPage, PageVariantSet};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Manifest file name inside a capture directory
pub(crate) const MANIFEST_FILE: &str = "pages.json";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestEntry {
    markup: PathBuf,
    screenshot: PathBuf,
}

/// Load every page listed in a capture directory's manifest
///
/// Pages whose files cannot be read are skipped with a warning and so
/// compare as missing on that side.
pub(crate) async fn load_captures(dir: &Path) -> anyhow::Result<PageVariantSet> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let manifest = tokio::fs::read_to_string(&manifest_path)
        .await
        .with_context(|| format!("reading capture manifest {}", manifest_path.display()))?;
    let entries: BTreeMap<String, ManifestEntry> = serde_json::from_str(&manifest)
        .with_context(|| format!("parsing capture manifest {}", manifest_path.display()))?;

    let mut pages = PageVariantSet::new();
    for (path, entry) in entries {
        match read_page(dir, &entry).await {
            Ok(page) => pages.insert(path, page),
            Err(e) => {
                let error = format!("{e:#}");
                tracing::warn!(%path, dir = %dir.display(), %error, "skipping unreadable capture");
            }
        }
    }

    tracing::info!(dir = %dir.display(), pages = pages.len(), "loaded captures");
    Ok(pages)
}

async fn read_page(dir: &Path, entry: &ManifestEntry) -> anyhow::Result<CapturedPage> {
    let markup_path = dir.join(&entry.markup);
    let screenshot_path = dir.join(&entry.screenshot);
    let (markup, raster) = tokio::try_join!(
        async {
            tokio::fs::read_to_string(&markup_path)
                .await
                .with_context(|| format!("reading {}", markup_path.display()))
        },
        async {
            tokio::fs::read(&screenshot_path)
                .await
                .with_context(|| format!("reading {}", screenshot_path.display()))
        },
    )?;
    Ok(CapturedPage::new(markup, raster))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitediff_test_utils::{solid_png, WHITE};

    fn write_capture(dir: &Path, manifest: &str) {
        std::fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
        std::fs::write(dir.join("home.html"), "<h1>home</h1>").unwrap();
        std::fs::write(dir.join("home.png"), solid_png(2, 2, WHITE)).unwrap();
    }

    #[tokio::test]
    async fn loads_listed_pages() {
        let tmp = tempfile::tempdir().unwrap();
        write_capture(
            tmp.path(),
            r#"{ "/": { "markup": "home.html", "screenshot": "home.png" } }"#,
        );

        let pages = load_captures(tmp.path()).await.unwrap();
        let home = pages.get("/").unwrap();
        assert_eq!(home.markup, "<h1>home</h1>");
        assert_eq!(home.raster, solid_png(2, 2, WHITE));
    }

    #[tokio::test]
    async fn unreadable_pages_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        write_capture(
            tmp.path(),
            r#"{
                "/": { "markup": "home.html", "screenshot": "home.png" },
                "/lost": { "markup": "lost.html", "screenshot": "lost.png" }
            }"#,
        );

        let pages = load_captures(tmp.path()).await.unwrap();
        assert!(pages.contains("/"));
        assert!(!pages.contains("/lost"));
    }

    #[tokio::test]
    async fn missing_manifest_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_captures(tmp.path()).await.unwrap_err();
        assert!(format!("{err:#}").contains(MANIFEST_FILE));
    }
}
