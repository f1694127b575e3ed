//! Path lists supplied with `--paths`

use anyhow::Context as _;
use std::path::Path;
use url::Url;

/// Parse a URL list into page paths
///
/// Blank lines are skipped. Absolute URLs keep their path, query and
/// fragment; anything else is treated as a path and gets a leading `/`.
pub(crate) fn parse_url_list(content: &str) -> Vec<String> {
    content.lines().filter_map(url_path).collect()
}

/// Reduce one line to a page path
pub(crate) fn url_path(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    match Url::parse(trimmed) {
        Ok(url) => {
            let mut path = url.path().to_string();
            if let Some(query) = url.query() {
                path.push('?');
                path.push_str(query);
            }
            if let Some(fragment) = url.fragment() {
                path.push('#');
                path.push_str(fragment);
            }
            Some(path)
        }
        Err(_) if trimmed.starts_with('/') => Some(trimmed.to_string()),
        Err(_) => Some(format!("/{trimmed}")),
    }
}

/// Read and parse a URL list file
pub(crate) async fn load_url_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading path list {}", path.display()))?;
    let paths = parse_url_list(&content);
    tracing::info!(file = %path.display(), count = paths.len(), "loaded path list");
    Ok(paths)
}
