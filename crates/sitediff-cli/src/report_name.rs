//! Default report file names

use std::path::Path;

/// Settings that shape the report name
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ReportNameParts<'a> {
    pub(crate) path_list: Option<&'a Path>,
    pub(crate) html_threshold: Option<u32>,
    pub(crate) image_threshold: Option<u32>,
    pub(crate) mismatch_threshold: Option<u32>,
    pub(crate) strict_markup: bool,
}

/// Build `report-<source>[-ht N][-it N][-mt N][-strict].html`
///
/// `<source>` is the path-list file stem with non-alphanumerics replaced by
/// `_`, or `all` when every captured page is compared.
pub(crate) fn report_file_name(parts: ReportNameParts<'_>) -> String {
    let source = parts
        .path_list
        .and_then(Path::file_stem)
        .map_or_else(|| "all".to_string(), |stem| sanitize_part(&stem.to_string_lossy()));

    let mut name = vec![source];
    if let Some(ht) = parts.html_threshold {
        name.push(format!("ht{ht}"));
    }
    if let Some(it) = parts.image_threshold {
        name.push(format!("it{it}"));
    }
    if let Some(mt) = parts.mismatch_threshold {
        name.push(format!("mt{mt}"));
    }
    if parts.strict_markup {
        name.push("strict".to_string());
    }
    format!("report-{}.html", name.join("-"))
}

fn sanitize_part(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_pages_without_thresholds() {
        assert_eq!(report_file_name(ReportNameParts::default()), "report-all.html");
    }

    #[test]
    fn every_part_in_order() {
        let name = report_file_name(ReportNameParts {
            path_list: Some(Path::new("lists/release 2.urls.txt")),
            html_threshold: Some(5),
            image_threshold: Some(0),
            mismatch_threshold: Some(10),
            strict_markup: true,
        });
        assert_eq!(name, "report-release_2_urls-ht5-it0-mt10-strict.html");
    }
}
