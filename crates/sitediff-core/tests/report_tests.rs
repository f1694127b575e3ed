use pretty_assertions::assert_eq;
use sitediff_core::prelude::*;
use sitediff_core::render_json;
use sitediff_test_utils::*;

fn fixtures() -> (PageVariantSet, PageVariantSet) {
    let reference = variant_set([
        ("/zeta", white_page("<p>same</p>")),
        ("/alpha", white_page("<p>prod copy</p>")),
        ("/gone", white_page("<p>old</p>")),
    ]);
    let candidate = variant_set([
        ("/zeta", white_page("<p>same</p>")),
        ("/alpha", page("<p>new copy</p>", solid_png(4, 4, BLACK))),
    ]);
    (reference, candidate)
}

#[tokio::test]
async fn test_report_rows_sorted_with_relative_links() {
    let tmp = tempfile::tempdir().unwrap();
    let (reference, candidate) = fixtures();
    let config = config_in(&tmp.path().join("out")).with_image_threshold(50);
    let comparator = Comparator::new(config);

    let summary = comparator.run(&reference, &candidate, None).await.unwrap();
    let html = std::fs::read_to_string(&summary.report_path).unwrap();

    let alpha = html.find(r#"href="/alpha""#).unwrap();
    let gone = html.find(r#"href="/gone""#).unwrap();
    let zeta = html.find(r#"href="/zeta""#).unwrap();
    assert!(alpha < gone && gone < zeta);

    assert!(html.contains(r#"src="diff_output/alpha_diff.png""#));
    assert!(html.contains(r#"href="diff_output/alpha_html_diff.html""#));
    assert!(!html.contains("zeta_html_diff.html"));
    assert!(html.contains("Missing on candidate site"));

    assert_eq!(
        list_files(&tmp.path().join("out/diff_output")),
        ["alpha_diff.png", "alpha_html_diff.html"]
    );
    assert_eq!(summary.count(ComparisonStatus::Ok), 2);
    assert_eq!(summary.count(ComparisonStatus::MissingOnCandidate), 1);
}

#[tokio::test]
async fn test_html_threshold_gates_markup_diffs() {
    let tmp = tempfile::tempdir().unwrap();
    let (reference, candidate) = fixtures();
    let comparator = Comparator::new(config_in(tmp.path()).with_html_threshold(90));

    comparator.run(&reference, &candidate, None).await.unwrap();

    assert!(list_files(&tmp.path().join("diff_output")).is_empty());
}

#[tokio::test]
async fn test_blocked_markup_diff_keeps_report_and_other_records() {
    let tmp = tempfile::tempdir().unwrap();
    let (reference, candidate) = fixtures();
    std::fs::create_dir_all(tmp.path().join("diff_output/alpha_html_diff.html")).unwrap();
    let comparator = Comparator::new(config_in(tmp.path()));

    let mut run = comparator.compare(&reference, &candidate, None).await.unwrap();
    let report = run.write_report(&tmp.path().join("report.html"), 0).await.unwrap();

    assert!(report.exists());
    let alpha = &run.records[0];
    assert_eq!(alpha.path, "/alpha");
    assert!(alpha.markup_artifact.is_none());
    assert!(alpha.notes.starts_with("Markup diff failed"));
    assert_eq!(run.records.len(), 3);
    assert_eq!(run.summary(report).count(ComparisonStatus::Ok), 2);
}

#[tokio::test]
async fn test_rerun_produces_identical_report() {
    let tmp = tempfile::tempdir().unwrap();
    let (reference, candidate) = fixtures();
    let comparator = Comparator::new(config_in(tmp.path()).with_image_threshold(0));

    let first = comparator.run(&reference, &candidate, None).await.unwrap();
    let first_bytes = std::fs::read(&first.report_path).unwrap();
    let second = comparator.run(&reference, &candidate, None).await.unwrap();
    let second_bytes = std::fs::read(&second.report_path).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_bytes, second_bytes);
}

#[tokio::test]
async fn test_report_to_custom_location() {
    let tmp = tempfile::tempdir().unwrap();
    let (reference, candidate) = fixtures();
    let comparator = Comparator::new(config_in(tmp.path()));

    let mut run = comparator.compare(&reference, &candidate, None).await.unwrap();
    let target = tmp.path().join("nested/reports/summary.html");
    let written = run.write_report(&target, 0).await.unwrap();

    assert_eq!(written, target);
    let html = std::fs::read_to_string(&target).unwrap();
    assert!(html.contains(r#"href="../../diff_output/alpha_html_diff.html""#));
}

#[tokio::test]
async fn test_json_matches_retained_records() {
    let tmp = tempfile::tempdir().unwrap();
    let (reference, candidate) = fixtures();
    let comparator = Comparator::new(config_in(tmp.path()));

    let run = comparator.compare(&reference, &candidate, None).await.unwrap();
    let json = render_json(&run.records).unwrap();
    let parsed: Vec<ComparisonRecord> = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.len(), 3);
    assert!(parsed.iter().all(|r| r.normalized_reference_markup.is_none()));
    assert_eq!(parsed[0].path, "/alpha");
}
