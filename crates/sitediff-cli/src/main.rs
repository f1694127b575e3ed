//! `sitediff` command-line front end
//!
//! Loads two capture directories, runs the comparison engine and writes the
//! report. Logging goes to stderr through `tracing-subscriber`; set
//! `RUST_LOG` to change the level (default `info`).

mod capture;
mod cli;
mod report_name;
mod settings;
mod url_list;

use anyhow::Context as _;
use clap::ArgMatches;
use settings::CompareArgs;
use sitediff_core::{render_json, Comparator, ComparisonStatus};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let matches = cli::command().get_matches();
    let result = match matches.subcommand() {
        Some(("compare", args)) => compare(args).await,
        _ => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn compare(args: &ArgMatches) -> anyhow::Result<()> {
    let CompareArgs {
        reference,
        candidate,
        paths,
        json,
        config,
    } = CompareArgs::from_matches(args).await?;

    let paths = match &paths {
        Some(file) => Some(url_list::load_url_list(file).await?),
        None => None,
    };
    let (reference, candidate) = tokio::try_join!(
        capture::load_captures(&reference),
        capture::load_captures(&candidate),
    )?;

    let output_path = config.output_path.clone();
    let html_threshold = config.effective_html_threshold();
    let comparator = Comparator::new(config);

    let mut run = comparator.compare(&reference, &candidate, paths).await?;
    let report_path = run.write_report(&output_path, html_threshold).await?;

    if json {
        let json_path = report_path.with_extension("json");
        tokio::fs::write(&json_path, render_json(&run.records)?)
            .await
            .with_context(|| format!("writing {}", json_path.display()))?;
        println!("Records written to {}", json_path.display());
    }

    let summary = run.summary(report_path);
    println!(
        "Compared {} pages, {} reported",
        summary.compared, summary.retained
    );
    for status in ComparisonStatus::ALL {
        let count = summary.count(status);
        if count > 0 {
            println!("  {status}: {count}");
        }
    }
    println!("Report written to {}", summary.report_path.display());
    Ok(())
}
