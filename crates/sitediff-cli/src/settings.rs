//! `compare` settings: TOML file first, then command-line overrides

use crate::report_name::{report_file_name, ReportNameParts};
use anyhow::Context as _;
use clap::ArgMatches;
use sitediff_core::config::DEFAULT_REPORT_PATH;
use sitediff_core::CompareConfig;
use std::path::{Path, PathBuf};

/// Resolved inputs of one `compare` invocation
#[derive(Debug)]
pub(crate) struct CompareArgs {
    pub(crate) reference: PathBuf,
    pub(crate) candidate: PathBuf,
    pub(crate) paths: Option<PathBuf>,
    pub(crate) json: bool,
    pub(crate) config: CompareConfig,
}

impl CompareArgs {
    /// Resolve settings, reading `--config` if given
    pub(crate) async fn from_matches(args: &ArgMatches) -> anyhow::Result<Self> {
        let base = match args.get_one::<PathBuf>("config") {
            Some(path) => load_config(path).await?,
            None => CompareConfig::default(),
        };
        Self::with_base(args, base)
    }

    /// Apply command-line overrides on top of `config`
    pub(crate) fn with_base(args: &ArgMatches, mut config: CompareConfig) -> anyhow::Result<Self> {
        let reference = args
            .get_one::<PathBuf>("reference")
            .cloned()
            .context("--reference is required")?;
        let candidate = args
            .get_one::<PathBuf>("candidate")
            .cloned()
            .context("--candidate is required")?;
        let paths = args.get_one::<PathBuf>("paths").cloned();

        if let Some(&threshold) = args.get_one::<u32>("mismatch-threshold") {
            config.mismatch_threshold = Some(threshold);
        }
        if let Some(&threshold) = args.get_one::<u32>("html-threshold") {
            config.html_threshold = Some(threshold);
        }
        if let Some(&threshold) = args.get_one::<u32>("image-threshold") {
            config.image_threshold = Some(threshold);
        }
        if args.get_flag("strict-markup") {
            config.strict_markup = true;
        }
        if let Some(url) = args.get_one::<String>("reference-base-url") {
            config.reference_base_url = Some(url.clone());
        }
        if let Some(url) = args.get_one::<String>("candidate-base-url") {
            config.candidate_base_url = Some(url.clone());
        }
        if let Some(&concurrency) = args.get_one::<usize>("concurrency") {
            config.concurrency = concurrency;
        }

        match args.get_one::<PathBuf>("output") {
            Some(output) => config.output_path = output.clone(),
            None if config.output_path == Path::new(DEFAULT_REPORT_PATH) => {
                config.output_path = PathBuf::from(report_file_name(ReportNameParts {
                    path_list: paths.as_deref(),
                    html_threshold: config.html_threshold,
                    image_threshold: config.image_threshold,
                    mismatch_threshold: config.mismatch_threshold,
                    strict_markup: config.strict_markup,
                }));
            }
            None => {}
        }

        Ok(Self {
            reference,
            candidate,
            paths,
            json: args.get_flag("json"),
            config,
        })
    }
}

/// Parse a TOML settings document
pub(crate) fn parse_config(text: &str) -> anyhow::Result<CompareConfig> {
    toml::from_str(text).context("invalid comparison settings")
}

async fn load_config(path: &Path) -> anyhow::Result<CompareConfig> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading settings {}", path.display()))?;
    parse_config(&text).with_context(|| format!("in {}", path.display()))
}
