use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

/// Command-line definition
pub(crate) fn command() -> Command {
    Command::new("sitediff")
        .version(sitediff_core::VERSION)
        .about("Compare captured pages of a reference and a candidate site")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("compare")
                .about("Compare two capture directories and write a report")
                .arg(
                    Arg::new("reference")
                        .long("reference")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Capture directory of the reference site (contains pages.json)"),
                )
                .arg(
                    Arg::new("candidate")
                        .long("candidate")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Capture directory of the candidate site (contains pages.json)"),
                )
                .arg(
                    Arg::new("paths")
                        .long("paths")
                        .value_parser(value_parser!(PathBuf))
                        .help("Text file listing the URLs or paths to compare, one per line"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML file with comparison settings; flags take precedence"),
                )
                .arg(
                    Arg::new("mismatch-threshold")
                        .long("mismatch-threshold")
                        .value_parser(value_parser!(u32).range(0..=100))
                        .help("Only report pages whose match score is below 100 minus this value"),
                )
                .arg(
                    Arg::new("html-threshold")
                        .long("html-threshold")
                        .value_parser(value_parser!(u32).range(0..=100))
                        .help("Write markup diffs for pages whose HTML diff percent exceeds this value"),
                )
                .arg(
                    Arg::new("image-threshold")
                        .long("image-threshold")
                        .value_parser(value_parser!(u32).range(0..=100))
                        .help("Write visual diffs for pages whose visual diff percent exceeds this value"),
                )
                .arg(
                    Arg::new("strict-markup")
                        .long("strict-markup")
                        .action(ArgAction::SetTrue)
                        .help("Compare markup byte for byte, without normalization"),
                )
                .arg(
                    Arg::new("reference-base-url")
                        .long("reference-base-url")
                        .help("Base URL of the reference site, replaced before diffing markup"),
                )
                .arg(
                    Arg::new("candidate-base-url")
                        .long("candidate-base-url")
                        .help("Base URL of the candidate site, replaced before diffing markup"),
                )
                .arg(
                    Arg::new("concurrency")
                        .long("concurrency")
                        .value_parser(value_parser!(usize))
                        .help("Maximum number of pages compared at once (default: host parallelism)"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Report file (default: derived from the path list and thresholds)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Also write the records as JSON next to the report"),
                ),
        )
}
