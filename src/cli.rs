use crate::config::loader::load_tool_paths;
use crate::config::types::{PipelineConfig, PipelineError, SliceBackend};
use crate::exec::invoker::ProcessInvoker;
use crate::pipeline::Orchestrator;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::{error, info, warn};
use std::path::PathBuf;

/// Boolean flag values: `true`, `1` and `yes` (any case) are true, anything else is false.
pub fn parse_flag(value: &str) -> std::result::Result<bool, String> {
    Ok(matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    ))
}

#[derive(Parser, Debug)]
#[command(
    name = "autopie",
    author,
    version,
    about = "Automated reduction of failing C/C++ programs",
    long_about = None
)]
pub struct Cli {
    /// The file in which the error occurred
    #[arg(long = "source_file")]
    pub source_file: PathBuf,
    /// The line number on which the error occurred
    #[arg(long = "line_number")]
    pub line_number: u32,
    /// A part of the error message specifying the nature of the error
    #[arg(long = "error_message")]
    pub error_message: String,
    /// The arguments with which the program was run when the error occurred
    #[arg(long = "arguments", default_value = "", allow_hyphen_values = true)]
    pub arguments: String,
    /// Limits the statement-removal reduction to a ratio of candidates (0 to 1)
    #[arg(long = "reduction_ratio", default_value_t = 1.0)]
    pub reduction_ratio: f64,
    /// Dump GraphViz files of the dependency graphs
    #[arg(
        short = 'd',
        long = "dump_dot",
        action = ArgAction::Set,
        value_parser = parse_flag,
        default_value = "false"
    )]
    pub dump_dot: bool,
    /// Verbose output from the pipeline and every tool
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Set,
        value_parser = parse_flag,
        default_value = "false"
    )]
    pub verbose: bool,
    /// Let the tools write their log files
    #[arg(
        short = 'l',
        long = "log",
        action = ArgAction::Set,
        value_parser = parse_flag,
        default_value = "false"
    )]
    pub log: bool,
    /// Run a static slicing pass
    #[arg(
        long = "static_slice",
        action = ArgAction::Set,
        value_parser = parse_flag,
        default_value = "true"
    )]
    pub static_slice: bool,
    /// Run a dynamic slicing pass
    #[arg(
        long = "dynamic_slice",
        action = ArgAction::Set,
        value_parser = parse_flag,
        default_value = "true"
    )]
    pub dynamic_slice: bool,
    /// Run the graph-minimizing reducer before statement removal
    #[arg(
        long = "delta",
        action = ArgAction::Set,
        value_parser = parse_flag,
        default_value = "true"
    )]
    pub delta: bool,
    /// Hard-code the program arguments into the static slicing input
    #[arg(
        long = "inject",
        action = ArgAction::Set,
        value_parser = parse_flag,
        default_value = "false"
    )]
    pub inject: bool,
    /// Where to save the reduced program (default: <stem>_reduced.<ext>)
    #[arg(long = "output_file")]
    pub output_file: Option<PathBuf>,
    /// Pipeline workspace for intermediate artifacts
    #[arg(long = "work_dir", default_value = ".autopie")]
    pub work_dir: PathBuf,
    /// Slicer backend: local or container
    #[arg(long = "slicer_backend", default_value = "container")]
    pub slicer_backend: SliceBackend,
    /// JSON file overriding tool locations
    #[arg(long = "tools_config")]
    pub tools_config: Option<PathBuf>,
    /// Write a JSON run summary here
    #[arg(long = "report")]
    pub report: Option<PathBuf>,
}

impl Cli {
    pub fn into_config(self) -> crate::config::types::Result<PipelineConfig> {
        let tools = load_tool_paths(self.tools_config.as_deref())?;
        let mut config = PipelineConfig::new(self.source_file, self.line_number);
        config.error_message = self.error_message;
        config.arguments = self.arguments;
        config.reduction_ratio = self.reduction_ratio;
        config.dump_dot = self.dump_dot;
        config.verbose = self.verbose;
        config.log = self.log;
        config.static_slice = self.static_slice;
        config.dynamic_slice = self.dynamic_slice;
        config.delta = self.delta;
        config.inject = self.inject;
        config.slicer_backend = self.slicer_backend;
        config.work_dir = self.work_dir;
        config.output_file = self.output_file;
        config.tools = tools;
        Ok(config)
    }
}

/// Logging goes through env_logger: `info` by default, `debug` with `--verbose`, and
/// `RUST_LOG` overrides both.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}

fn fail(err: PipelineError) -> ! {
    error!("{}", err);
    std::process::exit(err.exit_code());
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let base_dir = std::env::current_dir().context("cannot determine the current directory")?;
    let report = cli.report.clone().map(|p| base_dir.join(p));

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => fail(e),
    };

    let summary = match Orchestrator::new(config, &base_dir, Box::new(ProcessInvoker)).run() {
        Ok(summary) => summary,
        Err(e) => fail(e),
    };

    if let Some(path) = report {
        if let Err(e) = summary.write_json(&path) {
            warn!("Failed to write run report {}: {}", path.display(), e);
        }
    }

    match &summary.output_path {
        Some(output) => {
            info!("Result saved to {}", output.display());
            info!("AutoPIE has successfully finished.");
            Ok(())
        }
        None => std::process::exit(1),
    }
}
