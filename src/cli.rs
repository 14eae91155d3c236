use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

#[derive(Parser, Debug)]
#[command(
    name = "volley",
    author,
    version,
    about = "A scenario-based HTTP load testing tool",
    long_about = "volley is a scenario-based HTTP load testing tool.\n\n\
                  It replays an ordered scenario of HTTP steps from many concurrent workers,\n\
                  optionally through proxies, and reports per-step latency, status codes and errors."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario load test
    Run(RunArgs),

    /// Generate a starter scenario file
    Init(InitArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scenario file (TOML)
    #[arg(short = 'f', long = "config", value_name = "FILE")]
    pub config: PathBuf,

    /// Number of concurrent workers (overrides [load].concurrency)
    #[arg(short = 'c', long)]
    pub concurrency: Option<u32>,

    /// Total scenario runs across all workers, 0 = unlimited (overrides [load].iterations)
    #[arg(short = 'n', long)]
    pub iterations: Option<u64>,

    /// Test duration, e.g. 30s or 2m (overrides [load].duration)
    #[arg(short = 'd', long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Proxy URL to route traffic through (repeatable; replaces [load].proxies)
    #[arg(long = "proxy", value_name = "URL")]
    pub proxies: Vec<String>,

    /// Run the scenario once and print the full request/response transcript
    #[arg(long)]
    pub debug: bool,

    /// Disable the periodic live progress line
    #[arg(long)]
    pub no_live: bool,

    /// Validate the scenario and exit without sending traffic
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Target URL for the first step
    pub url: Option<String>,

    /// Output file path
    #[arg(short, long, default_value = "volley.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}
