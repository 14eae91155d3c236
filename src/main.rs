mod cli;
mod config;
mod engine;
mod http;
mod report;
mod types;

use clap::Parser;
use cli::{Cli, Commands, InitArgs, RunArgs};
use config::{load_config, merge_config};
use engine::LoadTest;
use http::HttpRequesterFactory;
use std::io;
use std::sync::Arc;
use types::LoadConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32, String> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_load_test(&args).await,
        Commands::Init(args) => run_init(&args),
    }
}

fn run_init(args: &InitArgs) -> Result<i32, String> {
    use std::fs;

    if args.output.exists() && !args.force {
        return Err(format!(
            "File '{}' already exists. Use --force to overwrite.",
            args.output.display()
        ));
    }

    let url = args
        .url
        .as_deref()
        .unwrap_or("https://api.example.com/health");

    let config = format!(
        r#"# Volley scenario

[load]
concurrency = 10
duration = "30s"
# iterations = 0          # total runs across workers, 0 = unlimited
# proxies = ["http://127.0.0.1:3128"]
# live_interval = "1.5s"

# Environment variables are interpolated, with an optional default: ${{API_TOKEN:-none}}

[[steps]]
id = 1
name = "health"
url = "{url}"
method = "GET"
timeout = "5s"
# sleep = "500"           # fixed delay in ms before the next step
# sleep = "100-300"       # random delay between min and max ms

# [steps.headers]
# Authorization = "Bearer ${{API_TOKEN:-none}}"

# [[steps]]
# id = 2
# name = "create"
# url = "{url}"
# method = "POST"
# body = '{{"key": "value"}}'
# abort_on_failure = true
"#,
        url = url
    );

    fs::write(&args.output, config).map_err(|e| format!("Failed to write config file: {}", e))?;

    eprintln!("Created scenario file: {}", args.output.display());
    eprintln!("\nRun with: volley run -f {}", args.output.display());

    Ok(0)
}

async fn run_load_test(args: &RunArgs) -> Result<i32, String> {
    let toml_config = load_config(&args.config)?;
    let config = merge_config(args, toml_config)?;

    if args.dry_run {
        print_dry_run(&config);
        return Ok(0);
    }

    tracing::info!(
        "Starting load test: {} steps, {} workers, {} proxies",
        config.scenario.steps.len(),
        config.concurrency,
        config.proxies.len()
    );

    let load_test = LoadTest::new(config, Arc::new(HttpRequesterFactory));

    let cancel_token = load_test.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nStopping, waiting for in-flight runs...");
            cancel_token.cancel();
        }
    });

    load_test.run(Box::new(io::stdout())).await?;

    Ok(0)
}

fn print_dry_run(config: &LoadConfig) {
    eprintln!("Configuration validated successfully!\n");
    eprintln!("Steps:       {} defined", config.scenario.steps.len());
    for step in &config.scenario.steps {
        let mut line = format!(
            "  {}. {} ({} {})",
            step.id,
            step.display_name(),
            step.target.method,
            step.target.url
        );
        if !step.sleep.is_empty() {
            line.push_str(&format!(" sleep={}ms", step.sleep));
        }
        if step.abort_on_failure {
            line.push_str(" abort_on_failure");
        }
        eprintln!("{}", line);
    }
    eprintln!("Concurrency: {}", config.concurrency);
    if config.iterations > 0 {
        eprintln!("Iterations:  {}", config.iterations);
    }
    if let Some(duration) = config.duration {
        eprintln!("Duration:    {}", humantime::format_duration(duration));
    }
    let proxies: Vec<String> = config.proxies.iter().map(|p| p.to_string()).collect();
    eprintln!("Proxies:     {}", proxies.join(", "));
    if config.debug {
        eprintln!("Mode:        debug (single run, full transcript)");
    }
}
