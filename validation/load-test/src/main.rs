//! Load test CLI for the TrackMe REST API.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use trackme_load::{LoadRunner, ResultsReport, TestConfig, TestResults};

#[derive(Parser)]
#[command(name = "trackme-load")]
#[command(about = "Synthetic traffic generator for the TrackMe REST API", long_about = None)]
struct Cli {
    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a load test from a scenario file
    Run {
        /// Path to scenario YAML file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override target host
        #[arg(long, env = "TRACKME_HOST")]
        host: Option<String>,

        /// Override number of actors
        #[arg(short, long)]
        users: Option<u32>,

        /// Override spawn rate (actors per second)
        #[arg(short = 'r', long)]
        spawn_rate: Option<f64>,

        /// Override test duration in seconds
        #[arg(short = 't', long)]
        duration: Option<u64>,

        /// Override RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Output format: table (default), json, csv
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Also write JSON results to this file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Run a short mixed test with built-in defaults
    Quick {
        /// Target host
        #[arg(long, default_value = "http://localhost:80", env = "TRACKME_HOST")]
        host: String,

        /// Number of actors
        #[arg(short, long, default_value = "5")]
        users: u32,

        /// Spawn rate (actors per second)
        #[arg(short = 'r', long, default_value = "1.0")]
        spawn_rate: f64,

        /// Test duration in seconds
        #[arg(short = 't', long, default_value = "30")]
        duration: u64,
    },

    /// List available scenarios
    List {
        /// Scenarios directory
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    match cli.command {
        Commands::Run {
            scenario,
            host,
            users,
            spawn_rate,
            duration,
            seed,
            output,
            save,
            no_progress,
        } => {
            info!(scenario = %scenario.display(), "Loading scenario");
            let mut config = TestConfig::from_file(&scenario)
                .with_context(|| format!("Failed to load {}", scenario.display()))?;

            // Apply overrides
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(users) = users {
                config.users = users;
            }
            if let Some(rate) = spawn_rate {
                config.spawn_rate = rate;
            }
            if let Some(duration) = duration {
                config.duration_secs = duration;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            // A flat ramp on the command line replaces the scenario's stages
            let flat = users.is_some() || spawn_rate.is_some() || duration.is_some();
            if flat && !config.stages.is_empty() {
                info!(stages = config.stages.len(), "Overrides replace the staged ramp");
                config.stages.clear();
            }
            config.validate()?;

            let runner = LoadRunner::new(config.clone()).with_progress(!no_progress);
            let results = runner.run().await?;

            print_results(&results, &output)?;
            if let Some(path) = save {
                std::fs::write(&path, ResultsReport::format_json(&results)?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!(path = %path.display(), "Results saved");
            }

            let violations = results.check_thresholds(&config.thresholds);
            if !violations.is_empty() {
                for violation in &violations {
                    warn!(%violation, "Threshold exceeded");
                }
                anyhow::bail!("{} threshold(s) exceeded", violations.len());
            }
            Ok(())
        }
        Commands::Quick {
            host,
            users,
            spawn_rate,
            duration,
        } => {
            let config = TestConfig {
                host,
                users,
                spawn_rate,
                duration_secs: duration,
                ..TestConfig::default()
            };
            config.validate()?;

            let results = LoadRunner::new(config).run().await?;
            print_results(&results, "table")
        }
        Commands::List { dir } => list_scenarios(&dir),
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_results(results: &TestResults, output: &str) -> anyhow::Result<()> {
    match output {
        "json" => println!("{}", ResultsReport::format_json(results)?),
        "csv" => {
            println!("{}", ResultsReport::csv_header());
            println!("{}", ResultsReport::format_csv(results));
        }
        _ => println!("{}", ResultsReport::format_table(results)),
    }
    Ok(())
}

fn list_scenarios(dir: &Path) -> anyhow::Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read scenarios directory {}", dir.display()))?;

    let mut scenarios = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        ) {
            continue;
        }
        match TestConfig::from_file(&path) {
            Ok(config) => {
                let file_name = entry.file_name().to_string_lossy().to_string();
                scenarios.push((file_name, config.name, config.description));
            }
            Err(err) => warn!(path = %path.display(), error = %err, "Skipping invalid scenario"),
        }
    }
    scenarios.sort_by(|a, b| a.0.cmp(&b.0));

    println!("Available scenarios in {}:", dir.display());
    println!();
    if scenarios.is_empty() {
        println!("No scenario files found");
    }
    for (file_name, name, description) in scenarios {
        println!("  {} - {}", file_name, name);
        println!("    {}", description);
        println!();
    }
    Ok(())
}
