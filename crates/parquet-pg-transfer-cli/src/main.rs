//! parquet-pg-transfer CLI - Move Parquet datasets through an object store into PostgreSQL.

use chrono::Utc;
use clap::{Parser, Subcommand};
use parquet_pg_transfer::ddl::apply_ddl;
use parquet_pg_transfer::generate::generate_to_dir;
use parquet_pg_transfer::{Config, Orchestrator, ParquetCodec, TransferError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "parquet-pg-transfer")]
#[command(about = "Move Parquet datasets through an object store into PostgreSQL")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file. Without it, configuration is read from the environment
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload local datasets to the object store and bulk load them into PostgreSQL
    Run {
        /// Datasets to transfer, in order (overrides transfer.datasets)
        #[arg(short, long, value_delimiter = ',')]
        datasets: Option<Vec<String>>,
    },

    /// Generate the mock customers and loans datasets into the local data directory
    Generate {
        /// Random seed (overrides generate.seed)
        #[arg(long)]
        seed: Option<u64>,

        /// Number of customers to generate
        #[arg(long)]
        customers: Option<usize>,

        /// Number of loans to generate
        #[arg(long)]
        loans: Option<usize>,
    },

    /// Create the target tables from a SQL file
    ApplyDdl {
        /// SQL file to execute
        #[arg(long, default_value = "sql/ddl.sql")]
        path: PathBuf,
    },

    /// Test object store and database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), TransferError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?.with_env_overrides()?,
        None => Config::from_env()?,
    };

    match cli.command {
        Commands::Run { datasets } => {
            if let Some(datasets) = datasets {
                config.transfer.datasets = datasets;
                config.validate()?;
            }

            let orchestrator = Orchestrator::from_config(&config)?;
            orchestrator.check_sources(&config.transfer.datasets)?;

            let result = orchestrator.run(&config.transfer.datasets).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nTransfer finished: {}", result.status);
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!(
                    "  Datasets: {}/{}",
                    result.datasets_success, result.datasets_total
                );
                println!("  Rows loaded: {}", result.rows_loaded);
                for outcome in &result.datasets {
                    match &outcome.error {
                        None => println!(
                            "    {} ok ({} objects, {} rows, {:.2}s)",
                            outcome.name,
                            outcome.objects_written,
                            outcome.rows_loaded,
                            outcome.duration_seconds
                        ),
                        Some(err) => println!("    {} FAILED: {}", outcome.name, err),
                    }
                }
            }

            if !result.is_success() {
                return Err(TransferError::BatchIncomplete(result.failed_datasets));
            }
        }

        Commands::Generate {
            seed,
            customers,
            loans,
        } => {
            if let Some(seed) = seed {
                config.generate.seed = seed;
            }
            if customers.is_some() {
                config.generate.customers = customers;
            }
            if loans.is_some() {
                config.generate.loans = loans;
            }

            let codec = ParquetCodec::new(config.transfer.row_group_size);
            let today = Utc::now().date_naive();
            let written =
                generate_to_dir(&config.generate, &config.local, &codec, today).await?;

            if cli.output_json {
                let files: Vec<_> = written
                    .iter()
                    .map(|(path, rows)| serde_json::json!({ "path": path, "rows": rows }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                println!("Generated datasets (seed {}):", config.generate.seed);
                for (path, rows) in &written {
                    println!("  {} ({} rows)", path.display(), rows);
                }
            }
        }

        Commands::ApplyDdl { path } => {
            apply_ddl(&config.target, &path).await?;
            info!("Target tables are ready");
            println!("Applied {}", path.display());
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::from_config(&config)?;
            let result = orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Object store ({}): {} ({}ms)",
                    result.store_location,
                    if result.store_connected { "OK" } else { "FAILED" },
                    result.store_latency_ms
                );
                if let Some(ref err) = result.store_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target ({}): {} ({}ms)",
                    result.target_type,
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(TransferError::Connectivity("health check failed".to_string()));
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
