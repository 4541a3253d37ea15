mod config;

use clap::{Parser, Subcommand};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(about = "Serves decoded test result grids for dashboard tabs")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the grid API and admin listeners
    Serve {
        #[arg(long)]
        config_path: PathBuf,
    },
    /// Parse and validate a config file, then exit
    CheckConfig {
        #[arg(long)]
        config_path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::CheckConfig { config_path } => match config::Config::from_file(&config_path) {
            Ok(_) => println!("{} is valid", config_path.display()),
            Err(e) => {
                eprintln!("{}: {e}", config_path.display());
                process::exit(1);
            }
        },
        CliCommand::Serve { config_path } => {
            let config = match config::Config::from_file(&config_path) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Failed to load config: {e}");
                    process::exit(1);
                }
            };

            // Must outlive the runtime so buffered events are flushed on exit.
            let _sentry = init_logging(config.common.logging.as_ref());

            if let Some(metrics_config) = &config.common.metrics {
                if let Err(e) = init_metrics(metrics_config) {
                    tracing::error!(error = %e, "Failed to set up metrics exporter");
                    process::exit(1);
                }
            }

            let rt = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to start runtime");
                    process::exit(1);
                }
            };

            tracing::info!("Starting gridview");
            if let Err(e) = rt.block_on(grid_api::run(config.gridview)) {
                tracing::error!(error = %e, "gridview exited with error");
                process::exit(1);
            }
        }
    }
}

fn init_logging(logging: Option<&config::LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let default_filter = logging
        .and_then(|l| l.filter.clone())
        .unwrap_or_else(|| "info".into());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let guard = logging
        .and_then(|l| l.sentry_dsn.as_deref())
        .map(|dsn| {
            sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    ..Default::default()
                },
            ))
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    guard
}

fn init_metrics(metrics_config: &config::MetricsConfig) -> Result<(), String> {
    let recorder = StatsdBuilder::from(metrics_config.statsd_host.as_str(), metrics_config.statsd_port)
        .build(Some(&metrics_config.prefix))
        .map_err(|e| e.to_string())?;
    metrics::set_global_recorder(recorder).map_err(|e| e.to_string())?;
    shared::metrics_defs::describe_all(grid_api::metrics_defs::ALL_METRICS);
    Ok(())
}
