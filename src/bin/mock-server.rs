//! openapi-cop-mock: answers requests from an OpenAPI document alone.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use openapi_cop::config::loader::load_mock_config;
use openapi_cop::config::MockConfig;
use openapi_cop::lifecycle::{self, signals};
use openapi_cop::observability;

#[derive(Parser, Debug)]
#[command(name = "openapi-cop-mock", version)]
#[command(about = "Mock server driven by an OpenAPI document", long_about = None)]
struct Cli {
    /// Path to the OpenAPI document
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Host to bind [default: localhost]
    #[arg(long)]
    host: Option<String>,

    /// Port on which to run the server [default: 8889]
    #[arg(short, long)]
    port: Option<u16>,

    /// Reload on change, watching LOCATION (file or directory) or the document
    #[arg(short, long, value_name = "LOCATION", num_args = 0..=1)]
    watch: Option<Option<PathBuf>>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,

    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_mock_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("openapi-cop-mock: {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => MockConfig::default(),
    };
    if let Some(file) = cli.file {
        config.document.path = file;
    }
    if let Some(host) = cli.host {
        config.listener.host = host;
    }
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if let Some(location) = cli.watch {
        config.document.watch = true;
        if location.is_some() {
            config.document.watch_path = location;
        }
    }
    if cli.verbose {
        config.observability.log_level = "debug".to_string();
    }

    observability::init_logging(&config.observability.log_level);

    let running = match lifecycle::start_mock(config).await {
        Ok(running) => running,
        Err(e) => {
            eprintln!("openapi-cop-mock: {}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("openapi-cop mock server is running at http://{}", running.local_addr());

    signals::shutdown_signal().await;
    if let Err(e) = running.shutdown().await {
        tracing::error!(error = %e, "Server stopped with an error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
