//! openapi-cop: conformance-validating reverse proxy.
//!
//! Sits between clients and a target API, validates every request and
//! response against an OpenAPI (v2 or v3) document, and reports the results
//! through `openapi-cop-*` headers or a 500 diagnostic envelope.
//!
//! ```text
//!   client ──▶ openapi-cop ──▶ target API
//!                 │  ▲
//!     validate ───┘  └─── validate + disclose
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use openapi_cop::config::loader::load_config;
use openapi_cop::config::ProxyConfig;
use openapi_cop::lifecycle::{self, signals};
use openapi_cop::observability::{self, metrics};

#[derive(Parser, Debug)]
#[command(name = "openapi-cop", version)]
#[command(about = "Proxy that validates traffic against an OpenAPI document", long_about = None)]
struct Cli {
    /// Path to the OpenAPI document (JSON or YAML, v2 or v3)
    #[arg(short = 's', long)]
    file: Option<PathBuf>,

    /// Host of the proxy server [default: localhost]
    #[arg(long)]
    host: Option<String>,

    /// Port on which to run the proxy [default: 8888]
    #[arg(short, long)]
    port: Option<u16>,

    /// Base URL of the target API (http://host:port/basePath)
    #[arg(short, long)]
    target: Option<String>,

    /// Disallow additional properties unless a schema explicitly allows them
    #[arg(long)]
    default_forbid_additional_properties: bool,

    /// Never alter target responses; report through headers only
    #[arg(long)]
    silent: bool,

    /// Rebuild the contract on change, watching LOCATION (file or directory) or the document
    #[arg(short, long, value_name = "LOCATION", num_args = 0..=1)]
    watch: Option<Option<PathBuf>>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,

    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut ProxyConfig) {
        if let Some(file) = self.file {
            config.document.path = file;
        }
        if let Some(host) = self.host {
            config.listener.host = host;
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(target) = self.target {
            config.target.url = target;
        }
        config.validation.strict |= self.default_forbid_additional_properties;
        config.validation.silent |= self.silent;
            if let Some(location) = self.watch {
            config.document.watch = true;
            if location.is_some() {
                config.document.watch_path = location;
            }
        }
        if self.verbose {
            config.observability.log_level = "debug".to_string();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("openapi-cop: {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);

    observability::init_logging(&config.observability.log_level);
    tracing::info!("openapi-cop v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let running = match lifecycle::start_proxy(config).await {
        Ok(running) => running,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start proxy");
            eprintln!("openapi-cop: {}", e);
            return ExitCode::FAILURE;
        }
    };

    signals::shutdown_signal().await;
    if let Err(e) = running.shutdown().await {
        tracing::error!(error = %e, "Server stopped with an error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
