//! Portico Gateway - Entry point

use std::path::PathBuf;

use anyhow::Context;
use portico_config::{ConfigLoader, PorticoConfig};
use portico_gateway::GatewayServer;
use portico_telemetry::init_telemetry;
use tracing::{error, info};

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("portico-gateway {}", portico_gateway::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"Portico Gateway - authorization and role routing in front of a page server

USAGE:
    portico-gateway [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    API_URL                               Registration backend base URL (required)
    NEXTAUTH_SECRET                       Session token signing secret (required)
    PORTICO__GATEWAY__LISTEN_ADDR         Listen address (default: 0.0.0.0:8080)
    PORTICO__GATEWAY__UPSTREAM_URL        Page server URL (default: http://127.0.0.1:3000)
    PORTICO__APP__PROFILE                 administration | registration | dashboard
    PORTICO__BACKEND__RULE_TIMEOUT_MS     Business-rule bound (default: 8000)
    PORTICO__TELEMETRY__LOG_LEVEL         Log filter (default: info)

A .env file in the working directory is read if present. Without --config,
./portico.toml is used when it exists.

EXAMPLES:
    portico-gateway --config /etc/portico/gateway.toml
    API_URL=http://localhost:8000/api NEXTAUTH_SECRET=dev portico-gateway
"
    );
}

fn load_config(args: &Args) -> anyhow::Result<PorticoConfig> {
    let loader = ConfigLoader::new()
        .with_defaults()
        .with_dotenv()
        .context("failed to read .env")?;

    let loader = match &args.config {
        Some(path) => loader
            .with_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => loader
            .with_optional_file("portico.toml")
            .context("failed to load portico.toml")?,
    };

    loader
        .with_env_prefix("PORTICO")
        .load()
        .context("invalid configuration")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logging is not up yet, so configuration errors go to stderr.
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("portico-gateway: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&config.log_config(), &config.metrics_config()) {
        eprintln!("portico-gateway: {e}");
        std::process::exit(1);
    }

    info!(
        version = portico_gateway::VERSION,
        app = %config.app.profile,
        base_path = config.app.base_path(),
        listen = %config.gateway.listen_addr,
        upstream = %config.gateway.upstream_url,
        "starting portico gateway"
    );

    let server = match GatewayServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to create server: {}", e);
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }
}
