//! Ext.Direct router server
//!
//! Exposes registered methods to browser clients over a single HTTP
//! endpoint, with a self-describing API descriptor.
//!
//! Usage:
//!   extdirect                                   # Default port 7070, mounted at /api
//!   extdirect --port 8080 --base-path /direct   # Custom port and mount point
//!   extdirect --debug                           # Disclose failure detail to clients
//!   extdirect --log-file                        # Log to ~/.extdirect/logs/router.log

mod demo;

use std::path::PathBuf;

use clap::Parser;
use direct_server::{DirectServer, MethodRegistry, ProviderConfig, ServerConfig};
use direct_transport::{TransportConfig, TransportServer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "extdirect", about = "Ext.Direct router server")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "7070")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Path prefix for api.json, api.js and router
    #[arg(long, default_value = "/api")]
    base_path: String,

    /// Router URL to advertise instead of <base-path>/router
    #[arg(long)]
    router_url: Option<String>,

    /// Debug mode: send failure messages and detail to clients
    #[arg(long)]
    debug: bool,

    /// Message sent for hidden failures in production mode
    #[arg(long, default_value = "Internal error.")]
    generic_error: String,

    /// Client-side variable the API descriptor is assigned to in api.js
    #[arg(long, default_value = "Ext.app.REMOTING_API")]
    provider_name: String,

    /// Do not append the provider bootstrap lines to api.js
    #[arg(long)]
    no_autoadd: bool,

    /// Cookie the api.js token hook reads
    #[arg(long, default_value = "csrftoken")]
    csrf_cookie: String,

    /// Run the calls of a batch concurrently
    #[arg(long)]
    concurrent_batches: bool,

    /// Report failed uploads with success: false
    #[arg(long)]
    strict_upload_status: bool,

    /// Enable CORS
    #[arg(long)]
    enable_cors: bool,

    /// Maximum request body size in bytes
    #[arg(long, default_value = "10485760")]
    max_body_bytes: usize,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file (defaults to ~/.extdirect/logs/router.log if no path given)
    #[arg(long, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,
}

fn init_logging(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let Some(ref log_file_arg) = cli.log_file else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return;
    };

    let log_path = if log_file_arg == "DEFAULT" {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".extdirect/logs/router.log")
    } else {
        PathBuf::from(log_file_arg)
    };

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
            eprintln!("Logging to {}", log_path.display());
        }
        Err(e) => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            error!("Failed to open log file {}: {e}", log_path.display());
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut registry = MethodRegistry::new();
    demo::register(&mut registry);

    let server_config = ServerConfig {
        debug: cli.debug,
        generic_error: cli.generic_error.clone(),
        concurrent_batches: cli.concurrent_batches,
        upload_reports_failure: cli.strict_upload_status,
        provider: ProviderConfig {
            name: cli.provider_name.clone(),
            autoadd: !cli.no_autoadd,
            csrf_cookie: cli.csrf_cookie.clone(),
        },
        ..ServerConfig::default()
    };
    let server = DirectServer::new(registry, server_config);

    let transport_config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        base_path: cli.base_path.clone(),
        router_url: cli.router_url.clone(),
        enable_cors: cli.enable_cors,
        max_body_bytes: cli.max_body_bytes,
        verbose_logging: cli.verbose,
    };
    let router_url = transport_config.router_url();

    let mut transport = match TransportServer::start(transport_config, server).await {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to start transport: {e}");
            std::process::exit(1);
        }
    };

    info!(
        "Serving on http://{}:{} (router: {router_url}, debug: {})",
        cli.hostname,
        transport.port(),
        cli.debug
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }

    info!("Shutting down...");
    transport.stop().await;
}
