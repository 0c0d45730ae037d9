// Fleetmux - SSH fleet supervisor for systemd user services
// Main entry point

use anyhow::Result;
use clap::Parser;
use fleetmux::config::Config;
use fleetmux::fleet::{spawn_poller, Fleet};
use fleetmux::server::{self, AppState};
use fleetmux::version::build_info;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "fleetmux")]
#[command(author, about, long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Show version information
    #[arg(short = 'V', long)]
    version: bool,

    /// Show detailed build information
    #[arg(long)]
    build_info: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle version flag
    if cli.version {
        println!("{}", build_info().format_display());
        return Ok(());
    }

    // Handle build info flag
    if cli.build_info {
        println!("{}", build_info().format_display());
        println!("\n{}", build_info().format_build_info());
        return Ok(());
    }

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if cli.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!("Fleetmux starting");

    run_server(cli.config).await
}

async fn run_server(config_path: Option<String>) -> Result<()> {
    // Load configuration
    let config = Config::load(config_path.map(std::path::PathBuf::from))?;

    // Build the fleet and attempt every initial connection; unreachable
    // hosts stay degraded and are retried by the poller
    let fleet = Arc::new(Fleet::from_config(&config.hosts));
    fleet.connect_all().await;

    let interval = config.poll_interval_secs.map(Duration::from_secs);
    let _poller = spawn_poller(Arc::clone(&fleet), interval);

    let addr: SocketAddr = format!("{}:{}", config.listen_host, config.listen_port).parse()?;
    server::serve(AppState::new(fleet), addr).await
}
