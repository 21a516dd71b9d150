//! Coyote simulator entry point.
//!
//! ```text
//! coyote-sim                     Run in the foreground
//! coyote-sim --config <path>     Load a custom config TOML
//! coyote-sim --listen <addr>     Override the listen address
//! coyote-sim --gen-config        Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use coyote_sim::config::SimConfig;
use coyote_sim::server::SimServer;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "coyote-sim", about = "Simulated Coyote playback appliance")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "coyote-sim.toml")]
    config: PathBuf,

    /// Listen address, overriding the config file.
    #[arg(short, long)]
    listen: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&SimConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = SimConfig::load(&cli.config);
    if let Some(listen) = cli.listen {
        config.network.listen = listen;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("coyote-sim v{}", env!("CARGO_PKG_VERSION"));
    info!("nickname: {}", config.device.nickname);
    info!("channels: {}", config.device.channels);
    info!("presets: {:?}", config.device.presets);

    let server = SimServer::bind(&config).await?;
    let stop = server.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    server.run().await?;
    Ok(())
}
