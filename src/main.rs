//! castlink daemon - runs a WiFi Display session against wpa_supplicant.
//!
//! `castlink run` discovers peers and optionally connects to one; `config`
//! and `schema` print the effective configuration and its JSON schema.

use std::{error::Error, path::PathBuf, time::Duration};

use castlink::{
    config::{Config, ConfigPaths},
    services::p2p::{NetworkEvent, P2PService, WpaBackend},
    tracing_config,
};
use clap::{Parser, Subcommand};
use tokio_stream::StreamExt;
use tracing::{Level, error, info, span, warn};

#[derive(Parser)]
#[command(name = "castlink")]
#[command(about = "WiFi Display session manager")]
struct Cli {
    /// Configuration file, defaults to $XDG_CONFIG_HOME/castlink/config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the session until interrupted
    Run {
        /// Scan for this many seconds after startup, overriding the config
        #[arg(long)]
        scan: Option<u64>,

        /// Connect to the peer with this P2P device address once it is found
        #[arg(long)]
        connect: Option<String>,
    },
    /// Print the effective configuration as TOML
    Config,
    /// Print the JSON schema of the configuration file
    Schema,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Schema => {
            let schema = schemars::schema_for!(Config);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Commands::Config => {
            let config = load_config(cli.config)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Run { scan, connect } => {
            let config = load_config(cli.config)?;
            let _log_guard = if config.general.log_to_file {
                Some(tracing_config::init_with_file(config.general.log_level)?)
            } else {
                tracing_config::init(config.general.log_level)?;
                None
            };

            let _span = span!(Level::INFO, "castlink").entered();
            run(&config, scan, connect).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config, Box<dyn Error>> {
    let path = match path {
        Some(path) => path,
        None => ConfigPaths::main_config()?,
    };

    Ok(Config::load(&path)?)
}

async fn run(config: &Config, scan: Option<u64>, connect: Option<String>) -> Result<(), Box<dyn Error>> {
    info!("Starting castlink");

    let backend = WpaBackend::system(config.backend_options()).await?;
    let service = P2PService::start(Box::new(backend), config.session_settings());
    let mut events = service.events();

    let scan_timeout = Duration::from_secs(scan.unwrap_or(config.p2p.scan_timeout));
    service.scan(scan_timeout)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            event = events.next() => {
                let Some(event) = event else {
                    warn!("Session stopped unexpectedly");
                    break;
                };

                match &event {
                    NetworkEvent::DeviceFound(device) => {
                        info!("Found {} ({})", device.name, device.address);

                        if connect.as_deref() == Some(device.address.as_str())
                            && !service.connect(&device.address).await?
                        {
                            error!("Could not connect to {}", device.address);
                        }
                    }
                    NetworkEvent::DeviceLost(device) => {
                        info!("Lost {} ({})", device.name, device.address);
                    }
                    NetworkEvent::DeviceStateChanged(device) => {
                        match device.ipv4_address() {
                            Some(address) => info!(
                                "{} is {} at {address}",
                                device.address,
                                device.state()
                            ),
                            None => info!("{} is {}", device.address, device.state()),
                        }
                    }
                    NetworkEvent::DeviceChanged(_) | NetworkEvent::Changed => {}
                }
            }
        }
    }

    service.shutdown().await;

    Ok(())
}
