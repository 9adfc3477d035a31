use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use netwatch::capability::{CapabilityStore, MemoryCapabilityStore};
use netwatch::config;
use netwatch::diag::DiagLog;
use netwatch::monitor::DeviceMonitor;
use netwatch::trigger::{ChannelTriggerSink, TriggerEvent, TriggerSink};
use netwatch::VERSION;

#[derive(Parser, Debug)]
#[command(name = "netwatch", version, about = "TCP reachability monitoring agent")]
struct Cli {
    /// Path to the TOML device roster
    #[arg(short, long, default_value = "netwatch.toml")]
    config: String,
}

fn init_logging() {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily("logs", "netwatch.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // Default to `info` level if RUST_LOG is not set.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();
    info!(version = VERSION, "Starting netwatch agent...");

    let agent_config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Critical error loading configuration. Exiting.");
            return Err(Box::new(e) as Box<dyn Error>);
        }
    };

    let diag = Arc::new(DiagLog::new(agent_config.log_level));
    let capabilities: Arc<dyn CapabilityStore> = Arc::new(MemoryCapabilityStore::new());
    let (trigger_tx, mut trigger_rx) = mpsc::channel::<TriggerEvent>(32);
    let triggers: Arc<dyn TriggerSink> = Arc::new(ChannelTriggerSink::new(trigger_tx));
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    // Dispatch loop: where the surrounding application would fire its
    // automation triggers, the standalone agent logs the event.
    tokio::spawn(async move {
        while let Some(event) = trigger_rx.recv().await {
            match event {
                TriggerEvent::CameOnline(device) => {
                    info!(device = %device.name, "Trigger: device came online.");
                }
                TriggerEvent::WentOffline(device) => {
                    info!(device = %device.name, "Trigger: device went offline.");
                }
            }
        }
    });

    let mut handles = Vec::new();
    for raw in &agent_config.devices {
        let device_config = raw.validate();
        handles.push(DeviceMonitor::spawn(
            device_config,
            capabilities.clone(),
            triggers.clone(),
            diag.clone(),
            shutdown_rx.clone(),
        ));
    }
    info!(devices = handles.len(), "All device monitors spawned.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping device monitors.");
    let _ = shutdown_tx.send(());
    for handle in handles {
        handle.join().await;
    }
    info!("All device monitors stopped.");
    Ok(())
}
