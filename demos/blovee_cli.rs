//! CLI application for controlling Govee lights through the cloud API.
//!
//! This demo drives a [`Hub`] from the command line: discovery, state
//! refresh, power and brightness commands, and a watch loop backed by
//! [`Poller`].
//!
//! Run with: cargo run --example blovee_cli -- --help

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use blovee_rs::{Device, Hub, HubConfig, Poller};

#[derive(Parser)]
#[command(name = "blovee-cli")]
#[command(about = "Control Govee lights through the cloud API", long_about = None)]
struct Cli {
    /// Govee developer API key (falls back to the BLOVEE_API_KEY variable)
    #[arg(short, long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all lights on the account
    Discover,

    /// Refresh and print the state of every light
    Status,

    /// Turn a light on
    On {
        /// Device identifier as printed by `discover`
        device: String,
        /// Optional brightness level (0-255)
        #[arg(short, long)]
        brightness: Option<u8>,
    },

    /// Turn a light off
    Off {
        /// Device identifier as printed by `discover`
        device: String,
    },

    /// Set brightness from a 0-255 level
    Brightness {
        /// Device identifier as printed by `discover`
        device: String,
        /// Brightness level (0-255), rescaled to 1-100 before sending
        level: u8,
    },

    /// Print diagnostics after a refresh
    Diagnostics,

    /// Poll every light on an interval and print changes
    Watch {
        /// Poll interval in seconds (default: 10)
        #[arg(short, long, default_value = "10")]
        interval: u64,
    },
}

fn print_device(device: &Device) {
    let power = if device.is_on() { "ON" } else { "OFF" };
    println!(
        "  {:24} {:28} {:8} {:3} {:3}%",
        device.id(),
        device.name(),
        device.model(),
        power,
        device.brightness().value()
    );
    if let Some(err) = device.error() {
        println!("    error: {}", err);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let api_key = match cli.api_key {
        Some(key) => key,
        None => std::env::var("BLOVEE_API_KEY")
            .map_err(|_| "API key is required. Use --api-key <KEY> or set BLOVEE_API_KEY")?,
    };

    let hub = Arc::new(Hub::setup(HubConfig::new(&api_key)).await?);

    match cli.command {
        Commands::Discover => {
            let devices = hub.devices();
            if devices.is_empty() {
                println!("No lights found on this account.");
            } else {
                println!("Found {} light(s):", devices.len());
                for device in &devices {
                    print_device(device);
                }
            }
        }

        Commands::Status => {
            for device in hub.refresh_all().await? {
                print_device(&device);
            }
        }

        Commands::On { device, brightness } => {
            println!("Turning {} ON...", device);
            let device = hub.turn_on(&device, brightness).await?;
            print_device(&device);
        }

        Commands::Off { device } => {
            println!("Turning {} OFF...", device);
            let device = hub.turn_off(&device).await?;
            print_device(&device);
        }

        Commands::Brightness { device, level } => {
            println!("Setting brightness of {} to level {}...", device, level);
            let device = hub.set_brightness(&device, level).await?;
            print_device(&device);
        }

        Commands::Diagnostics => {
            hub.refresh_all().await?;
            println!("{}", serde_json::to_string_pretty(&hub.diagnostics())?);
        }

        Commands::Watch { interval } => {
            hub.subscribe(|device| println!("New light: {} ({})", device.name(), device.id()));

            let handle = Poller::new(Arc::clone(&hub))
                .with_interval(Duration::from_secs(interval))?
                .with_discovery(true)
                .spawn();
            let mut updates = handle.updates();
            println!("Watching {} light(s)... (Press Ctrl+C to stop)\n", hub.devices().len());

            while updates.changed().await.is_ok() {
                let devices = updates.borrow_and_update().clone();
                for device in &devices {
                    print_device(device);
                }
                println!();
            }
        }
    }

    Ok(())
}
