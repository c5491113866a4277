#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use padbind::input::keys::key_code_to_name;
use padbind::{DeviceRegistry, DriverTable, KeyReader, Settings};

#[derive(Parser)]
#[command(name = "padbind")]
#[command(version)]
#[command(about = "Input device bindings for emulator frontends", long_about = None)]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe input devices and print the device table
    List,
    /// Print key events as they arrive
    Watch {
        /// Per-read timeout, 0 waits forever
        #[arg(long, default_value_t = 0)]
        timeout_ms: u32,
    },
    /// Print the menu key bitfield every time it changes
    Menu,
    /// Apply the settings file, then write the current binds back to it
    Save,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let path = cli.config.unwrap_or_else(Settings::path);
    let mut settings = Settings::load_from(&path)?;

    let mut registry = DeviceRegistry::new(DriverTable::with_defaults(), settings.max_devices);
    registry.probe_cycle();
    let applied = settings.apply(&mut registry);
    info!(devices = registry.len(), binds = applied, "Input ready");
    registry.log_dump();

    let mut reader = KeyReader::new();

    match cli.command {
        Command::List => {
            print!("{}", registry.dump());
            Ok(())
        }
        Command::Watch { timeout_ms } => {
            reader.set_blocking(&mut registry, true);
            loop {
                let Some(event) = reader.read_keycode(&mut registry, timeout_ms) else {
                    continue;
                };
                let friendly = u16::try_from(event.code)
                    .map(key_code_to_name)
                    .unwrap_or_default();
                println!(
                    "#{}: {} {} {} ({})",
                    event.device,
                    if event.is_down { "down" } else { "up  " },
                    event.code,
                    registry.key_name(event.device, event.code),
                    friendly
                );
            }
        }
        Command::Menu => {
            reader.set_blocking(&mut registry, true);
            loop {
                let keys = reader.read_menu(&mut registry, 0);
                println!("{:08x} {:?}", keys.bits(), keys);
            }
        }
        Command::Save => {
            settings.capture(&registry);
            settings.save_to(&path)
        }
    }
}
