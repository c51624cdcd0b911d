//! Wand - input event remapping daemon
//!
//! Reads events from keyboards, wheels and dials and, according to a rule
//! file, emits key combos, calls session-bus methods or launches commands
//! depending on the device, held keys, motion value and focused application.

mod actions;
mod config;
mod device;
mod event;
mod event_loop;
mod focus;
mod ipc;
mod keyboard;
mod rules;
mod state;

use actions::{ActionDispatcher, MethodCaller, ProcessSpawner};
use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use device::{EvdevSource, InputSource, RestartPolicy};
use event_loop::EventLoop;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Events buffered between device workers and the dispatch loop
const INTAKE_CAPACITY: usize = 256;

/// Wand - remap keys, wheels and dials to actions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the rule configuration (TOML, or JSON with a .json extension)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug output and write the config back on exit
    #[arg(short, long)]
    debug: bool,

    /// Minimum time between two accepted wheel/dial events
    #[arg(long, value_name = "MS", default_value_t = state::DEFAULT_DEBOUNCE.as_millis() as u64)]
    threshold: u64,

    /// Delay before reopening a device after a read error
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    backoff: u64,

    /// Upper bound when the reconnect delay doubles (defaults to --backoff)
    #[arg(long, value_name = "MS")]
    max_backoff: Option<u64>,

    /// Print the available input devices and exit
    #[arg(long)]
    list_devices: bool,
}

impl Cli {
    fn restart_policy(&self) -> RestartPolicy {
        let initial = Duration::from_millis(self.backoff);
        match self.max_backoff {
            Some(max) => RestartPolicy {
                initial,
                max: Duration::from_millis(max).max(initial),
            },
            None => RestartPolicy::fixed(initial),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let source = Arc::new(EvdevSource);

    if cli.list_devices {
        for info in source.list() {
            println!("{}\t{}", info.path.display(), info.name);
        }
        return Ok(());
    }

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let (config, rules) = Config::load(&config_path)?;
    if rules.is_empty() {
        warn!("No rules configured; events will be read but nothing will fire");
    }

    let bus: Box<dyn MethodCaller> = match ipc::SessionBus::connect().await {
        Ok(bus) => Box::new(bus),
        Err(e) => {
            warn!("{e:#}; D-Bus actions will fail");
            Box::new(ipc::NoSessionBus)
        }
    };
    let focus = focus::create_focus_source();
    let keyboard = keyboard::VirtualKeyboard::create()
        .context("Could not create virtual input device (/dev/uinput)")?;

    for info in source.list() {
        debug!("ID-> {:?} Device-> {}", info.path, info.name);
    }

    let (intake_tx, intake_rx) = mpsc::channel(INTAKE_CAPACITY);
    device::start_workers(source, &config.devices, intake_tx, cli.restart_policy())?;

    let (stop_tx, mut stop_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(true);
    })
    .context("Failed to install signal handler")?;

    let dispatcher = ActionDispatcher::new(Box::new(keyboard), bus, Box::new(ProcessSpawner));
    let event_loop = EventLoop::new(rules, dispatcher, focus, Duration::from_millis(cli.threshold));

    event_loop
        .run(intake_rx, async move {
            let _ = stop_rx.wait_for(|&stop| stop).await;
        })
        .await;

    info!("Shutting down...");
    if cli.debug {
        config.save(&config_path)?;
    }
    Ok(())
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
