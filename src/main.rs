//! AMIB console
//!
//! Debug console for the AMIB master board: handshakes over the serial link,
//! then lets the user switch states, write values and fire events.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amib_console::config::AppConfig;
use amib_console::console::{run_repl, Console};
use amib_console::discovery::resolve_port;
use amib_console::link::{exit_code, LinkError};
use amib_console::manager::{LinkOptions, Manager};
use amib_console::registry::{StateRegistry, BUILD_ID};
use amib_console::serial::SerialPort;

/// AMIB console - drive the master board from a terminal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Serial device of the master (skips hardware discovery)
    #[arg(short, long)]
    port: Option<String>,

    /// Path to the hardware manifest (overrides the config)
    #[arg(long)]
    hardware: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Print the state registry and exit
    #[arg(long)]
    list_states: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::from(1);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let registry = StateRegistry::standard();

    if args.list_states {
        print_states(registry);
        return Ok(());
    }

    let mut config = AppConfig::load_or_default(&args.config).await?;
    if let Some(hardware) = args.hardware {
        config.hardware_file = hardware;
    }

    let port = resolve_port(args.port.as_deref(), &config)?;
    info!("Opening master on {}", port.display());

    let serial = SerialPort::open(&port, config.baud_rate)
        .map_err(LinkError::from)
        .with_context(|| format!("Failed to open {}", port.display()))?;
    let (reader, writer) = tokio::io::split(serial);

    tokio::time::sleep(Duration::from_millis(config.settle_ms)).await;

    let options = LinkOptions {
        build_id: config.build_id,
        report_buffer: config.report_buffer,
    };
    let mut manager = Manager::connect(reader, writer, registry, options)
        .await
        .context("Handshake with master failed")?;
    let reports = manager.take_report_receiver();

    let manager = Arc::new(manager);
    let console = Console::new(manager.clone(), registry, config.tests.clone());
    run_repl(console, reports).await?;

    match Arc::try_unwrap(manager) {
        Ok(manager) => manager.shutdown().await,
        Err(_) => warn!("Manager still shared at exit, skipping link shutdown"),
    }

    info!("AMIB console shutdown complete");
    Ok(())
}

fn print_states(registry: StateRegistry) {
    println!("\n{}", "=== State Registry ===".bold().cyan());
    println!("  Build ID: {}", format!("{:#010x}", BUILD_ID).green());

    for desc in registry.states() {
        println!("\n  {} {}", desc.id().to_string().yellow(), desc.name().bright_white().bold());

        if !desc.master.values.is_empty() {
            println!("    {}", "Master values:".bold());
            for value in desc.master.values {
                let slot = value.slot();
                println!(
                    "      {}: {} {} (address {}, default {})",
                    value.name().green(),
                    slot.data_type(),
                    slot.data_type().type_tag().dimmed(),
                    slot.address(),
                    slot.default_value()
                );
            }
        }

        if !desc.master.events.is_empty() {
            println!("    {}", "Master events:".bold());
            for event in desc.master.events {
                println!("      {} {}", event.index().to_string().yellow(), event.name().green());
            }
        }

        if !desc.tablet.values.is_empty() {
            println!("    {}", "Tablet values:".bold());
            for local in desc.tablet.values {
                println!(
                    "      {}: {} {} (index {})",
                    local.name.green(),
                    local.value.data_type(),
                    local.value.data_type().type_tag().dimmed(),
                    local.value.index()
                );
            }
        }

        if !desc.tablet.events.is_empty() {
            println!("    {}", "Tablet events:".bold());
            for event in desc.tablet.events {
                let local = event.local_event();
                println!(
                    "      {} (index {}, flag {})",
                    event.name().green(),
                    local.index(),
                    local.flag()
                );
            }
        }
    }
    println!();
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level '{}'", level))?;

    // stdout belongs to the console prompt
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}
