//! CLI entry point for scpi-sync.
//!
//! Connects to a LAN instrument over its raw SCPI socket, builds the subsystems
//! described by an instrument profile, and reads or changes their state.
//!
//! # Usage
//!
//! ```bash
//! scpi-sync --profile config/instrument.toml --host 192.168.1.50 status
//! scpi-sync --host 192.168.1.50 interlocks --mask 1
//! scpi-sync --host 192.168.1.50 output on
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use scpi_sync::config::{InstrumentProfile, DEFAULT_PROFILE_PATH};
use scpi_sync::logging::{self, LoggingConfig, OutputFormat};
use scpi_sync::notify::BroadcastSink;
use scpi_sync::port::SyncContext;
use scpi_sync::subsystems::{CompensationType, Instrument};
use scpi_sync::token_table::WireEnum;
use scpi_sync::transport::tcp::{TcpTransport, DEFAULT_PORT, DEFAULT_TIMEOUT_MS};

#[derive(Parser)]
#[command(name = "scpi-sync")]
#[command(about = "Read and change SCPI instrument state through a profile", long_about = None)]
struct Cli {
    /// Instrument profile (TOML)
    #[arg(long, default_value = DEFAULT_PROFILE_PATH)]
    profile: PathBuf,

    /// Instrument host name or address
    #[arg(long)]
    host: String,

    /// SCPI socket port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Query timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query every configured attribute once
    Status,

    /// List slots on which the interlock mask is engaged
    Interlocks {
        /// Interlock bits that must all be engaged
        #[arg(long, default_value_t = 1)]
        mask: u32,
    },

    /// Switch the output on or off
    Output {
        /// Requested state
        state: Switch,
    },

    /// Enable or disable a compensation standard by wire token (e.g. OPEN)
    Compensation {
        /// Wire token
        token: String,
        /// Requested state
        state: Switch,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let profile = InstrumentProfile::load_from(&cli.profile)?;
    let format = if cli.json_logs {
        OutputFormat::Json
    } else {
        OutputFormat::Compact
    };
    logging::init(LoggingConfig::from_profile(&profile)?.with_format(format))?;

    let transport = TcpTransport::connect(&cli.host, cli.port)
        .await?
        .with_timeout(Duration::from_millis(cli.timeout_ms));
    let sink = Arc::new(BroadcastSink::default());
    let mut changes = sink.subscribe();
    let ctx = SyncContext::new(Arc::new(transport), sink);
    let mut instrument = Instrument::from_profile(&profile, ctx)?;

    println!("{} at {}:{}", instrument.name(), cli.host, cli.port);

    match cli.command {
        Commands::Status => status(&mut instrument).await?,
        Commands::Interlocks { mask } => {
            let engaged = instrument.slots.engaged_slots(mask).await?;
            println!("mask {:#x} engaged on slots {:?}", mask, engaged);
        }
        Commands::Output { state } => {
            let on = instrument.output.enable(matches!(state, Switch::On)).await?;
            println!("output {}", if on { "ON" } else { "OFF" });
        }
        Commands::Compensation { token, state } => {
            let table = CompensationType::token_table()?;
            let kind = table.from_token(&token)?;
            let active = match state {
                Switch::On => instrument.compensation.enable(kind).await?,
                Switch::Off => instrument.compensation.disable(kind).await?,
            };
            println!("compensation: {:?}", active.members(table).collect::<Vec<_>>());
        }
    }

    while let Ok(change) = changes.try_recv() {
        tracing::debug!(attribute = %change.attribute, "attribute changed");
    }
    Ok(())
}

async fn status(instrument: &mut Instrument) -> Result<()> {
    let mode = instrument.output.mode().query().await?;
    let on = instrument.output.state().query().await?;
    println!("output: {} ({:?})", if on { "ON" } else { "OFF" }, mode);

    let active = instrument.compensation.types().query().await?;
    let table = CompensationType::token_table()?;
    println!("compensation: {:?}", active.members(table).collect::<Vec<_>>());

    for slot in 1..=instrument.slots.len() as u32 {
        let exists = instrument.slots.exists(slot).await?;
        if exists {
            let state = instrument.slots.interlocks_state(slot).await?;
            println!("slot {}: present, interlocks {:#x}", slot, state);
        } else {
            println!("slot {}: empty", slot);
        }
    }
    Ok(())
}
