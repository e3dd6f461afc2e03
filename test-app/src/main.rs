// neovolib test application -- CLI tool for exercising an AG Neovo display
// over its SICP LAN control port.
//
// Usage:
//   neovolib-test-app --host 192.168.1.50 power get
//   neovolib-test-app --host 192.168.1.50 power on
//   neovolib-test-app --host 192.168.1.50 input set hdmi
//   neovolib-test-app --host 192.168.1.50 volume set 40 20
//   neovolib-test-app --host 192.168.1.50 --monitor-id 3 info
//   neovolib-test-app --host 192.168.1.50 raw 0x19 --query
//   neovolib-test-app --host 192.168.1.50 --verbose monitor --poll-interval-ms 2000
//   neovolib-test-app inputs

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use neovolib::{
    Command as SicpCommand, DEFAULT_PORT, DeviceInfoItem, DisplayEvent, InputLabels,
    NeovoBuilder, NeovoClient, Poller, PowerState, Volume,
};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// neovolib test application -- exercises a display from the command line.
#[derive(Parser)]
#[command(name = "neovolib-test-app", version, about)]
struct Cli {
    /// Display host name or IP address.
    /// Required for all commands except `inputs`.
    #[arg(long)]
    host: Option<String>,

    /// LAN control port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Monitor ID addressed in every frame.
    #[arg(long, default_value_t = 1)]
    monitor_id: u8,

    /// Time to wait for each reply before retransmitting, in milliseconds.
    #[arg(long, default_value_t = 500)]
    timeout_ms: u64,

    /// Retransmissions after the first attempt.
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// Log protocol traffic (same as RUST_LOG=debug).
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Parse a hex string like "0x19" or "19" into a u8.
fn parse_hex_u8(s: &str) -> std::result::Result<u8, String> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u8::from_str_radix(s, 16).map_err(|e| format!("invalid hex byte: {e}"))
}

#[derive(Subcommand)]
enum Command {
    /// Power operations.
    Power {
        #[command(subcommand)]
        action: PowerAction,
    },

    /// Input source operations.
    Input {
        #[command(subcommand)]
        action: InputAction,
    },

    /// Volume operations.
    Volume {
        #[command(subcommand)]
        action: VolumeAction,
    },

    /// Print model and firmware version.
    Info,

    /// Print the operating-hours counter.
    Hours,

    /// Poll the display and print state changes and events.
    Monitor {
        /// Poll interval in milliseconds (0 = poll on connect only).
        #[arg(long, default_value_t = 5000)]
        poll_interval_ms: u64,

        /// Duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Send a raw command code with optional parameter bytes (hex).
    Raw {
        /// Command code (hex, e.g. 0x19).
        #[arg(value_parser = parse_hex_u8)]
        code: u8,

        /// Parameter bytes (hex, e.g. 0x02).
        #[arg(value_parser = parse_hex_u8)]
        params: Vec<u8>,

        /// Wait for a data reply echoing the command code instead of an
        /// acknowledgement.
        #[arg(long)]
        query: bool,
    },

    /// Stress test: concurrent power queries through the command queue.
    Stress {
        /// Number of queries.
        #[arg(long, default_value_t = 100)]
        count: u32,

        /// Queries submitted at once.
        #[arg(long, default_value_t = 4)]
        concurrency: u32,
    },

    /// List the known input source codes. Does not require --host.
    Inputs,
}

#[derive(Subcommand)]
enum PowerAction {
    /// Read the power state.
    Get,
    /// Switch the display on.
    On,
    /// Put the display into standby.
    Off,
}

#[derive(Subcommand)]
enum InputAction {
    /// Read the current input source.
    Get,
    /// Select an input source.
    Set {
        /// Source name (e.g. hdmi, vga, dp1) or code (e.g. 13, 0x0D).
        source: String,
    },
}

#[derive(Subcommand)]
enum VolumeAction {
    /// Read speaker and line-out volume.
    Get,
    /// Set speaker and line-out volume (0-100).
    Set {
        /// Speaker volume.
        speaker: u8,
        /// Line-out volume (defaults to the current line-out level).
        line_out: Option<u8>,
    },
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_client(cli: &Cli) -> Result<NeovoClient> {
    let Some(host) = cli.host.as_deref() else {
        bail!("--host is required for this command");
    };
    if cli.timeout_ms == 0 {
        bail!("--timeout-ms must be greater than zero");
    }

    let client = NeovoBuilder::new()
        .host(host)
        .port(cli.port)
        .monitor_id(cli.monitor_id)
        .command_timeout(Duration::from_millis(cli.timeout_ms))
        .retries(cli.retries)
        .build()?;
    debug!(endpoint = %client.endpoint(), config = ?client.config(), "client configured");
    Ok(client)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_power_get(display: &NeovoClient) -> Result<()> {
    let state = display.get_power().await?;
    println!("Power: {state}");
    Ok(())
}

async fn cmd_power_set(display: &NeovoClient, state: PowerState) -> Result<()> {
    display.set_power(state).await?;
    println!("Power set to {state}");
    Ok(())
}

async fn cmd_input_get(display: &NeovoClient, labels: &InputLabels) -> Result<()> {
    let code = display.get_input().await?;
    println!("Input: {} (0x{code:02X})", labels.label(code));
    Ok(())
}

async fn cmd_input_set(display: &NeovoClient, labels: &InputLabels, source: &str) -> Result<()> {
    let code = labels
        .code_for(source)
        .with_context(|| format!("unknown input source: {source} (see `inputs`)"))?;
    display.set_input(code).await?;
    println!("Input set to {} (0x{code:02X})", labels.label(code));
    Ok(())
}

async fn cmd_volume_get(display: &NeovoClient) -> Result<()> {
    let volume = display.get_volume().await?;
    println!("Speaker:   {}", volume.speaker);
    println!("Line-out:  {}", volume.line_out);
    Ok(())
}

async fn cmd_volume_set(display: &NeovoClient, speaker: u8, line_out: Option<u8>) -> Result<()> {
    // Setting one channel must not disturb the other.
    let volume = match line_out {
        Some(line_out) => Volume::new(speaker, line_out),
        None => display
            .get_volume()
            .await
            .context("reading current line-out volume")?
            .with_speaker(speaker),
    };
    if volume.speaker != speaker || line_out.is_some_and(|l| l != volume.line_out) {
        eprintln!("Warning: volume clamped to {volume}");
    }
    display.set_volume(volume).await?;
    println!("Volume set to {volume}");
    Ok(())
}

async fn cmd_info(display: &NeovoClient) -> Result<()> {
    let model = display.get_device_info(DeviceInfoItem::ModelNumber).await?;
    let firmware = display
        .get_device_info(DeviceInfoItem::FirmwareVersion)
        .await?;

    println!("Display Information");
    println!("  Endpoint:       {}", display.endpoint());
    println!("  Monitor ID:     {}", display.config().monitor_id);
    println!("  Model:          {model}");
    println!("  Firmware:       {firmware}");
    Ok(())
}

async fn cmd_hours(display: &NeovoClient) -> Result<()> {
    let hours = display.get_operating_hours().await?;
    println!("Operating hours: {hours}");
    Ok(())
}

async fn cmd_raw(display: &NeovoClient, code: u8, params: &[u8], query: bool) -> Result<()> {
    let command = if query {
        SicpCommand::query(code, params)
    } else {
        SicpCommand::set(code, params)
    };
    match display.execute(&command).await? {
        Some(payload) => println!("Response: {payload:02X?}"),
        None => println!("Acknowledged"),
    }
    Ok(())
}

async fn cmd_monitor(
    display: Arc<NeovoClient>,
    labels: &InputLabels,
    poll_interval: Duration,
    duration_secs: u64,
    verbose: bool,
) -> Result<()> {
    let poller = Poller::spawn(Arc::clone(&display), poll_interval);
    let mut state = poller.subscribe();
    let mut events = display.subscribe();

    println!("Monitoring display (Ctrl-C to stop)...");

    let deadline = (duration_secs > 0).then(|| Instant::now() + Duration::from_secs(duration_secs));

    loop {
        let timeout = match deadline {
            Some(dl) => {
                let remaining = dl.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    println!("Monitor duration elapsed.");
                    break;
                }
                remaining
            }
            None => Duration::from_secs(3600),
        };

        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                if deadline.is_some() {
                    println!("Monitor duration elapsed.");
                    break;
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    println!("Poller stopped.");
                    break;
                }
                let s = state.borrow_and_update().clone();
                println!(
                    "[state] {} power={} input={} volume={} model={} fw={} hours={}",
                    s.connection,
                    s.power,
                    s.input_label(labels),
                    s.volume,
                    s.model,
                    s.firmware_version,
                    s.operating_hours,
                );
            }
            event = events.recv() => match event {
                Ok(DisplayEvent::Disconnected { cause }) => {
                    println!("[event] disconnected: {}", cause.as_deref().unwrap_or("closed"));
                    break;
                }
                Ok(event) if verbose || !event.is_diagnostic() => println!("[event] {event:?}"),
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    println!("[warning] missed {n} events (consumer too slow)");
                }
                Err(RecvError::Closed) => {
                    println!("Event channel closed.");
                    break;
                }
            },
        }
    }

    poller.stop().await;
    Ok(())
}

async fn cmd_stress(display: Arc<NeovoClient>, count: u32, concurrency: u32) -> Result<()> {
    if concurrency == 0 {
        bail!("--concurrency must be at least 1");
    }
    println!("Stress test: {count} power queries, {concurrency} at a time");

    let mut success = 0u32;
    let mut failures = 0u32;
    let mut slowest = Duration::ZERO;
    let start = Instant::now();

    let mut submitted = 0u32;
    while submitted < count {
        let batch = concurrency.min(count - submitted);
        let mut tasks = JoinSet::new();
        for _ in 0..batch {
            let display = Arc::clone(&display);
            tasks.spawn(async move {
                let sent = Instant::now();
                let result = display.get_power().await;
                (result, sent.elapsed())
            });
        }
        submitted += batch;

        while let Some(joined) = tasks.join_next().await {
            let (result, elapsed) = joined.context("query task panicked")?;
            slowest = slowest.max(elapsed);
            match result {
                Ok(_) => success += 1,
                Err(e) => {
                    eprintln!("[{submitted}/{count}] get_power failed: {e}");
                    failures += 1;
                }
            }
        }
    }

    let elapsed = start.elapsed();
    let rate = if elapsed.as_secs_f64() > 0.0 {
        count as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    println!();
    println!("Results:");
    println!("  Total queries:  {count}");
    println!("  Successes:      {success}");
    println!("  Failures:       {failures}");
    println!("  Elapsed:        {:.3} s", elapsed.as_secs_f64());
    println!("  Slowest:        {} ms", slowest.as_millis());
    println!("  Rate:           {rate:.1} queries/sec");

    if failures > 0 {
        bail!("{failures} out of {count} stress test queries failed");
    }

    Ok(())
}

fn cmd_inputs(labels: &InputLabels) -> Result<()> {
    println!("{:<6} {:<18} Label", "Code", "Name");
    println!("{:-<6} {:-<18} {:-<20}", "", "", "");
    for (code, name, label) in labels.iter() {
        println!("0x{code:02X}   {name:<18} {label}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let labels = InputLabels::default();

    // The `inputs` command does not require a display connection.
    if matches!(&cli.command, Command::Inputs) {
        return cmd_inputs(&labels);
    }

    let display = Arc::new(build_client(&cli)?);
    display
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}", display.endpoint()))?;

    let result = match &cli.command {
        Command::Power { action } => match action {
            PowerAction::Get => cmd_power_get(&display).await,
            PowerAction::On => cmd_power_set(&display, PowerState::On).await,
            PowerAction::Off => cmd_power_set(&display, PowerState::Off).await,
        },
        Command::Input { action } => match action {
            InputAction::Get => cmd_input_get(&display, &labels).await,
            InputAction::Set { source } => cmd_input_set(&display, &labels, source).await,
        },
        Command::Volume { action } => match action {
            VolumeAction::Get => cmd_volume_get(&display).await,
            VolumeAction::Set { speaker, line_out } => {
                cmd_volume_set(&display, *speaker, *line_out).await
            }
        },
        Command::Info => cmd_info(&display).await,
        Command::Hours => cmd_hours(&display).await,
        Command::Raw {
            code,
            params,
            query,
        } => cmd_raw(&display, *code, params, *query).await,
        Command::Monitor {
            poll_interval_ms,
            duration,
        } => {
            cmd_monitor(
                Arc::clone(&display),
                &labels,
                Duration::from_millis(*poll_interval_ms),
                *duration,
                cli.verbose,
            )
            .await
        }
        Command::Stress { count, concurrency } => {
            cmd_stress(Arc::clone(&display), *count, *concurrency).await
        }
        Command::Inputs => unreachable!("inputs handled above"),
    };

    display.disconnect().await;
    result
}
