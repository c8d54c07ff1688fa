//! IDE Tracker CLI
//!
//! Runs tracking sessions fed by JSON lines on stdin, and exposes the
//! availability probes and configuration file.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::{bounded, select, unbounded, Receiver};
use serde::Deserialize;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use ide_tracker::{
    capture::{HostEvent, HostInfo, LocalSurface},
    config::{Config, FileConfigSource},
    probe::AvailabilityProbe,
    session::SessionCoordinator,
    CAPTURE_DECLARATION, VERSION,
};

#[derive(Parser)]
#[command(name = "ide-tracker")]
#[command(version = VERSION)]
#[command(about = "Journal IDE interaction events for research sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a tracking session fed by JSON lines on stdin
    Record {
        /// Project root the session belongs to
        #[arg(long)]
        project: PathBuf,

        /// Configuration file (defaults to the user config directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run one availability probe against the configured interpreter
    Probe {
        #[arg(value_enum)]
        check: ProbeCheck,

        /// Interpreter to probe (defaults to the configured one)
        #[arg(long)]
        interpreter: Option<String>,

        /// Configuration file (defaults to the user config directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show configuration
    Config {
        /// Write a default configuration file if none exists
        #[arg(long)]
        init: bool,

        /// Configuration file (defaults to the user config directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Display what a session records
    Declaration,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProbeCheck {
    Environment,
    Device,
    DeviceName,
    Frequencies,
}

/// A session control command read from stdin.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Control {
    Pause,
    Resume,
    Stop,
    Label,
}

#[derive(Debug, Deserialize)]
struct ControlLine {
    control: Control,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputLine {
    Control(ControlLine),
    Event(HostEvent),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Record { project, config } => cmd_record(project, config),
        Commands::Probe {
            check,
            interpreter,
            config,
        } => cmd_probe(check, interpreter, config),
        Commands::Config { init, path } => cmd_config(init, path),
        Commands::Declaration => {
            println!("{CAPTURE_DECLARATION}");
            Ok(())
        }
    }
}

fn cmd_record(project: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let project = std::fs::canonicalize(&project)
        .with_context(|| format!("project directory {} not found", project.display()))?;
    let source = FileConfigSource::new(config.unwrap_or_else(Config::config_path));

    let surface = Arc::new(LocalSurface::new(HostInfo {
        ide_name: "ide-tracker".to_string(),
        ide_version: VERSION.to_string(),
        ..HostInfo::default()
    }));
    let mut coordinator = SessionCoordinator::new(Arc::new(source), surface.clone());

    let output_dir = coordinator
        .start(&project)
        .context("failed to start tracking")?
        .to_path_buf();

    println!("IDE Tracker v{VERSION}");
    println!("Tracking {}", project.display());
    println!("Output: {}", output_dir.display());
    println!();
    println!("Reading events from stdin. Press Ctrl+C or close stdin to stop.");
    println!();

    let (interrupt_tx, interrupt_rx) = bounded(1);
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    })
    .context("failed to set Ctrl+C handler")?;

    let lines = spawn_stdin_reader();
    loop {
        select! {
            recv(lines) -> line => match line {
                Ok(line) => {
                    if !handle_line(&line, &mut coordinator, &surface) {
                        break;
                    }
                }
                Err(_) => break,
            },
            recv(interrupt_rx) -> _ => break,
        }
    }

    println!();
    println!("Stopping session...");
    let summary = coordinator.stop().context("failed to stop tracking")?;

    println!("Journal: {}", summary.journal_path.display());
    println!("Events recorded: {}", summary.event_count);
    println!();
    println!(
        "Snapshots written: {} (failed: {})",
        summary.stats.snapshots_written, summary.stats.snapshots_failed
    );
    println!(
        "Session duration: {} seconds",
        (summary.stopped_at - summary.started_at).num_seconds()
    );
    Ok(())
}

/// Apply one input line. Returns `false` when the session should stop.
fn handle_line(line: &str, coordinator: &mut SessionCoordinator, surface: &LocalSurface) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return true;
    }

    let input = match serde_json::from_str::<InputLine>(line) {
        Ok(input) => input,
        Err(e) => {
            warn!("Ignoring unrecognized input line: {e}");
            return true;
        }
    };

    let result = match input {
        InputLine::Event(event) => {
            surface.dispatch(&event);
            Ok(())
        }
        InputLine::Control(ControlLine { control, label }) => match control {
            Control::Pause => coordinator.pause(),
            Control::Resume => coordinator.resume(),
            Control::Stop => return false,
            Control::Label => match label {
                Some(label) => coordinator.add_label(&label),
                None => {
                    warn!("Ignoring label control without a label");
                    Ok(())
                }
            },
        },
    };

    if let Err(e) = result {
        warn!("{e}");
    }
    true
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn cmd_probe(
    check: ProbeCheck,
    interpreter: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config_path = config_path.unwrap_or_else(Config::config_path);
    let config = if Config::exists_at(&config_path) {
        Config::load_from(&config_path)?
    } else {
        Config::default()
    };
    let interpreter = interpreter.unwrap_or(config.python_interpreter);
    let probe = AvailabilityProbe::new(interpreter, config.probe_timeout)?;

    match check {
        ProbeCheck::Environment => {
            let ok = probe.check_environment()?;
            println!(
                "Environment ({}): {}",
                probe.interpreter(),
                if ok { "OK ✓" } else { "Not usable ✗" }
            );
            if !ok {
                bail!("interpreter {} is missing required packages", probe.interpreter());
            }
        }
        ProbeCheck::Device => {
            let found = probe.check_device()?;
            println!(
                "Eye tracker: {}",
                if found { "Found ✓" } else { "Not Found ✗" }
            );
        }
        ProbeCheck::DeviceName => match probe.device_name()? {
            Some(name) => println!("Eye tracker: {name}"),
            None => println!("Eye tracker: Not Found"),
        },
        ProbeCheck::Frequencies => {
            let frequencies = probe.frequencies()?;
            if frequencies.is_empty() {
                println!("No supported frequencies reported.");
            } else {
                println!("Supported frequencies: {}", frequencies.join(", "));
            }
        }
    }
    Ok(())
}

fn cmd_config(init: bool, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(Config::config_path);

    if init && !Config::exists_at(&path) {
        Config::default().save_to(&path)?;
        println!("Created {}", path.display());
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", path.display());
    println!();

    if !Config::exists_at(&path) {
        println!("No configuration file. Run `ide-tracker config --init` to create one.");
        return Ok(());
    }
    let config = Config::load_from(&path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
