// CLI binary — panicking on unrecoverable errors is standard for CLI tools.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::unreachable)]

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use dashboard_dispatch::config::{self, Settings};
use dashboard_dispatch::dispatcher::{DispatchClient, PendingCommand};
use dashboard_dispatch::envelope::{params_from_value, CommandEnvelope};
use dashboard_dispatch::notify::{Notification, NotificationSink, Notifier, Severity};
use dashboard_dispatch::outcome::Outcome;
use dashboard_dispatch::paths;
use dashboard_dispatch::services::audio::SetVolumesParams;
use dashboard_dispatch::services::catalog;
use dashboard_dispatch::services::metronome::BpmParams;
use dashboard_dispatch::services::Services;
use dashboard_dispatch::transport::http::HttpTransport;

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "dashctl", about = "Send commands to a dashboard backend", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (defaults to the OS config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL override
    #[arg(long, global = true)]
    url: Option<String>,

    /// Per-request timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Print the raw outcome as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send any command by name
    Send {
        module: String,
        command: String,
        /// Parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
    },
    /// List known commands
    Commands {
        #[arg(long)]
        module: Option<String>,
    },
    /// Describe a module or `module.command`
    Describe { topic: Option<String> },
    /// Print the effective settings
    Config,
    /// Audio device control
    Audio {
        #[command(subcommand)]
        action: AudioAction,
    },
    /// Metronome control
    Metronome {
        #[command(subcommand)]
        action: MetronomeAction,
    },
    /// Weather lookups
    Weather {
        #[command(subcommand)]
        action: WeatherAction,
    },
}

#[derive(Subcommand)]
enum AudioAction {
    SetVolumes {
        #[arg(long)]
        playback: u8,
        #[arg(long)]
        capture: u8,
    },
    GetVolumes,
}

#[derive(Subcommand)]
enum MetronomeAction {
    Start {
        #[arg(long, default_value_t = 120)]
        bpm: u16,
    },
    Stop,
    SetBpm { bpm: u16 },
}

#[derive(Subcommand)]
enum WeatherAction {
    Current,
    Forecast,
}

// ── Setup ────────────────────────────────────────────────────────

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// File, then environment, then flags.
fn load_settings(cli: &Cli) -> Result<Settings, String> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| paths::settings_path(&paths::default_config_dir()));
    let mut settings =
        config::load_settings(&path).map_err(|e| format!("{}: {e}", path.display()))?;
    settings.apply_env().map_err(|e| e.to_string())?;
    if let Some(url) = &cli.url {
        settings.backend_url.clone_from(url);
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        settings.dispatch.timeout_ms = timeout_ms;
    }
    settings.validate().map_err(|e| e.to_string())?;
    tracing::debug!(url = %settings.command_url(), timeout_ms = settings.dispatch.timeout_ms, "settings loaded");
    Ok(settings)
}

/// Prints notifications to stderr.
struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify(&self, n: Notification) {
        let tag = match n.severity {
            Severity::Success => "ok",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        eprintln!("[{tag}] {}", n.message);
    }
}

// ── Output ───────────────────────────────────────────────────────

fn print_outcome(outcome: &Outcome, raw_json: bool) {
    if raw_json {
        println!("{}", serde_json::to_string_pretty(outcome).unwrap_or_default());
        return;
    }
    match &outcome.value {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) => println!("{s}"),
        Some(data @ (Value::Array(_) | Value::Object(_))) => {
            println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
        }
        Some(data) => println!("{data}"),
    }
}

fn print_json(value: &impl serde::Serialize) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// ── Command building ─────────────────────────────────────────────

fn build_envelope(module: &str, command: &str, params: Option<&str>) -> Result<CommandEnvelope, String> {
    let value: Value = match params {
        Some(raw) => serde_json::from_str(raw).map_err(|e| format!("--params is not valid JSON: {e}"))?,
        None => Value::Null,
    };
    let params = params_from_value(value).map_err(|e| e.to_string())?;
    CommandEnvelope::from_parts(module, command, params).map_err(|e| e.to_string())
}

/// Returns the pending command and the success message to show for it.
fn start_command(
    command: &Commands,
    client: &DispatchClient,
    services: &Services,
) -> Result<(PendingCommand, String), String> {
    Ok(match command {
        Commands::Send {
            module,
            command,
            params,
        } => {
            let envelope = build_envelope(module, command, params.as_deref())?;
            let label = format!("{} succeeded", envelope.qualified_name());
            (client.send(envelope), label)
        }
        Commands::Audio { action } => match action {
            AudioAction::SetVolumes { playback, capture } => (
                services.audio.set_volumes(SetVolumesParams {
                    playback: *playback,
                    capture: *capture,
                }),
                "Volumes saved".into(),
            ),
            AudioAction::GetVolumes => (services.audio.get_volumes(), "Volumes read".into()),
        },
        Commands::Metronome { action } => match action {
            MetronomeAction::Start { bpm } => (
                services.metronome.start(BpmParams { bpm: *bpm }),
                format!("Metronome started at {bpm} bpm"),
            ),
            MetronomeAction::Stop => (services.metronome.stop(), "Metronome stopped".into()),
            MetronomeAction::SetBpm { bpm } => (
                services.metronome.set_bpm(BpmParams { bpm: *bpm }),
                format!("Tempo set to {bpm} bpm"),
            ),
        },
        Commands::Weather { action } => match action {
            WeatherAction::Current => (services.weather.get_weather(), "Weather loaded".into()),
            WeatherAction::Forecast => (services.weather.get_forecast(), "Forecast loaded".into()),
        },
        Commands::Commands { .. } | Commands::Describe { .. } | Commands::Config => {
            unreachable!("handled locally")
        }
    })
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Commands that never touch the backend.
    match &cli.command {
        Commands::Commands { module } => {
            let entries: Vec<_> = catalog::all_entries()
                .into_iter()
                .filter(|e| module.as_deref().is_none_or(|m| e.module == m))
                .collect();
            if cli.json {
                print_json(&entries);
            } else {
                for e in &entries {
                    println!("{:<36} {}", e.qualified_name(), e.description);
                }
            }
            return;
        }
        Commands::Describe { topic } => {
            println!("{}", catalog::help_text(topic.as_deref()));
            return;
        }
        _ => {}
    }

    let settings = match load_settings(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if matches!(cli.command, Commands::Config) {
        print_json(&settings);
        return;
    }

    let transport = HttpTransport::new(settings.command_url());
    tracing::debug!(url = transport.url(), "posting commands");
    let client = DispatchClient::init(settings.dispatch.clone(), transport);
    let services = Services::new(&client);

    let (pending, success_message) = match start_command(&cli.command, &client, &services) {
        Ok(started) => started,
        Err(e) => {
            eprintln!("Error: {e}");
            client.shutdown().await;
            process::exit(1);
        }
    };

    let notifier = Notifier::new(ConsoleSink);
    let outcome = notifier.run(pending, &success_message).await;
    print_outcome(&outcome, cli.json);
    client.shutdown().await;

    if !outcome.ok {
        process::exit(1);
    }
}
