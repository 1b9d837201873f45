//! haptic-coordinator - two-channel haptic waveform engine
//!
//! Command-line driver. Opens a session on the simulated device and either
//! prints its capabilities, runs one request, or serves newline-delimited
//! JSON requests from stdin.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use haptic_coordinator::{
    config::{default_config_path, resolve_log_dir, types::LoggingConfig, Config},
    device::{Rejection, SimulatedDevice},
    runtime::format_user_error,
    HapticSession, ToolRequest, ToolResponse,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Attribute set reported by the simulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SimulatedProfile {
    /// Two vibration motors behind the combined command
    Legacy,
    /// One vibration motor plus a constriction actuator
    IndexedDual,
    /// No attribute data at all
    Unknown,
}

/// Command-line arguments for haptic-coordinator
#[derive(Parser, Debug)]
#[command(name = "haptic-coordinator")]
#[command(version, about = "Two-channel haptic coordination engine", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, env = "HAPTIC_COORDINATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,

    /// Write logs to file (in addition to stderr)
    #[arg(long)]
    pub log_file: Option<String>,

    /// Attribute set the simulated device reports
    #[arg(long, value_enum, default_value = "indexed-dual")]
    pub simulate: SimulatedProfile,

    /// Make the simulated device reject the command behind an encoding
    ///
    /// Accepts Constrict-Index1, Linear-Position, Inflate-Index1,
    /// Inflate-Index0 or OriginalVibrate. May be given more than once.
    #[arg(long, value_name = "LABEL")]
    pub reject_encoding: Vec<String>,

    /// Show the detected capability profile and exit
    #[arg(long)]
    pub show_capabilities: bool,

    /// Output format for --show-capabilities (text|json)
    #[arg(long, default_value = "text")]
    pub format: String,

    /// Execute one JSON request from FILE, or from stdin with `-`
    ///
    /// Without this flag, requests are read from stdin one per line and a
    /// JSON response is written per request.
    #[arg(long, value_name = "FILE")]
    pub request: Option<String>,

    /// Cancel an invocation that runs longer than this
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_user_error(&e));
            return Err(e);
        }
    };

    init_logging(&args, &config.logging)?;

    info!("════════════════════════════════════════════════════════");
    info!("  haptic-coordinator v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "  Built: {}",
        option_env!("BUILD_DATE").unwrap_or("unknown")
    );
    info!("  Commit: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    info!("════════════════════════════════════════════════════════");

    let device = match build_device(&args) {
        Ok(device) => Arc::new(device),
        Err(e) => {
            eprintln!("{}", format_user_error(&e));
            return Err(e);
        }
    };
    info!("Simulated device: {}", device.name());

    let mut session = HapticSession::open(device, config).await;

    if args.show_capabilities {
        return show_capabilities(&session, &args.format);
    }

    // Ctrl-C abandons the running invocation; the session stops the actuators
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C received - cancelling current invocation");
            signal_token.cancel();
        }
    });

    let timeout = args.timeout_ms.map(Duration::from_millis);

    match args.request.as_deref() {
        Some(source) => {
            let request = match read_request(source).await {
                Ok(request) => request,
                Err(e) => {
                    error!("Invalid request: {e:#}");
                    eprintln!("{}", format_user_error(&e));
                    return Err(e);
                }
            };
            let response = run_invocation(&mut session, request, &shutdown, timeout).await;
            println!("{}", response.to_json_pretty());
            if !response.success {
                std::process::exit(2);
            }
        }
        None => serve_stdin(&mut session, &shutdown, timeout).await?,
    }

    info!("Session closed");
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    if let Some(path) = &args.config {
        return Config::load(path);
    }

    // Silently fall back to defaults if no config file exists yet
    let path = default_config_path();
    if path.exists() {
        Config::load(&path)
    } else {
        Ok(Config::default_config())
    }
}

fn build_device(args: &Args) -> Result<SimulatedDevice> {
    let device = match args.simulate {
        SimulatedProfile::Legacy => SimulatedDevice::legacy(),
        SimulatedProfile::IndexedDual => SimulatedDevice::indexed_dual(),
        SimulatedProfile::Unknown => SimulatedDevice::without_attributes(),
    };

    for label in &args.reject_encoding {
        let rejection = Rejection::for_encoding(label)
            .with_context(|| format!("Unknown encoding label: {label}"))?;
        info!("Simulated device will reject {label}");
        device.reject(rejection);
    }
    Ok(device)
}

fn show_capabilities(session: &HapticSession, format: &str) -> Result<()> {
    let report = session.report();
    if format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize capability report")?
        );
    } else {
        print!("{}", report.to_text());
    }
    Ok(())
}

async fn read_request(source: &str) -> Result<ToolRequest> {
    let input = if source == "-" {
        let mut input = String::new();
        tokio::io::stdin()
            .read_to_string(&mut input)
            .await
            .context("Failed to read request from stdin")?;
        input
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read request file: {source}"))?
    };

    ToolRequest::from_json(&input).context("Failed to parse request")
}

async fn serve_stdin(
    session: &mut HapticSession,
    shutdown: &CancellationToken,
    timeout: Option<Duration>,
) -> Result<()> {
    info!("Reading requests from stdin, one JSON object per line");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line.context("Failed to read from stdin")?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let response = match ToolRequest::from_json(&line) {
            Ok(request) => run_invocation(session, request, shutdown, timeout).await,
            Err(e) => {
                warn!("Rejected malformed request: {e}");
                ToolResponse {
                    tool: "unknown".to_string(),
                    success: false,
                    summary: format!("Malformed request: {e}"),
                    encoding: None,
                    notices: Vec::new(),
                    attempts: Vec::new(),
                }
            }
        };

        let mut out = serde_json::to_string(&response).context("Failed to serialize response")?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}

async fn run_invocation(
    session: &mut HapticSession,
    request: ToolRequest,
    shutdown: &CancellationToken,
    timeout: Option<Duration>,
) -> ToolResponse {
    let cancel = shutdown.child_token();

    let watchdog = timeout.map(|limit| {
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            warn!("Invocation exceeded {}ms, cancelling", limit.as_millis());
            token.cancel();
        })
    });

    let response = session.execute(request, cancel).await;

    if let Some(handle) = watchdog {
        handle.abort();
    }
    response
}

fn init_logging(args: &Args, logging_config: &LoggingConfig) -> Result<()> {
    use std::fs::{self, File};

    // CLI -v flag overrides config
    let log_level = if args.verbose > 0 {
        match args.verbose {
            1 => "debug",
            _ => "trace",
        }
    } else {
        match logging_config.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => logging_config.level.as_str(),
            _ => "info",
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "haptic_coordinator={log_level},warn"
        ))
    });

    // CLI --log-file overrides config.log_dir
    let log_file_path: Option<String> = if let Some(cli_path) = &args.log_file {
        Some(cli_path.clone())
    } else if logging_config.log_dir.is_some() {
        let log_dir = resolve_log_dir(&logging_config.log_dir);
        if let Err(e) = fs::create_dir_all(&log_dir) {
            eprintln!(
                "Warning: Cannot create log directory {}: {e}",
                log_dir.display()
            );
            None
        } else {
            let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
            Some(
                log_dir
                    .join(format!("haptic-coordinator-{timestamp}.log"))
                    .display()
                    .to_string(),
            )
        }
    } else {
        None
    };

    // Fall back to console-only logging if the file cannot be created
    let log_file = log_file_path
        .as_ref()
        .and_then(|path| match File::create(path) {
            Ok(f) => Some((f, path.clone())),
            Err(e) => {
                eprintln!("Warning: Cannot create log file {path:?}: {e}, logging to console only");
                None
            }
        });

    // stdout carries responses, so console logs go to stderr
    if let Some((file, ref log_file_path)) = log_file {
        match args.log_format.as_str() {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
        }
        info!("Logging to file: {}", log_file_path);
    } else {
        match args.log_format.as_str() {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                    .init();
            }
        }
    }

    Ok(())
}
