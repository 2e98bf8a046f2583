use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use command_parser::CommandParser;
use robot_runtime::{build_hardware, load_config, HardwareBackend, Robot, RobotConfig, RobotHandle};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

mod protocol;
use protocol::{parse_request, respond};

#[derive(Parser, Debug)]
#[command(
    name = "rover-daemon",
    version,
    about = "Voice-commanded rover: turns transcribed speech into wheel motions",
    disable_help_subcommand = true
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, action = ArgAction::SetTrue, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a transcript and print the resulting commands as JSON
    Parse {
        /// Transcribed speech, e.g. "kør to meter frem"
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Read transcripts from stdin, one per line, and drive the rover
    Run {
        /// YAML configuration file; built-in defaults when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Backend::Mock)]
        backend: Backend,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Backend {
    Mock,
    Gpio,
}

impl From<Backend> for HardwareBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Mock => HardwareBackend::Mock,
            Backend::Gpio => HardwareBackend::Gpio,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    match cli.command {
        Commands::Parse { text } => parse_text(&text.join(" ")),
        Commands::Run { config, backend } => run(config, backend).await,
    }
}

fn parse_text(text: &str) -> Result<()> {
    command_parser::init();
    let commands = command_parser::parse_command(text);
    println!("{}", serde_json::to_string_pretty(&commands)?);
    Ok(())
}

async fn run(config_path: Option<PathBuf>, backend: Backend) -> Result<()> {
    robot_runtime::init();

    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => RobotConfig::default(),
    };
    info!("rover-daemon starting with {:?} backend", backend);
    debug!("Configuration: {:?}", config);

    let hardware = build_hardware(backend.into(), &config)
        .with_context(|| format!("opening {backend:?} hardware"))?;
    let robot = Robot::new(&config, hardware)?;
    let handle = robot.handle();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let dispatcher = tokio::spawn(async move {
        robot
            .run_until(async {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    tokio::select! {
        result = serve_stdin(&handle) => {
            result?;
            info!("Input closed, waiting for queued commands");
            tokio::select! {
                _ = drain(&handle) => {}
                _ = tokio::signal::ctrl_c() => warn!("Interrupted while draining"),
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    let _ = shutdown_tx.send(());
    dispatcher.await.context("dispatch loop panicked")?;
    info!("rover-daemon stopped");
    Ok(())
}

async fn serve_stdin(handle: &RobotHandle) -> Result<()> {
    let parser = CommandParser::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        debug!("Input: {}", line);
        let reply = respond(parse_request(&line), &parser, handle);
        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}

/// Resolves once nothing is executing and nothing runnable is queued.
async fn drain(handle: &RobotHandle) {
    loop {
        let status = handle.status();
        if status.current.is_none() && (status.queued == 0 || !status.running) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

fn setup_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    // stdout carries protocol replies
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
