use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use vassist::config::{DEFAULT_CONFIG_PATH, LogLevel};
use vassist::factory::AssistantFactory;
use vassist::logging::{DEFAULT_LOG_DIR, LoggingService};

mod cli;

#[derive(Parser)]
#[command(name = "vassist")]
#[command(about = "Voice assistant - speak the wake word, then a command")]
#[command(version)]
struct Cli {
    /// Path to the config file (.toml, or .json)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory for log files
    #[arg(long, global = true, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Enable verbose logging for this session
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Read commands from stdin (one per line) instead of the microphone
    #[arg(long)]
    typed: bool,

    /// Set and persist the log level (DEBUG, INFO, WARNING, ERROR, CRITICAL)
    #[arg(long)]
    log_level: Option<LogLevel>,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for voice commands until Ctrl+C (default)
    Run(RunArgs),

    /// Validate the configuration file and show a summary
    TestConfig,

    /// Calibrate the microphone for ambient noise
    Calibrate {
        /// Seconds of ambient noise to measure
        #[arg(long, default_value_t = 3.0)]
        duration: f32,
    },

    /// List all available voice commands
    ListCommands,

    /// Dispatch one command as if it had been spoken
    Exec {
        /// Command text, including the wake word
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Scan the local network for smart devices
    Discover {
        /// Seconds to listen for device broadcasts
        #[arg(long, default_value_t = 20)]
        seconds: u64,
    },

    /// Show the end of the newest log file
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,

        /// Delete log files older than this many days first
        #[arg(long)]
        cleanup: Option<u64>,
    },
}

fn init_logging(cli: &Cli, factory: &AssistantFactory) -> Result<LoggingService> {
    // An invalid config must not prevent logging; test-config reports it
    let mut settings = factory.config_manager().settings().unwrap_or_default();
    if cli.verbose {
        settings.log_level = LogLevel::Debug;
    }
    LoggingService::init(&settings, &cli.log_dir).context("Failed to initialize logging")
}

async fn dispatch(cli: Cli) -> Result<()> {
    let factory = AssistantFactory::new(&cli.config);
    let logging = init_logging(&cli, &factory)?;

    match cli.command {
        Some(Commands::Run(args)) => {
            cli::run::run_command(&factory, &logging, args.typed, args.log_level).await
        }
        Some(Commands::TestConfig) => cli::check::test_config_command(&factory),
        Some(Commands::Calibrate { duration }) => {
            cli::calibrate::calibrate_command(&factory, duration).await
        }
        Some(Commands::ListCommands) => cli::list::list_commands_command(&factory),
        Some(Commands::Exec { text }) => cli::exec::exec_command(&factory, &text.join(" ")).await,
        Some(Commands::Discover { seconds }) => {
            cli::discover::discover_command(&factory, seconds).await
        }
        Some(Commands::Logs { lines, cleanup }) => {
            cli::logs::logs_command(logging.files(), lines, cleanup)
        }
        None => {
            let args = RunArgs::default();
            cli::run::run_command(&factory, &logging, args.typed, args.log_level).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
