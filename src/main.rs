//! Workout Timer CLI - a countdown timer for workout intervals
//!
//! Run `workout-timer daemon` once, then control the countdown from any
//! terminal with `set`, `start`, `pause`, `reset`, `toggle` and `status`.
//! `workout-timer run <DURATION>` counts down in the foreground instead.

use anyhow::Result;
use clap::{CommandFactory, Parser};

use workout_timer::cli::{run_foreground, Cli, Commands, Display, IpcClient, RunOutcome};
use workout_timer::daemon::{default_socket_path, run_daemon, DaemonOptions};
use workout_timer::types::TimerConfig;

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects `debug`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        tracing::debug!("Verbose mode enabled");
    }

    let Some(command) = cli.command else {
        // No command provided, show help
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Set(arg) => {
            let client = IpcClient::from_option(cli.socket)?;
            let response = client.set(arg.duration).await?;
            Display::show_command_result(&response);
        }
        Commands::Start => {
            let client = IpcClient::from_option(cli.socket)?;
            let response = client.start().await?;
            Display::show_command_result(&response);
        }
        Commands::Pause => {
            let client = IpcClient::from_option(cli.socket)?;
            let response = client.pause().await?;
            Display::show_command_result(&response);
        }
        Commands::Reset => {
            let client = IpcClient::from_option(cli.socket)?;
            let response = client.reset().await?;
            Display::show_command_result(&response);
        }
        Commands::Toggle => {
            let client = IpcClient::from_option(cli.socket)?;
            let response = client.toggle().await?;
            Display::show_command_result(&response);
        }
        Commands::Status => {
            let client = IpcClient::from_option(cli.socket)?;
            let response = client.status().await?;
            Display::show_status(&response);
        }
        Commands::Daemon(args) => {
            let config = TimerConfig::load_or_default(args.config.as_deref())?;
            let socket_path = match cli.socket {
                Some(path) => path,
                None => default_socket_path()?,
            };
            let options = DaemonOptions::new(socket_path)
                .with_config(config)
                .with_sound(!args.no_sound);
            run_daemon(options).await?;
        }
        Commands::Run(args) => {
            let config = TimerConfig::load_or_default(None)?;
            match run_foreground(args.duration, config, !args.no_sound).await? {
                RunOutcome::Completed(_) => {}
                RunOutcome::Interrupted(state) => {
                    println!("Stopped with {} remaining", Display::format_clock(&state));
                }
            }
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
        }
    }

    Ok(())
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
