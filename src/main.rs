//! Lucia Launcher - supervises a long-running bot process and streams its log output.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lucia_launcher::config::{ConfigLoader, LauncherConfig};
use lucia_launcher::display::{ConsoleSink, JsonSink};
use lucia_launcher::launcher::Launcher;
use lucia_launcher::supervisor::{EventSink, LifecycleState};

#[derive(Parser)]
#[command(
    name = "lucia-launcher",
    about = "Launch and supervise the Lucia bot",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot and stream its output until it stops.
    Run {
        /// Entry script, overriding the configured one.
        #[arg(long)]
        script: Option<PathBuf>,
        /// Interpreter to use instead of probing the candidate list.
        #[arg(long)]
        interpreter: Option<String>,
        /// Print events as JSON lines.
        #[arg(long)]
        json: bool,
        /// Extra arguments passed to the bot.
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Print the interpreter that would be used.
    Probe,
    /// Print the effective configuration.
    Config,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Option<LauncherConfig> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    match loader.load() {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Error: {e}");
            None
        }
    }
}

async fn run(launcher: Launcher) -> ExitCode {
    if let Err(e) = launcher.launch().await {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let supervisor = launcher.supervisor().clone();
    let final_state = tokio::select! {
        state = supervisor.wait_until_stopped() => state,
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping bot");
            if let Err(e) = launcher.exit().await {
                tracing::warn!(error = %e, "Stop on exit failed");
            }
            supervisor.wait_until_stopped().await
        }
    };

    if let Some(info) = supervisor.process_info() {
        tracing::info!(pid = ?info.pid, exit_code = ?info.exit_code, "Bot process finished");
    }

    match final_state {
        LifecycleState::Failed(_) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(mut config) = load_config(cli.config) else {
        return ExitCode::FAILURE;
    };

    match cli.command {
        Commands::Run {
            script,
            interpreter,
            json,
            args,
        } => {
            if let Some(script) = script {
                config.bot.script = script;
            }
            if let Some(interpreter) = interpreter {
                config.interpreter.candidates = vec![interpreter];
            }
            if !args.is_empty() {
                config.bot.args = args;
            }

            let sink: Arc<dyn EventSink> = if json {
                Arc::new(JsonSink)
            } else {
                Arc::new(ConsoleSink)
            };

            tracing::info!(
                script = %config.bot.script.display(),
                candidates = ?config.interpreter.candidates,
                "Starting Lucia launcher"
            );
            run(Launcher::new(config, sink)).await
        }
        Commands::Probe => {
            let launcher = Launcher::new(config, Arc::new(ConsoleSink));
            match launcher.locate().await {
                Ok(interpreter) => {
                    println!("{interpreter}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Config => match toml::to_string_pretty(&config) {
            Ok(text) => {
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        },
    }
}
