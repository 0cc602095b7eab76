use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scriptflow::pipeline::Command;

#[derive(Parser)]
#[command(name = "scriptflow")]
#[command(
    version,
    about = "Turn a script into analyzed episodes, shot lists and video prompts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

/// Options shared by the pipeline commands
#[derive(Args)]
struct StepArgs {
    #[arg(long, short, help = "Confirm every review point without stopping")]
    yes: bool,
    #[arg(
        short = 'f',
        long,
        default_value = "text",
        help = "Output format: text, json"
    )]
    format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project from a script in the current directory
    Init {
        #[arg(long, short, help = "Script file to split into episodes")]
        script: PathBuf,
        #[arg(long, short, help = "Project name (default: script file name)")]
        name: Option<String>,
        #[arg(long, help = "Overwrite an existing project")]
        force: bool,
    },

    /// Start the pipeline or continue the current step
    Run(StepArgs),

    /// Accept the current review point and continue
    Confirm(StepArgs),

    /// Retry the failed unit of work
    Retry(StepArgs),

    /// Drop the failed analysis item and continue with the rest
    Skip(StepArgs),

    /// Go straight from analysis to prompt generation (every episode needs shots)
    Shortcut(StepArgs),

    /// Import shot lists from a JSON or YAML file
    ImportShots {
        #[arg(help = "File keyed by episode id")]
        file: PathBuf,
    },

    /// Show project status
    Status {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
        #[arg(short = 'd', long, help = "Show per-scope usage and recent changes")]
        detailed: bool,
    },

    /// Export the project with shot lists and prompts
    Export {
        #[arg(
            short = 'f',
            long,
            default_value = "json",
            help = "Output format: json, yaml"
        )]
        format: String,
        #[arg(long, short, help = "Write to a file instead of stdout")]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mScriptFlow encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }

        eprintln!("\n\x1b[33mProject state is saved after every step; 'scriptflow status' shows where it stopped.\x1b[0m");
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let step = |command: Command, args: StepArgs| -> anyhow::Result<()> {
        let rt = Runtime::new()?;
        rt.block_on(scriptflow::cli::commands::pipeline::run(
            command,
            args.yes,
            &args.format,
        ))?;
        Ok(())
    };

    match cli.command {
        Commands::Init {
            script,
            name,
            force,
        } => {
            scriptflow::cli::commands::init::run(&script, name, force)?;
        }
        Commands::Run(args) => step(Command::Run, args)?,
        Commands::Confirm(args) => step(Command::Confirm, args)?,
        Commands::Retry(args) => step(Command::Retry, args)?,
        Commands::Skip(args) => step(Command::Skip, args)?,
        Commands::Shortcut(args) => step(Command::Shortcut, args)?,
        Commands::ImportShots { file } => {
            scriptflow::cli::commands::import::run(&file)?;
        }
        Commands::Status { format, detailed } => {
            scriptflow::cli::commands::status::run(&format, detailed)?;
        }
        Commands::Export { format, output } => {
            scriptflow::cli::commands::export::run(&format, output.as_deref())?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => {
                scriptflow::cli::commands::config::show(global, &format)?;
            }
            ConfigAction::Path => {
                scriptflow::cli::commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                if global {
                    scriptflow::cli::commands::config::init_global(force)?;
                } else {
                    scriptflow::cli::commands::config::init_project()?;
                }
            }
        },
    }

    Ok(())
}
