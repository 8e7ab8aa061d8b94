mod cli;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use skillpack_core::ManagerConfig;
use tracing_subscriber::EnvFilter;

/// Skillpack: install and manage skill plugins
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Base directory holding plugins/, registry.json, cache/ and logs/
    #[arg(long, global = true, env = "SKILLPACK_HOME", value_name = "BASE")]
    plugin_dir: Option<PathBuf>,

    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install a plugin from a local directory
    Install {
        /// Directory containing plugin.json
        source: PathBuf,
        /// Reinstall even if a plugin with the same name is installed
        #[arg(long)]
        force: bool,
        /// Leave the plugin inactive after installing
        #[arg(long)]
        no_activate: bool,
        /// Do not resolve dependencies against installed plugins
        #[arg(long)]
        skip_deps: bool,
        /// Fail unless the source provides exactly this version
        #[arg(long, value_name = "VERSION")]
        require_version: Option<String>,
    },
    /// Remove an installed plugin
    Uninstall {
        name: String,
        /// Remove even if the onUninstall hook fails
        #[arg(long)]
        force: bool,
        /// Ask the onUninstall hook to preserve user data
        #[arg(long)]
        keep_data: bool,
    },
    /// List installed plugins
    List {
        #[arg(long, conflicts_with = "inactive")]
        active: bool,
        #[arg(long)]
        inactive: bool,
        #[arg(long, value_name = "CATEGORY")]
        category: Option<String>,
        /// Match against name, description and keywords
        #[arg(long, value_name = "KEYWORD")]
        keyword: Option<String>,
    },
    /// Show details of an installed plugin
    Info { name: String },
    /// Activate an installed plugin
    Activate { name: String },
    /// Deactivate an installed plugin
    Deactivate { name: String },
    /// Check a plugin directory without installing it
    Validate { path: PathBuf },
}

fn init_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // skillpack-core logs through the `log` facade
    tracing_log::LogTracer::init()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let base_dir = match args.plugin_dir {
        Some(dir) => dir,
        None => match ManagerConfig::default_base_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("Error [{}]: {}", e.code(), e);
                return ExitCode::FAILURE;
            }
        },
    };
    tracing::debug!(base_dir = %base_dir.display(), "using plugin base directory");

    match cli::execute(args.command, &base_dir).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            ExitCode::FAILURE
        }
    }
}
