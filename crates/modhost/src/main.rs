mod cli;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{debug, error};
use modhost_core::storage::{HostConfig, LocalStorageProvider};
use modhost_core::{Application, PluginFactories};

use crate::cli::{BlockCommand, PluginCommand};

/// modhost: plugin host runtime for courses and pages
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Print "pong" and exit
    #[arg(long)]
    ping: bool,

    /// Plugin root (overrides the configuration file)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Data directory holding records.json (overrides the configuration file)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Configuration file (.toml, .json or .yaml); defaults to ./modhost.*
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output; repeat for more
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover, enable and install plugins
    Plugin {
        #[command(subcommand)]
        command: PluginCommand,
    },
    /// Place blocks on pages
    Block {
        #[command(subcommand)]
        command: BlockCommand,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

/// Statically linked plugins.
fn factories() -> PluginFactories {
    let mut factories = PluginFactories::new();
    block_html::register(&mut factories);
    block_navigation::register(&mut factories);
    mod_assign::register(&mut factories);
    factories
}

fn host_config(args: &CliArgs) -> modhost_core::Result<HostConfig> {
    let mut config = match &args.config {
        Some(path) => HostConfig::from_file(&LocalStorageProvider::new(PathBuf::new()), path)?,
        None => HostConfig::discover(&LocalStorageProvider::new(PathBuf::from(".")))?,
    };
    if let Some(root) = &args.root {
        config.plugin_root = root.clone();
    }
    if let Some(data) = &args.data {
        config.data_dir = data.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    let Some(command) = args.command.as_ref() else {
        println!("Nothing to do. Run with --help to see the available commands.");
        return ExitCode::SUCCESS;
    };

    let config = match host_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to read configuration: {}", e);
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    debug!("Host configuration: {:?}", config);

    let app = match Application::new(config, factories()) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to initialize application: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match command {
        Commands::Plugin { command } => cli::run_plugin_command(&app, command).await,
        Commands::Block { command } => cli::run_block_command(&app, command).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
