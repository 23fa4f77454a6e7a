//! Command-line front end for treeflow projects.
//!
//! ```bash
//! treeflow demo ./scratch
//! treeflow run ./scratch/project.json
//! treeflow pack ./scratch/project.json ./scratch/project.bin
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use treeflow::{ProjectService, create_plugin_manager};

mod config;
mod runner;

#[derive(Parser)]
#[command(name = "treeflow")]
#[command(about = "Evaluate and edit dataflow graphs over value trees", long_about = None)]
struct Cli {
    /// Config file to use instead of the per-user one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a project and write its targets
    Run {
        /// Bundle file (.json, or .bin for the transfer format)
        project: PathBuf,

        /// Save targets even when the config says not to
        #[arg(long)]
        save: bool,
    },

    /// Evaluate a project and print every node without saving
    Inspect { project: PathBuf },

    /// Convert a bundle between JSON and the binary transfer format
    Pack { input: PathBuf, output: PathBuf },

    /// Create an example project in a directory
    Demo {
        dir: PathBuf,

        /// Integer written to the example source file
        #[arg(long, default_value = "3")]
        start: i64,
    },

    /// List registered formats and processors
    Plugins,

    /// Write the current settings to the per-user config file
    InitConfig,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_ref());
    let plugins = create_plugin_manager();
    let mut service = ProjectService::with_history_limit(plugins.clone(), config.history_limit);

    match cli.command {
        Commands::Run { project, save } => {
            runner::open(&mut service, &project)?;
            runner::run(&mut service, &config, save)
        }
        Commands::Inspect { project } => {
            runner::open(&mut service, &project)?;
            service.process();
            runner::inspect(&service)
        }
        Commands::Pack { input, output } => {
            runner::open(&mut service, &input)?;
            runner::pack(&service, &output, config.pretty_json)
        }
        Commands::Demo { dir, start } => runner::demo(&mut service, &dir, start),
        Commands::Plugins => {
            runner::list_plugins(&plugins);
            Ok(())
        }
        Commands::InitConfig => {
            config::save_config(&config);
            Ok(())
        }
    }
}
