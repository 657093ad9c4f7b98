//! Skirmish - Development Tools

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "skirmish-tools")]
#[command(about = "Development tools for Skirmish faction data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate data files
    Validate {
        /// Path to data directory
        #[arg(default_value = "assets/data")]
        path: PathBuf,
    },
    /// Print a faction's research tree
    Tree {
        /// Faction RON file
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path } => {
            tracing::info!("Validating data files in: {}", path.display());
            match skirmish_tools::validate::validate_data_directory(&path) {
                Ok(report) => {
                    for faction in &report.factions {
                        println!(
                            "{}: {} units, {} buildings, {} weapons, {} stat research, {} unit tech",
                            faction.id,
                            faction.units,
                            faction.buildings,
                            faction.weapons,
                            faction.stat_research,
                            faction.unit_tech
                        );
                    }
                    tracing::info!("Validation passed");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    tracing::error!("Validation failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Tree { file } => match skirmish_tools::loader::load_faction(&file) {
            Ok(faction) => {
                print!("{}", skirmish_tools::tree::render_tree(&faction));
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!("Failed to load {}: {e}", file.display());
                ExitCode::FAILURE
            }
        },
    }
}
