//! Command-line arguments of the `credit-risk` binary. Flags left unset fall
//! back to the configuration file.

use crate::config::DEFAULT_CONFIG_FILE;
use crate::storage::Stage;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "credit-risk")]
#[command(about = "Credit risk data processing, training and prediction API", long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "CREDIT_RISK_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the labeled customer dataset from raw transactions
    Process {
        #[arg(long)]
        raw_data_path: Option<PathBuf>,

        #[arg(long)]
        processed_data_dir: Option<PathBuf>,
    },

    /// Train, evaluate and register a model, promoting it to Production
    Train {
        #[arg(long)]
        processed_data_path: Option<PathBuf>,

        #[arg(long)]
        model_name: Option<String>,
    },

    /// Serve the prediction API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect or change registered model versions
    Models {
        #[command(subcommand)]
        command: ModelsCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ModelsCommand {
    /// List all versions of a model
    List {
        #[arg(long)]
        model_name: Option<String>,
    },

    /// Move a version to a stage, archiving the version currently there
    Promote {
        #[arg(short, long)]
        version: u32,

        #[arg(short, long, default_value = "Production")]
        stage: Stage,

        #[arg(long)]
        model_name: Option<String>,
    },
}
