// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Cumulus CLI
//!
//! Command-line interface for deploying and calling Cumulus functions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

/// Cumulus - Idempotent function deployment
#[derive(Parser)]
#[command(name = "cumulus")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path [default: cumulus.yaml, if present]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Package, upload, and create or update a function
    Deploy {
        /// Function name
        name: String,

        /// Source file or directory to package
        source: PathBuf,
    },

    /// Invoke a deployed function
    Invoke {
        /// Function name
        name: String,

        /// JSON event passed to the function
        #[arg(short, long)]
        payload: Option<String>,
    },

    /// Delete a deployed function
    Delete {
        /// Function name
        name: String,
    },

    /// Build a deployment package locally without uploading it
    Package {
        /// Source file or directory to package
        source: PathBuf,

        /// Write the archive to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration and environment
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let config = cli.config.as_deref();

    // Dispatch to command handlers
    let result = match cli.command {
        Commands::Deploy { name, source } => commands::deploy::execute(config, &name, &source).await,
        Commands::Invoke { name, payload } => {
            commands::invoke::execute(config, &name, payload.as_deref()).await
        }
        Commands::Delete { name } => commands::delete::execute(config, &name).await,
        Commands::Package { source, output } => {
            commands::package::execute(&source, output.as_deref()).await
        }
        Commands::Validate => commands::validate::execute(config).await,
    };

    if let Err(e) = result {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
}
