//! AI Studio CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};
pub use {
    ask::AskCmd,
    attach::{attachment, mime_type},
    automate::AutomateCmd,
    config::{connect, default_path, load},
    models::ModelsCmd,
};

mod ask;
mod attach;
mod automate;
mod config;
mod models;
mod output;

/// AI Studio CLI
#[derive(Debug, Parser)]
#[command(name = "aistudio", version, about)]
pub struct App {
    /// Configuration file (defaults to ~/.aistudio/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (use -v, -vv, -vvv, etc.)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the models available to the API key
    Models(ModelsCmd),

    /// Ask a model a question
    Ask(AskCmd),

    /// Run a built-in automation over a file
    Automate(AutomateCmd),

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl App {
    /// Initialize tracing subscriber based on verbosity
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let directive = match self.verbose {
                0 => "warn",
                1 => "aistudio_cli=debug,aistudio_client=debug",
                2 => "aistudio_cli=trace,aistudio_client=trace,aistudio_gemini=trace",
                3 => "debug",
                _ => "trace",
            };
            EnvFilter::new(directive)
        });

        fmt()
            .without_time()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .with_target(self.verbose != 0)
            .init();
    }

    /// Run the selected command
    pub async fn run(self) -> Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => default_path()?,
        };
        match self.command {
            Command::Init { force } => config::init(&path, force),
            Command::Models(cmd) => cmd.run(&load(&path)?).await,
            Command::Ask(cmd) => cmd.run(&load(&path)?).await,
            Command::Automate(cmd) => cmd.run(&load(&path)?).await,
        }
    }
}
