//! Automate command

use crate::{ask::default_model, config::connect, output};
use acore::Config;
use anyhow::{Context, Result, bail};
use clap::Args;
use client::{Automation, AutomationKind};
use std::path::PathBuf;

/// Automate command arguments
#[derive(Debug, Args)]
pub struct AutomateCmd {
    /// Automation to run (lists them when omitted)
    pub kind: Option<AutomationKind>,

    /// Source file to run it over
    pub file: Option<PathBuf>,

    /// Model to use (defaults to the first priority model)
    #[arg(short, long)]
    pub model: Option<String>,
}

impl AutomateCmd {
    /// Run the automate command
    pub async fn run(&self, config: &Config) -> Result<()> {
        let Some(kind) = self.kind else {
            for automation in Automation::all() {
                println!("{:<16} {}", automation.id, automation.description);
            }
            return Ok(());
        };
        let Some(file) = &self.file else {
            bail!("{kind} needs a file to run over");
        };
        let allowed = file
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                config
                    .workspace
                    .allowed_extensions
                    .iter()
                    .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
            });
        if !allowed {
            bail!("{} is not a supported source file", file.display());
        }

        let input = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let client = connect(config)?;
        let model = default_model(self.model.as_deref(), config)?;
        tracing::info!("running {} on {}", kind.automation().name, file.display());
        output::print_stream(&client, client.run_automation(kind, &input, model)).await
    }
}
