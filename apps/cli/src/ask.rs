//! Ask command

use crate::{attach::attachment, config::connect, output};
use acore::{Config, Request};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Ask command arguments
#[derive(Debug, Args)]
pub struct AskCmd {
    /// Model to use (defaults to the first priority model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Files to attach
    #[arg(short, long = "attach")]
    pub attachments: Vec<PathBuf>,

    /// Print the response as it arrives
    #[arg(short, long)]
    pub stream: bool,

    /// Print token usage when done
    #[arg(long)]
    pub usage: bool,

    /// The prompt (read from stdin when omitted)
    pub prompt: Option<String>,
}

impl AskCmd {
    /// Run the ask command
    pub async fn run(&self, config: &Config) -> Result<()> {
        let client = connect(config)?;
        let model = default_model(self.model.as_deref(), config)?;
        let text = match &self.prompt {
            Some(prompt) => prompt.clone(),
            None => std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?,
        };

        let mut request = Request::new(model, text);
        for path in &self.attachments {
            request = request.attach(attachment(path, &config.workspace)?);
        }
        if !request.prompt.attachments.is_empty() {
            // Lets the client reject text-only models before sending.
            if let Err(err) = client.list_models().await {
                tracing::warn!("could not list models: {err}");
            }
        }

        if self.stream {
            output::print_stream(&client, client.send_stream(request)).await?;
        } else {
            output::print_reply(&client, client.send(request)).await?;
        }
        if self.usage {
            output::print_usage(&client.usage());
        }
        Ok(())
    }
}

/// The requested model, or the first configured priority model.
pub(crate) fn default_model(model: Option<&str>, config: &Config) -> Result<String> {
    match model {
        Some(model) => Ok(model.to_owned()),
        None => config
            .registry
            .priority
            .first()
            .cloned()
            .context("no model given and no priority models configured"),
    }
}
