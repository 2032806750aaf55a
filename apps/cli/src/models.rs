//! Models command

use crate::{config::connect, output::report};
use acore::Config;
use anyhow::Result;
use clap::Args;

/// Models command arguments
#[derive(Debug, Args)]
pub struct ModelsCmd {
    /// Bypass the cache and refetch the listing
    #[arg(long)]
    pub refresh: bool,
}

impl ModelsCmd {
    /// Run the models command
    pub async fn run(&self, config: &Config) -> Result<()> {
        let client = connect(config)?;
        let models = if self.refresh {
            client.refresh_models().await
        } else {
            client.list_models().await
        }
        .map_err(report)?;

        for model in models.iter() {
            let mut features = Vec::new();
            if model.supports_streaming {
                features.push("stream");
            }
            if model.supports_multimodal {
                features.push("multimodal");
            }
            println!(
                "{:<40} {:>9}  {:<18} {}",
                model.short_id(),
                model.token_limit,
                features.join(","),
                model.display_name
            );
        }
        Ok(())
    }
}
