//! Configuration file handling for the CLI

use acore::Config;
use gemini::{Client, ENDPOINT, Gemini};
use anyhow::{Context, Result, bail};
use client::ServiceClient;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// `~/.aistudio/config.toml`
pub fn default_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine the home directory")?;
    Ok(home.join(".aistudio").join("config.toml"))
}

/// Load the configuration, falling back to defaults when the file is missing.
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("no configuration at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let config = Config::load(path)?;
    tracing::debug!("loaded configuration from {}", path.display());
    Ok(config)
}

/// Write the default configuration.
pub fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, Config::default().to_toml()?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

/// Build a service client over the Gemini API.
pub fn connect(config: &Config) -> Result<ServiceClient<Gemini>> {
    let key = config
        .api_key()
        .context("no API key: set provider.api_key or GEMINI_API_KEY")?;
    let http = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("failed to build the HTTP client")?;
    let base_url = config.provider.base_url.as_deref().unwrap_or(ENDPOINT);
    let provider =
        Gemini::custom(http, &key, base_url)?.with_safety(config.provider.safety.clone());
    Ok(ServiceClient::new(provider, config))
}
