use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use url::Url;

use crate::error::Error;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub config: ConfigOptions,
    pub sites: SiteList,
}

#[derive(Debug, Deserialize)]
pub struct ConfigOptions {
    pub timeout_secs: u64,
    pub retries: u32,
    pub discord_id: Option<u64>,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SiteList {
    pub urls: Vec<String>,
}

impl Config {
    /// Loads the config from the default location.
    pub fn load() -> Result<Config, Error> {
        Self::load_from(default_config_path())
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let content = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        // if webhook_url is not set use env with dotenvy
        if config.config.webhook_url.is_none() {
            config.config.webhook_url = env_var("WEBHOOK_URL")?;
        }

        // if discord_id is not set use env with dotenvy
        if config.config.discord_id.is_none() {
            config.config.discord_id = match env_var("DISCORD_ID")? {
                Some(raw) => Some(raw.parse().map_err(|_| {
                    Error::Config(format!("DISCORD_ID is not a numeric user id: {raw}"))
                })?),
                None => None,
            };
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.config.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be at least 1".to_string()));
        }
        if self.sites.urls.is_empty() {
            return Err(Error::Config(
                "no URLs configured under [sites]".to_string(),
            ));
        }
        for url in &self.sites.urls {
            Url::parse(url)?;
        }
        Ok(())
    }
}

/// Looks up an environment variable, treating "not present" as `None`.
fn env_var(name: &str) -> Result<Option<String>, Error> {
    match dotenvy::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(dotenvy::Error::EnvVar(std::env::VarError::NotPresent)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("upwatch").join("config.toml"))
        .filter(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}
