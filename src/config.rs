use std::{str::FromStr, time::Duration};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub directory_url: Option<String>,
    pub directory_timeout: Duration,
    pub compatible_client_versions: Vec<String>,
    pub receipt_write_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: "sqlite://chat.db?mode=rwc".to_owned(),
            database_max_connections: 16,
            directory_url: None,
            directory_timeout: Duration::from_secs(5),
            compatible_client_versions: vec!["1.6.0".to_owned()],
            receipt_write_attempts: 3,
        }
    }
}

impl Config {
    /// Reads `.env` (if any) and the process environment.
    pub fn from_env() -> anyhow::Result<Config> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let defaults = Config::default();

        let compatible_client_versions = match var("COMPATIBLE_CLIENT_VERSIONS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
                .collect(),
            None => defaults.compatible_client_versions,
        };
        if compatible_client_versions.is_empty() {
            anyhow::bail!("COMPATIBLE_CLIENT_VERSIONS lists no version");
        }

        Ok(Config {
            port: parse(&var, "PORT")?.unwrap_or(defaults.port),
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections: parse(&var, "DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.database_max_connections),
            directory_url: var("DIRECTORY_URL").filter(|url| !url.is_empty()),
            directory_timeout: parse(&var, "DIRECTORY_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.directory_timeout),
            compatible_client_versions,
            receipt_write_attempts: parse::<u32>(&var, "RECEIPT_WRITE_ATTEMPTS")?
                .unwrap_or(defaults.receipt_write_attempts)
                .max(1),
        })
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|value| value.trim().parse::<T>().with_context(|| format!("{key}={value}")))
        .transpose()
}
