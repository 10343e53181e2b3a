//! # ks-config
//!
//! Layered settings: built-in defaults, then an optional `kitsune.toml`, then
//! `KITSUNE__SECTION__KEY` environment variables.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub notifications: NotificationSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: IpAddr,
    pub port: u16,
}

impl ServerSettings {
    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// May carry credentials for other backends, so it never hits the logs.
    pub url: SecretString,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSettings {
    pub site_url: String,
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub filter: String,
    pub json: bool,
}

const ENV_PREFIX: &str = "KITSUNE";
const ENV_SEPARATOR: &str = "__";

fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    Config::builder()
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080)?
        .set_default("database.url", "sqlite://kitsune.db?mode=rwc")?
        .set_default("database.max_connections", 5)?
        .set_default("notifications.site_url", "http://127.0.0.1:8080")?
        .set_default(
            "notifications.from_address",
            "notifications@support.example.org",
        )?
        .set_default("log.filter", "info")?
        .set_default("log.json", false)
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

impl Settings {
    /// Reads `.env` (if present), `kitsune.toml` (if present) and the process
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if e.not_found() {
                debug!("no .env file found");
            } else {
                return Err(e.into());
            }
        }

        let settings = defaults()?
            .add_source(File::with_name("kitsune").required(false))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
