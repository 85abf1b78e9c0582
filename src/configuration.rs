use std::path::Path;
use std::str::FromStr;

use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::ConnectOptions;

use crate::domain::UserEmail;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub email_client: EmailClientSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(
        default = "default_otp_cleanup_interval",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub otp_cleanup_interval_seconds: u64,
}

impl ApplicationSettings {
    pub fn otp_cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.otp_cleanup_interval_seconds)
    }
}

fn default_mode() -> String {
    "prod".into()
}

fn default_otp_cleanup_interval() -> u64 {
    3600
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    /// Full connection string. Takes precedence over the individual fields.
    #[serde(default)]
    pub url: Option<Secret<String>>,
    pub username: String,
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> Result<PgConnectOptions, sqlx::Error> {
        let options = match &self.url {
            Some(url) => PgConnectOptions::from_str(url.expose_secret())?,
            None => self.without_db().database(&self.database_name),
        };
        Ok(options.log_statements(tracing_log::log::LevelFilter::Trace))
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct EmailClientSettings {
    pub base_url: String,
    pub sender_email: String,
    pub authorization_token: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl EmailClientSettings {
    pub fn sender(&self) -> Result<UserEmail, String> {
        UserEmail::parse(self.sender_email.clone())
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_milliseconds)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid PORT value {value:?}: {reason}")]
    InvalidPort { value: String, reason: String },
    #[error("{0}")]
    UnknownEnvironment(String),
    #[error("Failed to determine the current directory.")]
    CurrentDirectory(#[source] std::io::Error),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

/// The runtime environment, selected through `APP_ENVIRONMENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = ConfigurationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(ConfigurationError::UnknownEnvironment(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            ))),
        }
    }
}

/// Parses a listening port. Anything that is not an integer in `1..=65535`
/// is rejected instead of falling back to a default.
pub fn parse_port(raw: &str) -> Result<u16, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidPort {
        value: raw.to_owned(),
        reason,
    };
    let port = raw
        .trim()
        .parse::<u16>()
        .map_err(|e| invalid(e.to_string()))?;
    if port == 0 {
        return Err(invalid("port must be a positive integer".into()));
    }
    Ok(port)
}

pub fn get_configuration() -> Result<Settings, ConfigurationError> {
    let base_path = std::env::current_dir().map_err(ConfigurationError::CurrentDirectory)?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()?;

    build_settings(
        &configuration_directory,
        environment,
        std::env::var("PORT").ok().as_deref(),
        std::env::var("DATABASE_URL").ok(),
    )
}

/// Layers `base.yaml`, the environment file and `APP_*` variables, then
/// applies the `PORT` and `DATABASE_URL` overrides on top.
pub fn build_settings(
    configuration_directory: &Path,
    environment: Environment,
    port_override: Option<&str>,
    database_url: Option<String>,
) -> Result<Settings, ConfigurationError> {
    let environment_filename = format!("{}.yaml", environment.as_str());

    let mut builder = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        );

    if let Some(raw) = port_override {
        let port = parse_port(raw)?;
        tracing::info!("Setting server port to: {}", port);
        builder = builder.set_override("application.port", i64::from(port))?;
    }
    if let Some(url) = database_url {
        builder = builder.set_override("database.url", url)?;
    }

    let settings = builder.build()?;
    Ok(settings.try_deserialize::<Settings>()?)
}
