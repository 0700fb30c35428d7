use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Settings {
    pub(super) runtime: RuntimeSettings,
    pub(super) api: ApiSettings,
    pub(super) endpoints: EndpointSettings,
    pub(super) timeouts: TimeoutSettings,
    pub(super) session: SessionSettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Url,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EndpointSettings {
    pub students_path: String,
    pub questions_path: String,
    pub submit_path: String,
}

#[derive(Debug, Clone)]
pub struct TimeoutSettings {
    pub connect_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
    pub fetch_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub principal: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub log_level: String,
    pub json: bool,
    pub prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub environment: Environment,
    pub strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Test => "test",
        }
    }

    pub(super) fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid api base url: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("missing required setting {0}")]
    Missing(&'static str),
}

impl TimeoutSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

impl ApiSettings {
    pub(super) fn parse_base_url(value: String) -> Result<Url, ConfigError> {
        let parsed =
            Url::parse(value.trim()).map_err(|_| ConfigError::InvalidBaseUrl(value.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl(value));
        }

        Ok(parsed)
    }

    /// Joins an endpoint path onto the base url, keeping any path prefix the base already has.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
