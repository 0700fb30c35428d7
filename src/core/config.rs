mod parsing;
mod settings;
mod types;

pub use types::{
    ApiSettings, ConfigError, EndpointSettings, Environment, RuntimeSettings, SessionSettings,
    Settings, TelemetrySettings, TimeoutSettings,
};
