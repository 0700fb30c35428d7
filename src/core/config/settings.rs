use super::parsing::{
    env_optional, env_or_default, normalize_path, parse_bool, parse_environment, parse_u64,
};
use super::types::{
    ApiSettings, ConfigError, EndpointSettings, RuntimeSettings, SessionSettings, Settings,
    TelemetrySettings, TimeoutSettings,
};

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            parse_environment(env_optional("EXAM_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("EXAM_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let base_url = ApiSettings::parse_base_url(env_or_default(
            "EXAM_API_BASE_URL",
            "http://localhost:1337/api",
        ))?;
        let token = env_optional("EXAM_API_TOKEN");

        let students_path = normalize_path(
            "EXAM_STUDENTS_PATH",
            env_or_default("EXAM_STUDENTS_PATH", "/students"),
        )?;
        let questions_path = normalize_path(
            "EXAM_QUESTIONS_PATH",
            env_or_default("EXAM_QUESTIONS_PATH", "/mcq-answers"),
        )?;
        let submit_path = normalize_path(
            "EXAM_SUBMIT_PATH",
            env_or_default("EXAM_SUBMIT_PATH", "/mcq-answers/submit"),
        )?;

        let connect_timeout_seconds = parse_u64(
            "EXAM_CONNECT_TIMEOUT_SECONDS",
            env_or_default("EXAM_CONNECT_TIMEOUT_SECONDS", "10"),
        )?;
        let request_timeout_seconds = parse_u64(
            "EXAM_REQUEST_TIMEOUT_SECONDS",
            env_or_default("EXAM_REQUEST_TIMEOUT_SECONDS", "30"),
        )?;
        let fetch_timeout_seconds = parse_u64(
            "EXAM_FETCH_TIMEOUT_SECONDS",
            env_or_default("EXAM_FETCH_TIMEOUT_SECONDS", "45"),
        )?;

        let principal = env_optional("EXAM_PRINCIPAL");

        let log_level = env_or_default("EXAM_LOG_LEVEL", "info");
        let json = env_optional("EXAM_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { base_url, token },
            endpoints: EndpointSettings { students_path, questions_path, submit_path },
            timeouts: TimeoutSettings {
                connect_timeout_seconds,
                request_timeout_seconds,
                fetch_timeout_seconds,
            },
            session: SessionSettings { principal },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub fn endpoints(&self) -> &EndpointSettings {
        &self.endpoints
    }

    pub fn timeouts(&self) -> &TimeoutSettings {
        &self.timeouts
    }

    pub fn session(&self) -> &SessionSettings {
        &self.session
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeouts.fetch_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_FETCH_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.timeouts.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_REQUEST_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.api.token.is_none() {
            return Err(ConfigError::Missing("EXAM_API_TOKEN"));
        }
        if self.api.base_url.scheme() != "https" {
            return Err(ConfigError::InvalidBaseUrl(self.api.base_url.to_string()));
        }

        Ok(())
    }
}
