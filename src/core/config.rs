use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::repositories::exams::MAX_PAGE_SIZE;

const DEFAULT_CORS_ORIGINS: &[&str] =
    &["http://localhost:5173", "http://localhost:3000", "http://localhost:8080"];

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    server: ServerSettings,
    runtime: RuntimeSettings,
    api: ApiSettings,
    cors: CorsSettings,
    database: DatabaseSettings,
    reconciler: ReconcilerSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
struct ServerSettings {
    host: String,
    port: u16,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) project_name: String,
    pub(crate) version: String,
    pub(crate) api_v1_str: String,
}

#[derive(Debug, Clone)]
pub(crate) struct CorsSettings {
    pub(crate) origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DatabaseSettings {
    pub(crate) postgres_server: String,
    pub(crate) postgres_port: u16,
    pub(crate) postgres_user: String,
    pub(crate) postgres_password: String,
    pub(crate) postgres_db: String,
    pub(crate) database_url: Option<String>,
    pub(crate) max_connections: u32,
}

/// Cadence and page size of the background close-expired-exams pass.
/// `batch_size` never exceeds the repository page cap.
#[derive(Debug, Clone)]
pub(crate) struct ReconcilerSettings {
    pub(crate) interval_seconds: u64,
    pub(crate) batch_size: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Test => "test",
        }
    }

    /// Unknown names fall back to development.
    fn from_name(name: Option<&str>) -> Self {
        match name.map(str::to_ascii_lowercase).as_deref() {
            Some("production" | "prod") => Environment::Production,
            Some("staging") => Environment::Staging,
            Some("test" | "testing") => Environment::Test,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid server port: {0}")]
    InvalidPort(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid cors origins: {0}")]
    InvalidCors(String),
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let runtime = RuntimeSettings::from_env();

        let settings = Self {
            server: ServerSettings::from_env()?,
            api: ApiSettings {
                project_name: env_or("PROJECT_NAME", "Exam Gate API"),
                version: env_or("VERSION", env!("CARGO_PKG_VERSION")),
                api_v1_str: env_or("API_V1_STR", "/api/v1"),
            },
            cors: CorsSettings { origins: parse_cors_origins(env_var("BACKEND_CORS_ORIGINS"))? },
            database: DatabaseSettings::from_env()?,
            reconciler: ReconcilerSettings {
                interval_seconds: env_parse("RECONCILE_INTERVAL_SECONDS", 60)?,
                batch_size: env_parse("RECONCILE_BATCH_SIZE", 500)?,
            },
            telemetry: TelemetrySettings {
                log_level: env_or("EXAM_GATE_LOG_LEVEL", "info"),
                json: env_flag("EXAM_GATE_LOG_JSON"),
                prometheus_enabled: env_flag("PROMETHEUS_ENABLED"),
            },
            runtime,
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn reconciler(&self) -> &ReconcilerSettings {
        &self.reconciler
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let reconciler = &self.reconciler;
        let checks = [
            (
                "RECONCILE_INTERVAL_SECONDS",
                reconciler.interval_seconds > 0,
                reconciler.interval_seconds.to_string(),
            ),
            (
                "RECONCILE_BATCH_SIZE",
                (1..=MAX_PAGE_SIZE).contains(&reconciler.batch_size),
                reconciler.batch_size.to_string(),
            ),
            (
                "POSTGRES_MAX_CONNECTIONS",
                self.database.max_connections > 0,
                self.database.max_connections.to_string(),
            ),
        ];
        if let Some((field, _, value)) = checks.into_iter().find(|(_, valid, _)| !valid) {
            return Err(ConfigError::InvalidValue { field, value });
        }

        if self.runtime.strict_config
            && self.database.database_url.is_none()
            && self.database.postgres_password.is_empty()
        {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }

        Ok(())
    }
}

impl ServerSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let host = env_or("EXAM_GATE_HOST", "0.0.0.0");
        let raw_port = env_or("EXAM_GATE_PORT", "8000");
        let port = raw_port
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or(ConfigError::InvalidPort(raw_port))?;

        Ok(Self { host, port })
    }
}

impl RuntimeSettings {
    /// Production always runs strict.
    fn from_env() -> Self {
        let environment = Environment::from_name(
            env_var("EXAM_GATE_ENV").or_else(|| env_var("ENVIRONMENT")).as_deref(),
        );
        let strict_config =
            env_flag("EXAM_GATE_STRICT_CONFIG") || environment == Environment::Production;

        Self { environment, strict_config }
    }
}

impl DatabaseSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            postgres_server: env_or("POSTGRES_SERVER", "localhost"),
            postgres_port: env_parse("POSTGRES_PORT", 5432)?,
            postgres_user: env_or("POSTGRES_USER", "exam_gate"),
            postgres_password: env_or("POSTGRES_PASSWORD", ""),
            postgres_db: env_or("POSTGRES_DB", "exam_gate"),
            database_url: env_var("DATABASE_URL"),
            max_connections: env_parse("POSTGRES_MAX_CONNECTIONS", 30)?,
        })
    }

    /// `DATABASE_URL` wins over the individual `POSTGRES_*` parts.
    pub(crate) fn database_url(&self) -> String {
        match &self.database_url {
            Some(url) => url.clone(),
            None => format!(
                "postgresql://{}:{}@{}:{}/{}",
                self.postgres_user,
                self.postgres_password,
                self.postgres_server,
                self.postgres_port,
                self.postgres_db
            ),
        }
    }
}

/// Trimmed value; blank counts as unset.
fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_var(key).unwrap_or_else(|| default.to_string())
}

fn env_flag(key: &str) -> bool {
    env_var(key).is_some_and(|value| parse_bool(&value))
}

fn env_parse<T: FromStr>(field: &'static str, default: T) -> Result<T, ConfigError> {
    match env_var(field) {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue { field, value }),
        None => Ok(default),
    }
}

/// Accepts a JSON array or a comma separated list.
fn parse_cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let origins = match value {
        Some(raw) if raw.starts_with('[') => {
            serde_json::from_str::<Vec<String>>(&raw).map_err(|_| ConfigError::InvalidCors(raw))?
        }
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    };

    if origins.is_empty() {
        return Ok(DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect());
    }
    Ok(origins)
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
