use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub chat: ChatConfig,
    pub monitor: MonitorConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub bot_token: SecretString,
}

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub bot_token: Option<String>,
    pub monitor_base_url: Option<String>,
    pub monitor_api_key: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://curator.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            chat: ChatConfig { bot_token: String::new().into() },
            monitor: MonitorConfig {
                base_url: "http://impactmonitor.net/app/api".to_string(),
                api_key: String::new().into(),
                timeout_secs: 15,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_port: 5000 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    chat: Option<ChatPatch>,
    monitor: Option<MonitorPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    bot_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MonitorPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    /// Loads config in layers: defaults, optional `curator.toml`, `CURATOR_*`
    /// environment overrides, then programmatic overrides, then validation.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("curator.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(chat) = patch.chat {
            if let Some(bot_token_value) = chat.bot_token {
                self.chat.bot_token = secret_value(bot_token_value);
            }
        }

        if let Some(monitor) = patch.monitor {
            if let Some(base_url) = monitor.base_url {
                self.monitor.base_url = base_url;
            }
            if let Some(api_key_value) = monitor.api_key {
                self.monitor.api_key = secret_value(api_key_value);
            }
            if let Some(timeout_secs) = monitor.timeout_secs {
                self.monitor.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_port) = server.health_port {
                self.server.health_port = health_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CURATOR_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CURATOR_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("CURATOR_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CURATOR_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CURATOR_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CURATOR_CHAT_BOT_TOKEN") {
            self.chat.bot_token = secret_value(value);
        }

        if let Some(value) = read_env("CURATOR_MONITOR_BASE_URL") {
            self.monitor.base_url = value;
        }
        if let Some(value) = read_env("CURATOR_MONITOR_API_KEY") {
            self.monitor.api_key = secret_value(value);
        }
        if let Some(value) = read_env("CURATOR_MONITOR_TIMEOUT_SECS") {
            self.monitor.timeout_secs = parse_u64("CURATOR_MONITOR_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CURATOR_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CURATOR_SERVER_HEALTH_PORT") {
            self.server.health_port = parse_u16("CURATOR_SERVER_HEALTH_PORT", &value)?;
        }

        let log_level = read_env("CURATOR_LOGGING_LEVEL").or_else(|| read_env("CURATOR_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CURATOR_LOGGING_FORMAT").or_else(|| read_env("CURATOR_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(bot_token) = overrides.bot_token {
            self.chat.bot_token = secret_value(bot_token);
        }
        if let Some(base_url) = overrides.monitor_base_url {
            self.monitor.base_url = base_url;
        }
        if let Some(api_key) = overrides.monitor_api_key {
            self.monitor.api_key = secret_value(api_key);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_chat(&self.chat)?;
        validate_monitor(&self.monitor)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("curator.toml"), PathBuf::from("config/curator.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    if chat.bot_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "chat.bot_token is required; set it in curator.toml or CURATOR_CHAT_BOT_TOKEN"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_monitor(monitor: &MonitorConfig) -> Result<(), ConfigError> {
    if monitor.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "monitor.api_key is required; set it in curator.toml or CURATOR_MONITOR_API_KEY"
                .to_string(),
        ));
    }

    let base_url = monitor.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "monitor.base_url must start with http:// or https://".to_string(),
        ));
    }

    if monitor.timeout_secs == 0 || monitor.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "monitor.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_port must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        interpolate_env_vars, AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat,
    };

    fn valid_overrides() -> ConfigOverrides {
        ConfigOverrides {
            database_url: Some("sqlite::memory:".to_string()),
            bot_token: Some("xoxb-test".to_string()),
            monitor_api_key: Some("key-test".to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn defaults_fail_validation_without_credentials() {
        let error = AppConfig::default().validate().expect_err("missing credentials");
        assert!(matches!(error, ConfigError::Validation(_)));
        assert!(error.to_string().contains("chat.bot_token"));
    }

    #[test]
    fn missing_bot_token_is_fatal() {
        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides { bot_token: None, ..valid_overrides() },
            ..LoadOptions::default()
        });

        let error = result.expect_err("bot token required");
        assert!(error.to_string().contains("chat.bot_token"));
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides { monitor_api_key: None, ..valid_overrides() },
            ..LoadOptions::default()
        });

        let error = result.expect_err("api key required");
        assert!(error.to_string().contains("monitor.api_key"));
    }

    #[test]
    fn overrides_win_over_defaults() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                log_level: Some("debug".to_string()),
                monitor_base_url: Some("https://monitor.example/api".to_string()),
                ..valid_overrides()
            },
            ..LoadOptions::default()
        })
        .expect("config loads");

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.monitor.base_url, "https://monitor.example/api");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn non_sqlite_database_url_is_rejected() {
        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("postgres://localhost/curator".to_string()),
                ..valid_overrides()
            },
            ..LoadOptions::default()
        });

        let error = result.expect_err("sqlite only");
        assert!(error.to_string().contains("database.url"));
    }

    #[test]
    fn missing_required_config_file_is_reported() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("does/not/exist/curator.toml".into()),
            require_file: true,
            overrides: valid_overrides(),
        });

        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn log_format_parses_known_values() {
        assert_eq!("json".parse::<LogFormat>().expect("json"), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().expect("pretty"), LogFormat::Pretty);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn unterminated_interpolation_is_rejected() {
        let error = interpolate_env_vars("token = \"${UNTERMINATED").expect_err("unterminated");
        assert!(matches!(error, ConfigError::UnterminatedInterpolation));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = AppConfig::load(LoadOptions {
            overrides: valid_overrides(),
            ..LoadOptions::default()
        })
        .expect("config loads");

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("xoxb-test"));
        assert!(!rendered.contains("key-test"));
    }
}
