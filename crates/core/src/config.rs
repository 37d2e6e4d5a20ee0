use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub calendar: CalendarConfig,
    pub dialogue: DialogueConfig,
    pub scheduling: SchedulingConfig,
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
pub struct CalendarConfig {
    pub provider: CalendarProvider,
    pub credentials_path: Option<PathBuf>,
    pub calendar_id: String,
}

#[derive(Clone, Debug)]
pub struct DialogueConfig {
    pub enabled: bool,
    pub provider: DialogueProvider,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct SchedulingConfig {
    pub timezone: String,
    pub work_hours_start: u32,
    pub work_hours_end: u32,
    pub buffer_minutes: i64,
    pub search_window_days: i64,
    pub max_presented_options: usize,
}

impl SchedulingConfig {
    /// The validated user timezone. `validate` guarantees the name parses,
    /// so failures here only happen on hand-built configs.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone.parse::<Tz>().map_err(|_| {
            ConfigError::Validation(format!(
                "scheduling.timezone `{}` is not a known IANA timezone",
                self.timezone
            ))
        })
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarProvider {
    /// Google Calendar behind the boundary layer's client.
    Google,
    /// The deterministic built-in fixture calendar.
    Fixture,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueProvider {
    Gemini,
    OpenAi,
    Anthropic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub timezone: Option<String>,
    pub calendar_provider: Option<CalendarProvider>,
    pub dialogue_enabled: Option<bool>,
    pub dialogue_api_key: Option<String>,
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
                url: "sqlite://slotwise.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            calendar: CalendarConfig {
                provider: CalendarProvider::Fixture,
                credentials_path: None,
                calendar_id: "primary".to_string(),
            },
            dialogue: DialogueConfig {
                enabled: false,
                provider: DialogueProvider::Gemini,
                api_key: None,
                model: "gemini-1.5-flash".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            scheduling: SchedulingConfig {
                timezone: "UTC".to_string(),
                work_hours_start: 9,
                work_hours_end: 17,
                buffer_minutes: 15,
                search_window_days: 7,
                max_presented_options: 3,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for CalendarProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "fixture" => Ok(Self::Fixture),
            other => Err(ConfigError::Validation(format!(
                "unsupported calendar provider `{other}` (expected google|fixture)"
            ))),
        }
    }
}

impl std::str::FromStr for DialogueProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(ConfigError::Validation(format!(
                "unsupported dialogue provider `{other}` (expected gemini|openai|anthropic)"
            ))),
        }
    }
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("slotwise.toml"));
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

        if let Some(calendar) = patch.calendar {
            if let Some(provider) = calendar.provider {
                self.calendar.provider = provider;
            }
            if let Some(credentials_path) = calendar.credentials_path {
                self.calendar.credentials_path = Some(credentials_path);
            }
            if let Some(calendar_id) = calendar.calendar_id {
                self.calendar.calendar_id = calendar_id;
            }
        }

        if let Some(dialogue) = patch.dialogue {
            if let Some(enabled) = dialogue.enabled {
                self.dialogue.enabled = enabled;
            }
            if let Some(provider) = dialogue.provider {
                self.dialogue.provider = provider;
            }
            if let Some(api_key_value) = dialogue.api_key {
                self.dialogue.api_key = Some(secret_value(api_key_value));
            }
            if let Some(model) = dialogue.model {
                self.dialogue.model = model;
            }
            if let Some(timeout_secs) = dialogue.timeout_secs {
                self.dialogue.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = dialogue.max_retries {
                self.dialogue.max_retries = max_retries;
            }
        }

        if let Some(scheduling) = patch.scheduling {
            if let Some(timezone) = scheduling.timezone {
                self.scheduling.timezone = timezone;
            }
            if let Some(work_hours_start) = scheduling.work_hours_start {
                self.scheduling.work_hours_start = work_hours_start;
            }
            if let Some(work_hours_end) = scheduling.work_hours_end {
                self.scheduling.work_hours_end = work_hours_end;
            }
            if let Some(buffer_minutes) = scheduling.buffer_minutes {
                self.scheduling.buffer_minutes = buffer_minutes;
            }
            if let Some(search_window_days) = scheduling.search_window_days {
                self.scheduling.search_window_days = search_window_days;
            }
            if let Some(max_presented_options) = scheduling.max_presented_options {
                self.scheduling.max_presented_options = max_presented_options;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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
        if let Some(value) = read_env("SLOTWISE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SLOTWISE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("SLOTWISE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SLOTWISE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SLOTWISE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SLOTWISE_CALENDAR_PROVIDER") {
            self.calendar.provider = value.parse()?;
        }
        if let Some(value) = read_env("SLOTWISE_CALENDAR_CREDENTIALS_PATH") {
            self.calendar.credentials_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("SLOTWISE_CALENDAR_ID") {
            self.calendar.calendar_id = value;
        }

        if let Some(value) = read_env("SLOTWISE_DIALOGUE_ENABLED") {
            self.dialogue.enabled = parse_bool("SLOTWISE_DIALOGUE_ENABLED", &value)?;
        }
        if let Some(value) = read_env("SLOTWISE_DIALOGUE_PROVIDER") {
            self.dialogue.provider = value.parse()?;
        }
        if let Some(value) = read_env("SLOTWISE_DIALOGUE_API_KEY") {
            self.dialogue.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SLOTWISE_DIALOGUE_MODEL") {
            self.dialogue.model = value;
        }
        if let Some(value) = read_env("SLOTWISE_DIALOGUE_TIMEOUT_SECS") {
            self.dialogue.timeout_secs = parse_u64("SLOTWISE_DIALOGUE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SLOTWISE_TIMEZONE") {
            self.scheduling.timezone = value;
        }
        if let Some(value) = read_env("SLOTWISE_WORK_HOURS_START") {
            self.scheduling.work_hours_start = parse_u32("SLOTWISE_WORK_HOURS_START", &value)?;
        }
        if let Some(value) = read_env("SLOTWISE_WORK_HOURS_END") {
            self.scheduling.work_hours_end = parse_u32("SLOTWISE_WORK_HOURS_END", &value)?;
        }
        if let Some(value) = read_env("SLOTWISE_BUFFER_MINUTES") {
            self.scheduling.buffer_minutes =
                i64::from(parse_u32("SLOTWISE_BUFFER_MINUTES", &value)?);
        }

        if let Some(value) = read_env("SLOTWISE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SLOTWISE_SERVER_PORT") {
            self.server.port = parse_u16("SLOTWISE_SERVER_PORT", &value)?;
        }

        let log_level =
            read_env("SLOTWISE_LOGGING_LEVEL").or_else(|| read_env("SLOTWISE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SLOTWISE_LOGGING_FORMAT").or_else(|| read_env("SLOTWISE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(timezone) = overrides.timezone {
            self.scheduling.timezone = timezone;
        }
        if let Some(calendar_provider) = overrides.calendar_provider {
            self.calendar.provider = calendar_provider;
        }
        if let Some(dialogue_enabled) = overrides.dialogue_enabled {
            self.dialogue.enabled = dialogue_enabled;
        }
        if let Some(dialogue_api_key) = overrides.dialogue_api_key {
            self.dialogue.api_key = Some(secret_value(dialogue_api_key));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_calendar(&self.calendar)?;
        validate_dialogue(&self.dialogue)?;
        validate_scheduling(&self.scheduling)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("slotwise.toml"), PathBuf::from("config/slotwise.toml")]
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

fn validate_calendar(calendar: &CalendarConfig) -> Result<(), ConfigError> {
    if calendar.provider == CalendarProvider::Google && calendar.credentials_path.is_none() {
        return Err(ConfigError::Validation(
            "calendar.credentials_path is required for the google provider".to_string(),
        ));
    }
    if calendar.calendar_id.trim().is_empty() {
        return Err(ConfigError::Validation("calendar.calendar_id must not be empty".to_string()));
    }
    Ok(())
}

fn validate_dialogue(dialogue: &DialogueConfig) -> Result<(), ConfigError> {
    if dialogue.timeout_secs == 0 || dialogue.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "dialogue.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if dialogue.enabled {
        let missing = dialogue
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "dialogue.api_key is required when the dialogue engine is enabled".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_scheduling(scheduling: &SchedulingConfig) -> Result<(), ConfigError> {
    if scheduling.timezone.parse::<Tz>().is_err() {
        return Err(ConfigError::Validation(format!(
            "scheduling.timezone `{}` is not a known IANA timezone",
            scheduling.timezone
        )));
    }

    if scheduling.work_hours_start >= scheduling.work_hours_end || scheduling.work_hours_end > 24 {
        return Err(ConfigError::Validation(
            "scheduling work hours must satisfy start < end <= 24".to_string(),
        ));
    }

    if scheduling.buffer_minutes < 0 || scheduling.buffer_minutes > 240 {
        return Err(ConfigError::Validation(
            "scheduling.buffer_minutes must be in range 0..=240".to_string(),
        ));
    }

    if scheduling.search_window_days < 1 || scheduling.search_window_days > 60 {
        return Err(ConfigError::Validation(
            "scheduling.search_window_days must be in range 1..=60".to_string(),
        ));
    }

    if scheduling.max_presented_options == 0 {
        return Err(ConfigError::Validation(
            "scheduling.max_presented_options must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
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

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    calendar: Option<CalendarPatch>,
    dialogue: Option<DialoguePatch>,
    scheduling: Option<SchedulingPatch>,
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
struct CalendarPatch {
    provider: Option<CalendarProvider>,
    credentials_path: Option<PathBuf>,
    calendar_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DialoguePatch {
    enabled: Option<bool>,
    provider: Option<DialogueProvider>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulingPatch {
    timezone: Option<String>,
    work_hours_start: Option<u32>,
    work_hours_end: Option<u32>,
    buffer_minutes: Option<i64>,
    search_window_days: Option<i64>,
    max_presented_options: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, CalendarProvider, ConfigError, ConfigOverrides, LoadOptions};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_out_of_the_box() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduling.max_presented_options, 3);
        assert_eq!(config.scheduling.buffer_minutes, 15);
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_DIALOGUE_KEY", "key-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("slotwise.toml");
            fs::write(
                &path,
                r#"
[dialogue]
enabled = true
api_key = "${TEST_DIALOGUE_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config
                    .dialogue
                    .api_key
                    .as_ref()
                    .map(|key| key.expose_secret() == "key-from-env")
                    .unwrap_or(false),
                "dialogue key should be loaded from environment",
            )
        })();

        clear_vars(&["TEST_DIALOGUE_KEY"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SLOTWISE_TIMEZONE", "Europe/Berlin");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("slotwise.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[scheduling]
timezone = "America/Chicago"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.scheduling.timezone == "Europe/Berlin",
                "env timezone should win over file and defaults",
            )
        })();

        clear_vars(&["SLOTWISE_TIMEZONE"]);
        result
    }

    #[test]
    fn validation_rejects_unknown_timezone() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SLOTWISE_TIMEZONE", "Mars/Olympus_Mons");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("scheduling.timezone")
            );
            ensure(has_message, "validation failure should mention scheduling.timezone")
        })();

        clear_vars(&["SLOTWISE_TIMEZONE"]);
        result
    }

    #[test]
    fn google_calendar_requires_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    calendar_provider: Some(CalendarProvider::Google),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            }) {
                Ok(_) => return Err("expected google provider to fail validation".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message)
                        if message.contains("calendar.credentials_path")
                ),
                "validation failure should mention calendar.credentials_path",
            )
        })();

        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SLOTWISE_DIALOGUE_ENABLED", "true");
        env::set_var("SLOTWISE_DIALOGUE_API_KEY", "super-secret-dialogue-key");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("super-secret-dialogue-key"),
                "debug output should not contain the dialogue api key",
            )
        })();

        clear_vars(&["SLOTWISE_DIALOGUE_ENABLED", "SLOTWISE_DIALOGUE_API_KEY"]);
        result
    }
}
