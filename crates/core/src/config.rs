use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::ApplicationError;

/// Environment variable naming the JSON secrets file.
pub const CONFIG_PATH_ENV: &str = "SLACK2DOC_SECRETS";

const DEFAULT_CONFIG_PATHS: [&str; 2] = [".secrets.json", "config/slack2doc.json"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub document: DocumentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub signing_secret: SecretString,
    pub channels: BTreeSet<String>,
    pub endpoint: String,
    pub bot_token: Option<SecretString>,
    pub replay_window_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DocumentConfig {
    pub kind: DocumentKind,
    pub doc_id: String,
    pub api_token: SecretString,
    pub worksheet: String,
    pub append_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Sheets,
    Docs,
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
    pub signing_secret: Option<String>,
    pub channels: Option<Vec<String>>,
    pub doc_id: Option<String>,
    pub api_token: Option<String>,
    pub endpoint: Option<String>,
    pub document_kind: Option<DocumentKind>,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    pub port: Option<u16>,
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
    ParseFile { path: PathBuf, source: serde_json::Error },
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

impl From<ConfigError> for ApplicationError {
    fn from(error: ConfigError) -> Self {
        ApplicationError::Configuration(error.to_string())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                signing_secret: String::new().into(),
                channels: BTreeSet::new(),
                endpoint: "/slack/events".to_string(),
                bot_token: None,
                replay_window_secs: 300,
            },
            document: DocumentConfig {
                kind: DocumentKind::Sheets,
                doc_id: String::new(),
                api_token: String::new().into(),
                worksheet: "ALL_MESSAGES".to_string(),
                append_timeout_secs: 10,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 3000 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Compact,
                file: None,
            },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for DocumentKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sheets" => Ok(Self::Sheets),
            "docs" => Ok(Self::Docs),
            other => Err(ConfigError::Validation(format!(
                "unsupported document kind `{other}` (expected sheets|docs)"
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
            config.apply_patch(patch)?;
        } else if let Some(named) = options
            .config_path
            .is_none()
            .then(|| read_env(CONFIG_PATH_ENV).map(PathBuf::from))
            .flatten()
        {
            // A path named by the environment is always required.
            return Err(ConfigError::MissingConfigFile(named));
        } else if options.require_file {
            let expected = options
                .config_path
                .or_else(|| read_env(CONFIG_PATH_ENV).map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATHS[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Whether events from `channel` should be archived.
    pub fn is_monitored(&self, channel: &str) -> bool {
        self.slack.channels.contains(channel)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(signing_secret_value) = patch.signing_secret {
            self.slack.signing_secret = secret_value(signing_secret_value);
        }
        if let Some(channels) = patch.channels {
            self.slack.channels = normalize_channels(channels);
        }
        if let Some(endpoint) = patch.endpoint {
            self.slack.endpoint = endpoint;
        }
        if let Some(bot_token_value) = patch.slack_bot_token {
            self.slack.bot_token = Some(secret_value(bot_token_value));
        }
        if let Some(replay_window_secs) = patch.replay_window_secs {
            self.slack.replay_window_secs = replay_window_secs;
        }

        if let Some(kind) = patch.document_kind {
            self.document.kind = kind;
        }
        if let Some(doc_id) = patch.doc_id {
            self.document.doc_id = doc_id;
        }
        if let Some(api_token_value) = patch.api_token {
            self.document.api_token = secret_value(api_token_value);
        }
        if let Some(worksheet) = patch.worksheet {
            self.document.worksheet = worksheet;
        }
        if let Some(append_timeout_secs) = patch.append_timeout_secs {
            self.document.append_timeout_secs = append_timeout_secs;
        }

        if let Some(bind_address) = patch.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = patch.port {
            self.server.port = port;
        }

        if let Some(level) = patch.log_level {
            self.logging.level = level;
        }
        if let Some(format) = patch.log_format {
            self.logging.format = format.parse()?;
        }
        if let Some(file) = patch.log_file {
            self.logging.file = log_file_path(file);
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SLACK2DOC_SIGNING_SECRET") {
            self.slack.signing_secret = secret_value(value);
        }
        if let Some(value) = read_env("SLACK2DOC_CHANNELS") {
            self.slack.channels =
                normalize_channels(value.split(',').map(str::to_string).collect());
        }
        if let Some(value) = read_env("SLACK2DOC_ENDPOINT") {
            self.slack.endpoint = value;
        }
        if let Some(value) = read_env("SLACK2DOC_SLACK_BOT_TOKEN") {
            self.slack.bot_token = Some(secret_value(value));
        }

        if let Some(value) = read_env("SLACK2DOC_DOC_ID") {
            self.document.doc_id = value;
        }
        if let Some(value) = read_env("SLACK2DOC_API_TOKEN") {
            self.document.api_token = secret_value(value);
        }
        if let Some(value) = read_env("SLACK2DOC_DOCUMENT_KIND") {
            self.document.kind = value.parse()?;
        }

        if let Some(value) = read_env("SLACK2DOC_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SLACK2DOC_PORT") {
            self.server.port = parse_u16("SLACK2DOC_PORT", &value)?;
        }

        if let Some(value) = read_env("SLACK2DOC_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("SLACK2DOC_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }
        if let Some(value) = read_env("SLACK2DOC_LOG_FILE") {
            self.logging.file = log_file_path(value);
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(signing_secret) = overrides.signing_secret {
            self.slack.signing_secret = secret_value(signing_secret);
        }
        if let Some(channels) = overrides.channels {
            self.slack.channels = normalize_channels(channels);
        }
        if let Some(endpoint) = overrides.endpoint {
            self.slack.endpoint = endpoint;
        }
        if let Some(doc_id) = overrides.doc_id {
            self.document.doc_id = doc_id;
        }
        if let Some(api_token) = overrides.api_token {
            self.document.api_token = secret_value(api_token);
        }
        if let Some(kind) = overrides.document_kind {
            self.document.kind = kind;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_file) = overrides.log_file {
            self.logging.file = log_file_path(log_file);
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_document(&self.document)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Path of the config file that `load` would read, if any exists.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    if let Some(path) = read_env(CONFIG_PATH_ENV).map(PathBuf::from) {
        return path.exists().then_some(path);
    }

    DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    serde_json::from_str::<ConfigPatch>(&interpolated)
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

fn normalize_channels(channels: Vec<String>) -> BTreeSet<String> {
    channels
        .into_iter()
        .map(|channel| channel.trim().trim_start_matches('#').to_string())
        .filter(|channel| !channel.is_empty())
        .collect()
}

fn log_file_path(value: String) -> Option<PathBuf> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if slack.signing_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "signing_secret is required. Get it from https://api.slack.com/apps > Your App > Basic Information > Signing Secret".to_string(),
        ));
    }

    if slack.channels.is_empty() {
        return Err(ConfigError::Validation(
            "channels must list at least one monitored channel".to_string(),
        ));
    }

    if !slack.endpoint.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "endpoint must be an absolute path starting with `/` (got `{}`)",
            slack.endpoint
        )));
    }
    if slack.endpoint.contains([':', '*', '{', '}']) {
        return Err(ConfigError::Validation(format!(
            "endpoint `{}` must be a literal path without `:`, `*`, `{{` or `}}`",
            slack.endpoint
        )));
    }
    if slack.endpoint == "/" || slack.endpoint == "/health" {
        return Err(ConfigError::Validation(format!(
            "endpoint `{}` collides with a built-in route",
            slack.endpoint
        )));
    }

    if let Some(bot_token) = &slack.bot_token {
        let bot_token = bot_token.expose_secret();
        if !bot_token.starts_with("xoxb-") {
            let hint = if bot_token.starts_with("xapp-") {
                " (hint: you may have used the app token instead of the bot token)"
            } else {
                ""
            };
            return Err(ConfigError::Validation(format!(
                "slack_bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
            )));
        }
    }

    if slack.replay_window_secs == 0 || slack.replay_window_secs > 3600 {
        return Err(ConfigError::Validation(
            "replay_window_secs must be in range 1..=3600".to_string(),
        ));
    }

    Ok(())
}

fn validate_document(document: &DocumentConfig) -> Result<(), ConfigError> {
    if document.doc_id.trim().is_empty() {
        return Err(ConfigError::Validation("doc_id is required".to_string()));
    }

    if document.api_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "api_token is required to call the Google document API".to_string(),
        ));
    }

    if document.kind == DocumentKind::Sheets && document.worksheet.trim().is_empty() {
        return Err(ConfigError::Validation(
            "worksheet must not be empty for sheets documents".to_string(),
        ));
    }

    if document.append_timeout_secs == 0 || document.append_timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "append_timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("port must be greater than zero".to_string()));
    }

    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("bind_address must not be empty".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "log_level must be one of trace|debug|info|warn|error".to_string(),
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

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    signing_secret: Option<String>,
    channels: Option<Vec<String>>,
    doc_id: Option<String>,
    endpoint: Option<String>,
    log_file: Option<String>,
    api_token: Option<String>,
    document_kind: Option<DocumentKind>,
    worksheet: Option<String>,
    slack_bot_token: Option<String>,
    bind_address: Option<String>,
    port: Option<u16>,
    replay_window_secs: Option<u64>,
    append_timeout_secs: Option<u64>,
    log_level: Option<String>,
    log_format: Option<String>,
}
