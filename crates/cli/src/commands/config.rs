use std::env;
use std::fs;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use slack2doc_core::config::{resolve_config_path, AppConfig};

use super::{load_config, CommandResult, EXIT_CONFIG_INVALID};

struct Field {
    key: &'static str,
    env_key: Option<&'static str>,
    value: String,
}

pub fn run(secrets: Option<&Path>) -> CommandResult {
    let config = match load_config(secrets) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG_INVALID,
            )
        }
    };

    let config_file_path = resolve_config_path(secrets);
    let config_file_doc = config_file_path.as_deref().and_then(load_config_file_doc);
    let file_label = config_file_path
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "config file".to_string());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(&field, config_file_doc.as_ref(), &file_label);
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let channels = config.slack.channels.iter().cloned().collect::<Vec<_>>().join(",");
    let bot_token = config.slack.bot_token.as_ref().map(redact_secret).unwrap_or_else(unset);
    let log_file = config
        .logging
        .file
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<stdout>".to_string());

    let slack = &config.slack;
    let document = &config.document;
    vec![
        field("signing_secret", Some("SLACK2DOC_SIGNING_SECRET"), redact_secret(&slack.signing_secret)),
        field("channels", Some("SLACK2DOC_CHANNELS"), channels),
        field("endpoint", Some("SLACK2DOC_ENDPOINT"), slack.endpoint.clone()),
        field("slack_bot_token", Some("SLACK2DOC_SLACK_BOT_TOKEN"), bot_token),
        field("replay_window_secs", None, slack.replay_window_secs.to_string()),
        field("document_kind", Some("SLACK2DOC_DOCUMENT_KIND"), format!("{:?}", document.kind)),
        field("doc_id", Some("SLACK2DOC_DOC_ID"), document.doc_id.clone()),
        field("api_token", Some("SLACK2DOC_API_TOKEN"), redact_secret(&document.api_token)),
        field("worksheet", None, document.worksheet.clone()),
        field("append_timeout_secs", None, document.append_timeout_secs.to_string()),
        field("bind_address", Some("SLACK2DOC_BIND_ADDRESS"), config.server.bind_address.clone()),
        field("port", Some("SLACK2DOC_PORT"), config.server.port.to_string()),
        field("log_level", Some("SLACK2DOC_LOG_LEVEL"), config.logging.level.clone()),
        field("log_format", Some("SLACK2DOC_LOG_FORMAT"), format!("{:?}", config.logging.format)),
        field("log_file", Some("SLACK2DOC_LOG_FILE"), log_file),
    ]
}

fn field(key: &'static str, env_key: Option<&'static str>, value: String) -> Field {
    Field { key, env_key, value }
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str::<Value>(&raw).ok()
}

fn field_source(field: &Field, config_file_doc: Option<&Value>, file_label: &str) -> String {
    if let Some(env_key) = field.env_key {
        if env_value_applies(env_key) {
            return format!("env ({env_key})");
        }
    }

    if config_file_doc.is_some_and(|doc| doc.get(field.key).is_some()) {
        return format!("file ({file_label})");
    }

    "default".to_string()
}

// Blank variables are skipped by the loader, so they are not a source either.
fn env_value_applies(env_key: &str) -> bool {
    env::var(env_key).is_ok_and(|value| !value.trim().is_empty())
}

fn unset() -> String {
    "<unset>".to_string()
}

fn redact_secret(secret: &SecretString) -> String {
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        if prefix.starts_with("xox") {
            return format!("{prefix}-***");
        }
    }

    "<redacted>".to_string()
}
