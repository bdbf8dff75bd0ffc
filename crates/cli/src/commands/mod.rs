pub mod config;
pub mod doctor;
pub mod sign;

use std::path::Path;

use serde::Serialize;
use slack2doc_core::config::{AppConfig, ConfigError, LoadOptions};

pub const EXIT_CONFIG_INVALID: u8 = 2;
pub const EXIT_IO: u8 = 3;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

/// Load config the way the server does; an explicit path must exist.
pub(crate) fn load_config(secrets: Option<&Path>) -> Result<AppConfig, ConfigError> {
    AppConfig::load(LoadOptions {
        config_path: secrets.map(Path::to_path_buf),
        require_file: secrets.is_some(),
        ..LoadOptions::default()
    })
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
