use std::fs;
use std::path::Path;

use chrono::Utc;
use secrecy::ExposeSecret;
use slack2doc_slack::signature::{compute_signature, SignatureError};

use super::{load_config, CommandResult, EXIT_CONFIG_INVALID, EXIT_IO};

pub fn run(secrets: Option<&Path>, body_path: &Path, timestamp: Option<i64>) -> CommandResult {
    let config = match load_config(secrets) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "sign",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG_INVALID,
            )
        }
    };

    let body = match fs::read(body_path) {
        Ok(body) => body,
        Err(error) => {
            return CommandResult::failure(
                "sign",
                "io",
                format!("could not read `{}`: {error}", body_path.display()),
                EXIT_IO,
            )
        }
    };

    let timestamp = timestamp.unwrap_or_else(|| Utc::now().timestamp());
    match render_headers(config.slack.signing_secret.expose_secret(), timestamp, &body) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => {
            CommandResult::failure("sign", "signature", error.to_string(), EXIT_CONFIG_INVALID)
        }
    }
}

/// Header lines ready to paste into `curl -H`.
pub fn render_headers(
    signing_secret: &str,
    timestamp: i64,
    body: &[u8],
) -> Result<String, SignatureError> {
    let timestamp = timestamp.to_string();
    let signature = compute_signature(signing_secret, &timestamp, body)?;
    Ok(format!("X-Slack-Request-Timestamp: {timestamp}\nX-Slack-Signature: {signature}"))
}
