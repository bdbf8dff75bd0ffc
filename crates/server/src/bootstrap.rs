use std::sync::Arc;
use std::time::Duration;

use slack2doc_core::config::{AppConfig, ConfigError, LoadOptions};
use slack2doc_core::ApplicationError;
use slack2doc_docs::{build_appender, AppendError};
use slack2doc_slack::{
    DirectoryError, PassthroughUserDirectory, SlackWebUserDirectory, UserDirectory,
};
use thiserror::Error;
use tracing::info;

use crate::webhook::WebhookState;

pub struct Application {
    pub config: Arc<AppConfig>,
    pub webhook: WebhookState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("document appender setup failed: {0}")]
    Appender(#[from] AppendError),
    #[error("slack user directory setup failed: {0}")]
    Directory(#[from] DirectoryError),
}

impl From<BootstrapError> for ApplicationError {
    fn from(error: BootstrapError) -> Self {
        ApplicationError::Configuration(error.to_string())
    }
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let config = Arc::new(config);
    let appender = build_appender(&config.document)?;

    let directory: Arc<dyn UserDirectory> = match &config.slack.bot_token {
        Some(token) => Arc::new(SlackWebUserDirectory::new(
            token.clone(),
            Duration::from_secs(config.document.append_timeout_secs),
        )?),
        None => Arc::new(PassthroughUserDirectory),
    };

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        document_kind = ?config.document.kind,
        monitored_channels = config.slack.channels.len(),
        user_lookup = if config.slack.bot_token.is_some() { "slack_web_api" } else { "passthrough" },
        "application bootstrap complete"
    );

    let webhook = WebhookState::new(config.clone(), appender, directory);
    Ok(Application { config, webhook })
}
