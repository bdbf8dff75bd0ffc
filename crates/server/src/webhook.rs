use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use slack2doc_core::{AppConfig, ApplicationError, InterfaceError};
use slack2doc_docs::{AppendError, DocumentAppender};
use slack2doc_slack::{
    parse_event,
    signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER},
    MessageEvent, SignatureVerifier, SignedRequest, SlackEvent, UserDirectory,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const UNKNOWN_AUTHOR: &str = "unknown";

#[derive(Clone)]
pub struct WebhookState {
    pub config: Arc<AppConfig>,
    pub verifier: Arc<SignatureVerifier>,
    pub appender: Arc<dyn DocumentAppender>,
    pub directory: Arc<dyn UserDirectory>,
}

impl WebhookState {
    pub fn new(
        config: Arc<AppConfig>,
        appender: Arc<dyn DocumentAppender>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let verifier = SignatureVerifier::new(
            config.slack.signing_secret.clone(),
            config.slack.replay_window_secs,
        );
        Self { config, verifier: Arc::new(verifier), appender, directory }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub correlation_id: String,
}

pub fn router(state: WebhookState) -> Router {
    let endpoint = state.config.slack.endpoint.clone();
    Router::new().route(&endpoint, post(receive_event)).with_state(state)
}

pub async fn receive_event(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let request_timestamp = header_str(&headers, TIMESTAMP_HEADER);

    let request = SignedRequest {
        timestamp: request_timestamp,
        signature: header_str(&headers, SIGNATURE_HEADER),
        body: &body,
    };
    if let Err(signature_error) = state.verifier.verify_now(&request) {
        let error = ApplicationError::from(signature_error);
        warn!(
            event_name = "slack.webhook.rejected",
            correlation_id = %correlation_id,
            request_timestamp = request_timestamp.unwrap_or("missing"),
            error_kind = error.kind(),
            error = %error,
            "rejected slack request"
        );
        return error_response(error.into_interface(correlation_id));
    }

    let event = match parse_event(header_str(&headers, CONTENT_TYPE.as_str()), &body) {
        Ok(event) => event,
        Err(envelope_error) => {
            let error = ApplicationError::from(envelope_error);
            warn!(
                event_name = "slack.webhook.malformed",
                correlation_id = %correlation_id,
                request_timestamp = request_timestamp.unwrap_or("missing"),
                error_kind = error.kind(),
                error = %error,
                "could not parse slack event payload"
            );
            return error_response(error.into_interface(correlation_id));
        }
    };

    match event {
        SlackEvent::UrlVerification { challenge } => {
            info!(
                event_name = "slack.webhook.url_verification",
                correlation_id = %correlation_id,
                "answered slack url verification"
            );
            Json(json!({ "challenge": challenge })).into_response()
        }
        SlackEvent::Ignored { reason } => {
            debug!(
                event_name = "slack.webhook.ignored",
                correlation_id = %correlation_id,
                reason = %reason,
                "ignored slack event"
            );
            acknowledge()
        }
        SlackEvent::Message(message) => archive_message(&state, message, correlation_id).await,
    }
}

async fn archive_message(
    state: &WebhookState,
    message: MessageEvent,
    correlation_id: String,
) -> Response {
    if !state.config.is_monitored(&message.channel_id) {
        debug!(
            event_name = "slack.webhook.filtered",
            correlation_id = %correlation_id,
            channel = %message.channel_id,
            "channel is not monitored"
        );
        return acknowledge();
    }

    let author = resolve_author(state, message.user_id.as_deref(), &correlation_id).await;
    let entry = message.into_entry(author);
    let timeout_secs = state.config.document.append_timeout_secs;

    let outcome = match tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        state.appender.append(&state.config.document.doc_id, &entry),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(AppendError::Timeout { after_secs: timeout_secs }),
    };

    match outcome {
        Ok(()) => {
            info!(
                event_name = "slack.webhook.archived",
                correlation_id = %correlation_id,
                channel = %entry.channel,
                message_ts = %entry.message_ts,
                entry_kind = entry.kind.as_str(),
                "archived slack message"
            );
            acknowledge()
        }
        Err(append_error) => {
            let error = ApplicationError::from(append_error);
            error!(
                event_name = "slack.webhook.append_failed",
                correlation_id = %correlation_id,
                channel = %entry.channel,
                message_ts = %entry.message_ts,
                error_kind = error.kind(),
                error = %error,
                "failed to append slack message to document"
            );
            error_response(error.into_interface(correlation_id))
        }
    }
}

async fn resolve_author(
    state: &WebhookState,
    user_id: Option<&str>,
    correlation_id: &str,
) -> String {
    let Some(user_id) = user_id else {
        return UNKNOWN_AUTHOR.to_string();
    };

    match state.directory.display_name(user_id).await {
        Ok(name) => name,
        Err(directory_error) => {
            warn!(
                event_name = "slack.webhook.author_fallback",
                correlation_id,
                user_id,
                error = %directory_error,
                "could not resolve slack user, using id"
            );
            user_id.to_string()
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn acknowledge() -> Response {
    Json(json!({ "ok": true })).into_response()
}

fn error_response(error: InterfaceError) -> Response {
    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body =
        ErrorBody { error: error.user_message(), correlation_id: error.correlation_id().to_owned() };
    (status, Json(body)).into_response()
}
