use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use slack2doc_core::{DocumentEntry, EntryKind};
use tracing::debug;

use crate::appender::{api_url, send_json, AppendError, DocumentAppender};

const DOCS_API_BASE_URL: &str = "https://docs.googleapis.com";

/// Appends one text line per entry to the end of a Google Doc body.
#[derive(Clone)]
pub struct GoogleDocsAppender {
    client: Client,
    api_token: SecretString,
    timeout_secs: u64,
    base_url: String,
}

impl GoogleDocsAppender {
    pub fn new(api_token: SecretString, timeout_secs: u64) -> Result<Self, AppendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|error| AppendError::Transport(error.to_string()))?;

        Ok(Self { client, api_token, timeout_secs, base_url: DOCS_API_BASE_URL.to_string() })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl DocumentAppender for GoogleDocsAppender {
    async fn append(&self, doc_id: &str, entry: &DocumentEntry) -> Result<(), AppendError> {
        let target = format!("{doc_id}:batchUpdate");
        let url = api_url(&self.base_url, &["v1", "documents", target.as_str()])?;
        debug!(
            event_name = "docs.document.append",
            channel = %entry.channel,
            message_ts = %entry.message_ts,
            "appending line to document"
        );

        let request = self.client.post(url).bearer_auth(self.api_token.expose_secret());
        send_json(request, &batch_update_body(entry), self.timeout_secs).await
    }
}

/// `[<rfc3339>] #<channel> <author> (<kind>): <text>`; the kind is left out
/// for plain posts.
pub fn format_line(entry: &DocumentEntry) -> String {
    let timestamp = entry.timestamp.to_rfc3339();
    match entry.kind {
        EntryKind::Posted => {
            format!("[{timestamp}] #{} {}: {}\n", entry.channel, entry.author, entry.text)
        }
        kind => format!(
            "[{timestamp}] #{} {} ({}): {}\n",
            entry.channel,
            entry.author,
            kind.as_str(),
            entry.text
        ),
    }
}

pub fn batch_update_body(entry: &DocumentEntry) -> Value {
    json!({
        "requests": [{
            "insertText": {
                "endOfSegmentLocation": {},
                "text": format_line(entry),
            }
        }]
    })
}

#[cfg(test)]
mod tests {
    use slack2doc_core::{DocumentEntry, EntryKind, SlackTimestamp};

    use super::{batch_update_body, format_line, GoogleDocsAppender};
    use crate::appender::{AppendError, DocumentAppender};
    use crate::test_support::one_shot_server;

    fn entry(kind: EntryKind) -> DocumentEntry {
        DocumentEntry {
            timestamp: SlackTimestamp::from_seconds(1_700_000_000),
            channel: "general".to_string(),
            author: "alice".to_string(),
            text: "hello".to_string(),
            kind,
            message_ts: SlackTimestamp::from_seconds(1_700_000_000),
        }
    }

    #[test]
    fn posted_lines_omit_the_kind() {
        assert_eq!(
            format_line(&entry(EntryKind::Posted)),
            "[2023-11-14T22:13:20Z] #general alice: hello\n"
        );
    }

    #[test]
    fn other_kinds_are_labelled() {
        assert_eq!(
            format_line(&entry(EntryKind::Edited)),
            "[2023-11-14T22:13:20Z] #general alice (edited): hello\n"
        );
        assert_eq!(
            format_line(&entry(EntryKind::Reply)),
            "[2023-11-14T22:13:20Z] #general alice (reply): hello\n"
        );
    }

    #[test]
    fn batch_update_inserts_at_end_of_body() {
        let body = batch_update_body(&entry(EntryKind::Deleted));
        let insert = &body["requests"][0]["insertText"];

        assert!(insert["endOfSegmentLocation"].is_object());
        assert_eq!(insert["text"], "[2023-11-14T22:13:20Z] #general alice (deleted): hello\n");
    }

    #[tokio::test]
    async fn posts_batch_update_for_document() {
        let (address, server) = one_shot_server("HTTP/1.1 200 OK", r#"{"replies":[{}]}"#).await;
        let appender = GoogleDocsAppender::new("token".to_string().into(), 5)
            .expect("appender")
            .with_base_url(format!("http://{address}/"));

        appender.append("doc-456", &entry(EntryKind::Posted)).await.expect("append succeeds");

        let captured = server.await.expect("server task");
        assert!(captured.head.starts_with("POST /v1/documents/doc-456:batchUpdate "));
        assert!(captured.body.contains("insertText"));
    }

    #[tokio::test]
    async fn document_ids_are_escaped_in_the_path() {
        let (address, server) = one_shot_server("HTTP/1.1 200 OK", "{}").await;
        let appender = GoogleDocsAppender::new("token".to_string().into(), 5)
            .expect("appender")
            .with_base_url(format!("http://{address}"));

        appender.append("doc/../x y", &entry(EntryKind::Posted)).await.expect("append succeeds");

        let captured = server.await.expect("server task");
        assert!(
            captured.head.starts_with("POST /v1/documents/doc%2F..%2Fx%20y:batchUpdate "),
            "{}",
            captured.head
        );
    }

    #[tokio::test]
    async fn server_errors_are_rejected() {
        let (address, server) = one_shot_server("HTTP/1.1 500 Internal Server Error", "oops").await;
        let appender = GoogleDocsAppender::new("token".to_string().into(), 5)
            .expect("appender")
            .with_base_url(format!("http://{address}"));

        let error =
            appender.append("doc-456", &entry(EntryKind::Posted)).await.expect_err("should fail");
        server.await.expect("server task");

        assert_eq!(error, AppendError::Rejected { status: 500, body: "oops".to_string() });
    }
}
