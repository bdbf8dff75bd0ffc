use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};
use serde::Serialize;
use slack2doc_core::config::DocumentKind;
use slack2doc_core::{ApplicationError, DocumentEntry};
use thiserror::Error;

/// Longest response body kept on a rejected append.
const MAX_REJECTED_BODY_CHARS: usize = 512;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AppendError {
    #[error("document append timed out after {after_secs}s")]
    Timeout { after_secs: u64 },
    #[error("document append request failed: {0}")]
    Transport(String),
    #[error("document api rejected append with http {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl From<AppendError> for ApplicationError {
    fn from(error: AppendError) -> Self {
        ApplicationError::AppendFailure(error.to_string())
    }
}

/// Writes one archived entry to the end of the target document.
///
/// Implementations make exactly one attempt; callers own retry policy.
#[async_trait]
pub trait DocumentAppender: Send + Sync {
    async fn append(&self, doc_id: &str, entry: &DocumentEntry) -> Result<(), AppendError>;
}

/// Browser URL of the target document.
pub fn document_url(kind: DocumentKind, doc_id: &str) -> String {
    match kind {
        DocumentKind::Sheets => format!("https://docs.google.com/spreadsheets/d/{doc_id}/edit"),
        DocumentKind::Docs => format!("https://docs.google.com/document/d/{doc_id}/edit"),
    }
}

/// Join `segments` onto `base_url`, percent-encoding each one.
pub(crate) fn api_url(base_url: &str, segments: &[&str]) -> Result<Url, AppendError> {
    let mut url = Url::parse(base_url)
        .map_err(|error| AppendError::Transport(format!("invalid api url `{base_url}`: {error}")))?;
    url.path_segments_mut()
        .map_err(|()| AppendError::Transport(format!("api url `{base_url}` cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) async fn send_json<T: Serialize + ?Sized>(
    request: RequestBuilder,
    body: &T,
    timeout_secs: u64,
) -> Result<(), AppendError> {
    let response = request.json(body).send().await.map_err(|error| {
        if error.is_timeout() {
            AppendError::Timeout { after_secs: timeout_secs }
        } else {
            AppendError::Transport(error.to_string())
        }
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(AppendError::Rejected {
        status: status.as_u16(),
        body: body.chars().take(MAX_REJECTED_BODY_CHARS).collect(),
    })
}

#[cfg(test)]
mod tests {
    use slack2doc_core::config::DocumentKind;
    use slack2doc_core::ApplicationError;

    use super::{document_url, AppendError};

    #[test]
    fn document_urls_point_at_the_editor() {
        assert_eq!(
            document_url(DocumentKind::Sheets, "sheet-123"),
            "https://docs.google.com/spreadsheets/d/sheet-123/edit"
        );
        assert_eq!(
            document_url(DocumentKind::Docs, "doc-456"),
            "https://docs.google.com/document/d/doc-456/edit"
        );
    }

    #[test]
    fn api_url_escapes_each_segment() {
        let url = super::api_url("http://127.0.0.1:9/", &["v1", "documents", "a/b c:batchUpdate"])
            .expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:9/v1/documents/a%2Fb%20c:batchUpdate");

        assert!(matches!(
            super::api_url("not a url", &["v1"]),
            Err(AppendError::Transport(message)) if message.contains("invalid api url")
        ));
    }

    #[test]
    fn append_errors_become_append_failures() {
        let error: ApplicationError =
            AppendError::Rejected { status: 403, body: "forbidden".to_string() }.into();

        assert_eq!(error.kind(), "append_failure");
        assert!(error.to_string().contains("http 403"));
    }
}
