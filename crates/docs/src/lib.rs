//! Document appenders for the archived Slack history.
//!
//! - `sheets` - one row per entry through the Google Sheets values API
//! - `google_docs` - one line per entry through the Google Docs batchUpdate API

use std::sync::Arc;

use slack2doc_core::config::{DocumentConfig, DocumentKind};

pub mod appender;
pub mod google_docs;
pub mod sheets;

#[cfg(test)]
mod test_support;

pub use appender::{document_url, AppendError, DocumentAppender};
pub use google_docs::GoogleDocsAppender;
pub use sheets::GoogleSheetsAppender;

/// Build the appender selected by `document.document_kind`.
pub fn build_appender(config: &DocumentConfig) -> Result<Arc<dyn DocumentAppender>, AppendError> {
    let appender: Arc<dyn DocumentAppender> = match config.kind {
        DocumentKind::Sheets => Arc::new(GoogleSheetsAppender::new(
            config.api_token.clone(),
            config.worksheet.clone(),
            config.append_timeout_secs,
        )?),
        DocumentKind::Docs => {
            Arc::new(GoogleDocsAppender::new(config.api_token.clone(), config.append_timeout_secs)?)
        }
    };
    Ok(appender)
}
