use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Value};
use slack2doc_core::DocumentEntry;
use tracing::{debug, warn};

use crate::appender::{api_url, send_json, AppendError, DocumentAppender};

const SHEETS_API_BASE_URL: &str = "https://sheets.googleapis.com";

/// Column titles written when the worksheet has to be created.
pub const HEADER_ROW: [&str; 6] =
    ["Timestamp", "Channel", "Author", "Message", "Kind", "MessageTimestamp"];

/// Appends one row per entry to a worksheet via `spreadsheets.values.append`.
///
/// A worksheet that does not exist yet is created with a header row before
/// the entry is written.
#[derive(Clone)]
pub struct GoogleSheetsAppender {
    client: Client,
    api_token: SecretString,
    worksheet: String,
    timeout_secs: u64,
    base_url: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ValueRange {
    pub values: Vec<Vec<String>>,
}

impl GoogleSheetsAppender {
    pub fn new(
        api_token: SecretString,
        worksheet: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, AppendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|error| AppendError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            api_token,
            worksheet: worksheet.into(),
            timeout_secs,
            base_url: SHEETS_API_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn post_values(&self, url: &Url, values: &ValueRange) -> Result<(), AppendError> {
        let request = self.client.post(url.clone()).bearer_auth(self.api_token.expose_secret());
        send_json(request, values, self.timeout_secs).await
    }

    async fn add_worksheet(&self, doc_id: &str) -> Result<(), AppendError> {
        let target = format!("{doc_id}:batchUpdate");
        let url = api_url(&self.base_url, &["v4", "spreadsheets", target.as_str()])?;
        let request = self.client.post(url).bearer_auth(self.api_token.expose_secret());
        send_json(request, &add_sheet_body(&self.worksheet), self.timeout_secs).await
    }
}

#[async_trait]
impl DocumentAppender for GoogleSheetsAppender {
    async fn append(&self, doc_id: &str, entry: &DocumentEntry) -> Result<(), AppendError> {
        let url = append_url(&self.base_url, doc_id, &self.worksheet)?;
        debug!(
            event_name = "docs.sheets.append",
            channel = %entry.channel,
            message_ts = %entry.message_ts,
            "appending row to worksheet"
        );

        let row = row_values(entry);
        match self.post_values(&url, &row).await {
            Err(error) if is_missing_worksheet(&error) => {
                warn!(
                    event_name = "docs.sheets.worksheet_created",
                    worksheet = %self.worksheet,
                    "worksheet does not exist; creating it with a header row"
                );
                self.add_worksheet(doc_id).await?;
                self.post_values(&url, &header_values()).await?;
                self.post_values(&url, &row).await
            }
            outcome => outcome,
        }
    }
}

pub fn append_url(base_url: &str, doc_id: &str, worksheet: &str) -> Result<Url, AppendError> {
    let range = format!("{}!A1:append", quote_sheet_name(worksheet));
    let mut url = api_url(base_url, &["v4", "spreadsheets", doc_id, "values", range.as_str()])?;
    url.query_pairs_mut()
        .append_pair("valueInputOption", "RAW")
        .append_pair("insertDataOption", "INSERT_ROWS");
    Ok(url)
}

/// A1-notation sheet name: single-quoted, with embedded quotes doubled.
pub fn quote_sheet_name(worksheet: &str) -> String {
    format!("'{}'", worksheet.replace('\'', "''"))
}

/// Row layout: timestamp, channel, author, text, kind, message ts.
pub fn row_values(entry: &DocumentEntry) -> ValueRange {
    ValueRange {
        values: vec![vec![
            entry.timestamp.to_rfc3339(),
            entry.channel.clone(),
            entry.author.clone(),
            entry.text.clone(),
            entry.kind.as_str().to_string(),
            entry.message_ts.as_str().to_string(),
        ]],
    }
}

fn header_values() -> ValueRange {
    ValueRange { values: vec![HEADER_ROW.iter().map(|title| title.to_string()).collect()] }
}

fn add_sheet_body(worksheet: &str) -> Value {
    json!({
        "requests": [{
            "addSheet": {
                "properties": {
                    "title": worksheet,
                    "gridProperties": { "columnCount": HEADER_ROW.len() }
                }
            }
        }]
    })
}

// The values API answers 400 "Unable to parse range" for an unknown sheet name.
fn is_missing_worksheet(error: &AppendError) -> bool {
    matches!(
        error,
        AppendError::Rejected { status: 400, body } if body.contains("Unable to parse range")
    )
}
