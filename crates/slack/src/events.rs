use serde::Deserialize;
use serde_json::Value;
use slack2doc_core::{ApplicationError, DocumentEntry, EntryKind, SlackTimestamp};
use thiserror::Error;

/// Message subtypes that still carry a human-authored message.
const USER_MESSAGE_SUBTYPES: [&str; 3] = ["thread_broadcast", "file_share", "me_message"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    /// Endpoint handshake; the challenge must be echoed back.
    UrlVerification { challenge: String },
    Message(MessageEvent),
    Ignored { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub event_id: Option<String>,
    pub channel_id: String,
    pub user_id: Option<String>,
    pub text: String,
    pub kind: EntryKind,
    /// When the action happened: post time, edit time, or deletion time.
    pub timestamp: SlackTimestamp,
    pub message_ts: SlackTimestamp,
}

impl MessageEvent {
    pub fn into_entry(self, author: String) -> DocumentEntry {
        DocumentEntry {
            timestamp: self.timestamp,
            channel: self.channel_id,
            author,
            text: self.text,
            kind: self.kind,
            message_ts: self.message_ts,
        }
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("body is not valid event JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("form-encoded body has no `payload` field")]
    MissingFormPayload,
    #[error("message event is missing `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Envelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        #[serde(default)]
        event_id: Option<String>,
        event: Value,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: Option<SlackTimestamp>,
    #[serde(default)]
    thread_ts: Option<SlackTimestamp>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    message: Option<Box<RawMessage>>,
    #[serde(default)]
    previous_message: Option<Box<RawMessage>>,
    #[serde(default)]
    deleted_ts: Option<SlackTimestamp>,
    #[serde(default)]
    edited: Option<RawEdit>,
}

#[derive(Debug, Deserialize)]
struct RawEdit {
    #[serde(default)]
    ts: Option<SlackTimestamp>,
}

/// Parse an Events API request body. Form-encoded bodies must carry the
/// JSON envelope in a `payload` field.
pub fn parse_event(content_type: Option<&str>, body: &[u8]) -> Result<SlackEvent, EnvelopeError> {
    let is_form = content_type
        .map(|value| value.to_ascii_lowercase().starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    let envelope: Envelope = if is_form {
        let payload = form_urlencoded::parse(body)
            .find(|(key, _)| key == "payload")
            .map(|(_, value)| value.into_owned())
            .ok_or(EnvelopeError::MissingFormPayload)?;
        serde_json::from_str(&payload)?
    } else {
        serde_json::from_slice(body)?
    };

    match envelope {
        Envelope::UrlVerification { challenge } => Ok(SlackEvent::UrlVerification { challenge }),
        Envelope::EventCallback { event_id, event } => classify_callback(event_id, event),
        Envelope::Unsupported => {
            Ok(SlackEvent::Ignored { reason: "unsupported envelope type".to_string() })
        }
    }
}

fn classify_callback(event_id: Option<String>, event: Value) -> Result<SlackEvent, EnvelopeError> {
    let event_type = event.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
    if event_type != "message" {
        return Ok(SlackEvent::Ignored { reason: format!("event type `{event_type}`") });
    }

    let raw: RawMessage = serde_json::from_value(event)?;
    classify_message(event_id, raw)
}

fn classify_message(event_id: Option<String>, raw: RawMessage) -> Result<SlackEvent, EnvelopeError> {
    let subtype = raw.subtype.clone();
    match subtype.as_deref() {
        None => user_message(event_id, raw),
        Some(subtype) if USER_MESSAGE_SUBTYPES.contains(&subtype) => user_message(event_id, raw),
        Some("message_changed") => changed_message(event_id, raw),
        Some("message_deleted") => deleted_message(event_id, raw),
        Some(other) => Ok(SlackEvent::Ignored { reason: format!("message subtype `{other}`") }),
    }
}

fn user_message(event_id: Option<String>, raw: RawMessage) -> Result<SlackEvent, EnvelopeError> {
    let channel_id = raw.channel.ok_or(EnvelopeError::MissingField("channel"))?;
    let ts = raw.ts.ok_or(EnvelopeError::MissingField("ts"))?;
    let is_reply = raw.thread_ts.as_ref().is_some_and(|thread_ts| !same_instant(thread_ts, &ts));

    Ok(SlackEvent::Message(MessageEvent {
        event_id,
        channel_id,
        user_id: raw.user,
        text: raw.text.unwrap_or_default(),
        kind: if is_reply { EntryKind::Reply } else { EntryKind::Posted },
        timestamp: ts.clone(),
        message_ts: ts,
    }))
}

fn changed_message(event_id: Option<String>, raw: RawMessage) -> Result<SlackEvent, EnvelopeError> {
    let channel_id = raw.channel.ok_or(EnvelopeError::MissingField("channel"))?;
    let message = *raw.message.ok_or(EnvelopeError::MissingField("message"))?;
    let message_ts = message.ts.clone().ok_or(EnvelopeError::MissingField("message.ts"))?;

    // Link unfurls also arrive as `message_changed`, without an `edited` marker
    // and with the text untouched.
    let previous_text = raw.previous_message.as_ref().and_then(|previous| previous.text.as_deref());
    if message.edited.is_none() && previous_text == message.text.as_deref() {
        return Ok(SlackEvent::Ignored { reason: "message changed without edit".to_string() });
    }

    let timestamp = message
        .edited
        .as_ref()
        .and_then(|edit| edit.ts.clone())
        .or(raw.ts)
        .unwrap_or_else(|| message_ts.clone());

    Ok(SlackEvent::Message(MessageEvent {
        event_id,
        channel_id,
        user_id: message.user,
        text: message.text.unwrap_or_default(),
        kind: EntryKind::Edited,
        timestamp,
        message_ts,
    }))
}

fn deleted_message(event_id: Option<String>, raw: RawMessage) -> Result<SlackEvent, EnvelopeError> {
    let channel_id = raw.channel.ok_or(EnvelopeError::MissingField("channel"))?;
    let previous = raw.previous_message.map(|previous| *previous).unwrap_or_default();
    let message_ts = raw
        .deleted_ts
        .or_else(|| previous.ts.clone())
        .ok_or(EnvelopeError::MissingField("deleted_ts"))?;
    let timestamp = raw.ts.unwrap_or_else(|| message_ts.clone());

    Ok(SlackEvent::Message(MessageEvent {
        event_id,
        channel_id,
        user_id: previous.user,
        text: previous.text.unwrap_or_default(),
        kind: EntryKind::Deleted,
        timestamp,
        message_ts,
    }))
}

fn same_instant(left: &SlackTimestamp, right: &SlackTimestamp) -> bool {
    left.seconds() == right.seconds() && left.micros() == right.micros()
}

impl From<EnvelopeError> for ApplicationError {
    fn from(error: EnvelopeError) -> Self {
        ApplicationError::MalformedPayload(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use slack2doc_core::EntryKind;

    use super::{parse_event, EnvelopeError, SlackEvent};

    fn parse_json(body: &str) -> Result<SlackEvent, EnvelopeError> {
        parse_event(Some("application/json"), body.as_bytes())
    }

    fn expect_message(body: &str) -> super::MessageEvent {
        match parse_json(body).expect("parse") {
            SlackEvent::Message(message) => message,
            other => panic!("expected message event, got {other:?}"),
        }
    }

    #[test]
    fn url_verification_carries_challenge() {
        let event = parse_json(r#"{"type":"url_verification","token":"t","challenge":"3eZbrw1a"}"#)
            .expect("parse");

        assert_eq!(event, SlackEvent::UrlVerification { challenge: "3eZbrw1a".to_string() });
    }

    #[test]
    fn plain_message_becomes_posted_event() {
        let message = expect_message(
            r#"{"type":"event_callback","event_id":"Ev1","event":{"type":"message","channel":"general","user":"alice","text":"hello","ts":1700000000}}"#,
        );

        assert_eq!(message.event_id.as_deref(), Some("Ev1"));
        assert_eq!(message.channel_id, "general");
        assert_eq!(message.user_id.as_deref(), Some("alice"));
        assert_eq!(message.text, "hello");
        assert_eq!(message.kind, EntryKind::Posted);
        assert_eq!(message.timestamp.seconds(), 1_700_000_000);
    }

    #[test]
    fn threaded_message_is_a_reply() {
        let message = expect_message(
            r#"{"type":"event_callback","event":{"type":"message","channel":"C1","user":"U1","text":"re","ts":"1700000100.000200","thread_ts":"1700000000.000100"}}"#,
        );

        assert_eq!(message.kind, EntryKind::Reply);
    }

    #[test]
    fn thread_parent_is_not_a_reply() {
        let message = expect_message(
            r#"{"type":"event_callback","event":{"type":"message","channel":"C1","user":"U1","text":"root","ts":"1700000000.000100","thread_ts":"1700000000.000100"}}"#,
        );

        assert_eq!(message.kind, EntryKind::Posted);
    }

    #[test]
    fn edited_message_uses_inner_message_fields() {
        let message = expect_message(
            r#"{"type":"event_callback","event":{"type":"message","subtype":"message_changed","channel":"C1","ts":"1700000300.000000",
                "message":{"user":"U1","text":"fixed","ts":"1700000000.000100","edited":{"user":"U1","ts":"1700000250.000000"}},
                "previous_message":{"user":"U1","text":"fxied","ts":"1700000000.000100"}}}"#,
        );

        assert_eq!(message.kind, EntryKind::Edited);
        assert_eq!(message.text, "fixed");
        assert_eq!(message.user_id.as_deref(), Some("U1"));
        assert_eq!(message.timestamp.seconds(), 1_700_000_250);
        assert_eq!(message.message_ts.as_str(), "1700000000.000100");
    }

    #[test]
    fn unfurl_change_is_ignored() {
        let event = parse_json(
            r#"{"type":"event_callback","event":{"type":"message","subtype":"message_changed","channel":"C1",
                "message":{"user":"U1","text":"see https://example.com","ts":"1700000000.000100"},
                "previous_message":{"user":"U1","text":"see https://example.com","ts":"1700000000.000100"}}}"#,
        )
        .expect("parse");

        assert!(matches!(event, SlackEvent::Ignored { .. }));
    }

    #[test]
    fn deleted_message_uses_previous_message_fields() {
        let message = expect_message(
            r#"{"type":"event_callback","event":{"type":"message","subtype":"message_deleted","channel":"C1","ts":"1700000400.000000",
                "deleted_ts":"1700000000.000100","previous_message":{"user":"U1","text":"oops","ts":"1700000000.000100"}}}"#,
        );

        assert_eq!(message.kind, EntryKind::Deleted);
        assert_eq!(message.text, "oops");
        assert_eq!(message.timestamp.seconds(), 1_700_000_400);
        assert_eq!(message.message_ts.as_str(), "1700000000.000100");
    }

    #[test]
    fn bot_and_system_subtypes_are_ignored() {
        for subtype in ["bot_message", "channel_join", "channel_topic"] {
            let body = format!(
                r#"{{"type":"event_callback","event":{{"type":"message","subtype":"{subtype}","channel":"C1","ts":"1700000000.000100"}}}}"#
            );
            assert!(matches!(parse_json(&body).expect("parse"), SlackEvent::Ignored { .. }));
        }
    }

    #[test]
    fn non_message_events_are_ignored() {
        let event = parse_json(
            r#"{"type":"event_callback","event":{"type":"reaction_added","user":"U1","reaction":"thumbsup"}}"#,
        )
        .expect("parse");

        assert_eq!(event, SlackEvent::Ignored { reason: "event type `reaction_added`".to_string() });
    }

    #[test]
    fn unknown_envelope_types_are_ignored() {
        let event = parse_json(r#"{"type":"app_rate_limited","minute_rate_limited":1}"#).expect("parse");
        assert!(matches!(event, SlackEvent::Ignored { .. }));
    }

    #[test]
    fn malformed_bodies_are_errors() {
        assert!(matches!(parse_json("not json"), Err(EnvelopeError::Json(_))));
        assert!(matches!(parse_json(r#"{"no_type":true}"#), Err(EnvelopeError::Json(_))));
        assert!(matches!(
            parse_json(r#"{"type":"event_callback","event":{"type":"message","user":"U1","ts":"1"}}"#),
            Err(EnvelopeError::MissingField("channel"))
        ));
        assert!(matches!(
            parse_json(r#"{"type":"event_callback","event":{"type":"message","channel":"C1","ts":"yesterday"}}"#),
            Err(EnvelopeError::Json(_))
        ));
    }

    #[test]
    fn form_encoded_payload_is_unwrapped() {
        let body = "payload=%7B%22type%22%3A%22url_verification%22%2C%22challenge%22%3A%22abc%22%7D";
        let event =
            parse_event(Some("application/x-www-form-urlencoded"), body.as_bytes()).expect("parse");

        assert_eq!(event, SlackEvent::UrlVerification { challenge: "abc".to_string() });
        assert!(matches!(
            parse_event(Some("application/x-www-form-urlencoded"), b"token=x"),
            Err(EnvelopeError::MissingFormPayload)
        ));
    }

    #[test]
    fn entry_keeps_event_fields() {
        let message = expect_message(
            r#"{"type":"event_callback","event":{"type":"message","channel":"general","user":"alice","text":"hello","ts":1700000000}}"#,
        );
        let entry = message.into_entry("Alice".to_string());

        assert_eq!(entry.channel, "general");
        assert_eq!(entry.author, "Alice");
        assert_eq!(entry.text, "hello");
        assert_eq!(entry.timestamp.seconds(), 1_700_000_000);
    }
}
