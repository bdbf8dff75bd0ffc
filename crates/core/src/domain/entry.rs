use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A Slack `ts` value: seconds since the epoch with an optional
/// microsecond fraction (`"1700000000.000100"`). Slack also uses it as the
/// message id within a channel, so the original text is preserved.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SlackTimestamp {
    raw: String,
    seconds: i64,
    micros: u32,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid slack timestamp `{0}`")]
pub struct TimestampError(pub String);

impl SlackTimestamp {
    pub fn parse(raw: &str) -> Result<Self, TimestampError> {
        let trimmed = raw.trim();
        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };

        let digits_only = |value: &str| value.bytes().all(|byte| byte.is_ascii_digit());
        if whole.is_empty() || !digits_only(whole) || !digits_only(fraction) || fraction.len() > 6
        {
            return Err(TimestampError(raw.to_string()));
        }

        let seconds = whole.parse::<i64>().map_err(|_| TimestampError(raw.to_string()))?;
        let micros = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{fraction:0<6}");
            padded.parse::<u32>().map_err(|_| TimestampError(raw.to_string()))?
        };

        Ok(Self { raw: trimmed.to_string(), seconds, micros })
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Self { raw: seconds.to_string(), seconds, micros: 0 }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn micros(&self) -> u32 {
        self.micros
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.micros * 1_000)
    }

    /// RFC 3339 rendering used in appended rows; falls back to the raw value
    /// when the timestamp is outside chrono's range.
    pub fn to_rfc3339(&self) -> String {
        self.to_datetime()
            .map(|datetime| datetime.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            .unwrap_or_else(|| self.raw.clone())
    }
}

impl fmt::Display for SlackTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for SlackTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl<'de> Deserialize<'de> for SlackTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Text(raw) => Self::parse(&raw).map_err(serde::de::Error::custom),
            RawTimestamp::Integer(seconds) if seconds >= 0 => Ok(Self::from_seconds(seconds)),
            RawTimestamp::Integer(seconds) => {
                Err(serde::de::Error::custom(TimestampError(seconds.to_string())))
            }
            RawTimestamp::Float(value) => {
                Self::parse(&format!("{value:.6}")).map_err(serde::de::Error::custom)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Posted,
    Reply,
    Edited,
    Deleted,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posted => "posted",
            Self::Reply => "reply",
            Self::Edited => "edited",
            Self::Deleted => "deleted",
        }
    }
}

/// The normalized record appended to the target document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    /// When the recorded action happened (post, edit, or deletion time).
    pub timestamp: SlackTimestamp,
    pub channel: String,
    pub author: String,
    pub text: String,
    pub kind: EntryKind,
    /// Slack id of the message the entry refers to.
    pub message_ts: SlackTimestamp,
}

#[cfg(test)]
mod tests {
    use super::{EntryKind, SlackTimestamp};

    #[test]
    fn parses_slack_ts_with_fraction() {
        let ts = SlackTimestamp::parse("1700000000.000100").expect("valid ts");
        assert_eq!(ts.seconds(), 1_700_000_000);
        assert_eq!(ts.micros(), 100);
        assert_eq!(ts.as_str(), "1700000000.000100");
    }

    #[test]
    fn short_fraction_is_right_padded() {
        let ts = SlackTimestamp::parse("1700000000.5").expect("valid ts");
        assert_eq!(ts.micros(), 500_000);
    }

    #[test]
    fn rejects_non_numeric_values() {
        for raw in ["", "abc", ".5", "-1", "17e8", "1700000000.0000001"] {
            assert!(SlackTimestamp::parse(raw).is_err(), "`{raw}` should be rejected");
        }
    }

    #[test]
    fn trailing_dot_means_whole_seconds() {
        let ts = SlackTimestamp::parse("1700000000.").expect("valid ts");
        assert_eq!(ts.micros(), 0);
    }

    #[test]
    fn deserializes_from_string_and_number() {
        let from_text: SlackTimestamp =
            serde_json::from_str("\"1700000000.000200\"").expect("string ts");
        let from_integer: SlackTimestamp = serde_json::from_str("1700000000").expect("integer ts");

        assert_eq!(from_text.seconds(), 1_700_000_000);
        assert_eq!(from_integer.seconds(), 1_700_000_000);
        assert_eq!(from_integer.as_str(), "1700000000");
    }

    #[test]
    fn renders_rfc3339_in_utc() {
        let ts = SlackTimestamp::from_seconds(1_700_000_000);
        assert_eq!(ts.to_rfc3339(), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn entry_kind_labels_are_stable() {
        assert_eq!(EntryKind::Posted.as_str(), "posted");
        assert_eq!(EntryKind::Deleted.as_str(), "deleted");
        assert_eq!(
            serde_json::to_string(&EntryKind::Edited).expect("serialize"),
            "\"edited\""
        );
    }
}
