use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DATE_FORMAT, ENVELOPE_VERSION_LEGACY, ENVELOPE_VERSION_SEALED};

// Opaque identifier handed out by the auth provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Returns `None` for an empty (or all-whitespace) identifier.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(8).map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One chat bubble. Field names match the JSON written by the mobile client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    #[serde(rename = "isUser")]
    pub is_user: bool,
    /// ISO-8601 timestamp, kept verbatim so re-saving never rewrites history.
    pub timestamp: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: true,
            timestamp: now_iso8601(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: false,
            timestamp: now_iso8601(),
        }
    }
}

// Same shape as JavaScript's `Date.prototype.toISOString()`
fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// All exchanges for one user on one calendar day, in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Conversation(Vec<Message>);

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.0.push(message);
    }

    /// Returns a copy with `message` appended.
    pub fn with(&self, message: Message) -> Self {
        let mut next = self.clone();
        next.push(message);
        next
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn user_message_count(&self) -> usize {
        self.0.iter().filter(|m| m.is_user).count()
    }

    pub fn first_user_message(&self) -> Option<&Message> {
        self.0.iter().find(|m| m.is_user)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.0.iter()
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self(messages)
    }
}

impl FromIterator<Message> for Conversation {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Calendar day used as the second half of the `(user_id, date)` key.
/// Serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    /// Today in the device's local timezone.
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map(Self)
    }

    pub fn naive(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for CalendarDate {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CalendarDate {
    type Error = chrono::ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<CalendarDate> for String {
    fn from(d: CalendarDate) -> Self {
        d.to_string()
    }
}

impl From<NaiveDate> for CalendarDate {
    fn from(d: NaiveDate) -> Self {
        Self(d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnvelopeVersion {
    /// Plaintext payload behind an integrity hash, as the mobile client wrote it.
    Legacy,
    /// XChaCha20-Poly1305 sealed payload.
    #[default]
    Sealed,
}

impl EnvelopeVersion {
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Legacy => ENVELOPE_VERSION_LEGACY,
            Self::Sealed => ENVELOPE_VERSION_SEALED,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            ENVELOPE_VERSION_LEGACY => Some(Self::Legacy),
            ENVELOPE_VERSION_SEALED => Some(Self::Sealed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_rejects_blank() {
        assert!(UserId::new("").is_none());
        assert!(UserId::new("   ").is_none());
        assert_eq!(UserId::new("u1").unwrap().as_str(), "u1");
    }

    #[test]
    fn test_message_json_field_names() {
        let msg = Message {
            text: "Hi".into(),
            is_user: true,
            timestamp: "2024-05-01T09:30:00.000Z".into(),
        };
        let json = serde_json::to_string(&Conversation::from(vec![msg])).unwrap();
        assert_eq!(
            json,
            r#"[{"text":"Hi","isUser":true,"timestamp":"2024-05-01T09:30:00.000Z"}]"#
        );
    }

    #[test]
    fn test_message_timestamp_is_iso8601_millis() {
        let msg = Message::user("hello");
        assert!(msg.timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&msg.timestamp).is_ok());
        // 2024-05-01T09:30:00.000Z
        assert_eq!(msg.timestamp.len(), 24);
    }

    #[test]
    fn test_calendar_date_format_and_order() {
        let d1 = CalendarDate::parse("2024-05-01").unwrap();
        let d2 = CalendarDate::from_ymd(2024, 5, 2).unwrap();
        assert_eq!(d1.to_string(), "2024-05-01");
        assert!(d1 < d2);
        assert!(CalendarDate::parse("05/01/2024").is_err());

        let json = serde_json::to_string(&d2).unwrap();
        assert_eq!(json, r#""2024-05-02""#);
        let back: CalendarDate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d2);
    }

    #[test]
    fn test_conversation_helpers() {
        let conv: Conversation = vec![
            Message::assistant("greeting"),
            Message::user("first"),
            Message::user("second"),
        ]
        .into();
        assert_eq!(conv.user_message_count(), 2);
        assert_eq!(conv.first_user_message().unwrap().text, "first");

        let longer = conv.with(Message::assistant("reply"));
        assert_eq!(conv.len(), 3);
        assert_eq!(longer.len(), 4);
    }

    #[test]
    fn test_envelope_version_bytes() {
        assert_eq!(EnvelopeVersion::default(), EnvelopeVersion::Sealed);
        assert_eq!(EnvelopeVersion::from_byte(1), Some(EnvelopeVersion::Legacy));
        assert_eq!(EnvelopeVersion::from_byte(2), Some(EnvelopeVersion::Sealed));
        assert_eq!(EnvelopeVersion::from_byte(9), None);
    }
}
