use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RelayError, RelayResult};

/// The only inbound `type` the relay acts on
pub const CHAT_TYPE: &str = "chat";

/// Sender used when a message carries no usable sender
pub const DEFAULT_SENDER: &str = "anonymous";

/// A chat message as it goes out to every client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub text: String,
    pub sender: String,
    /// ISO-8601 timestamp
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Chat(ChatMessage),
}

impl ServerMessage {
    pub fn to_json(&self) -> RelayResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A parsed inbound frame, before validation.
///
/// Kept as a raw JSON value: clients may send any shape, and the checks on
/// `type`, `text`, `sender` and `time` are deliberately loose.
#[derive(Debug, Clone)]
pub struct InboundEnvelope(Value);

impl InboundEnvelope {
    pub fn parse(text: &str) -> RelayResult<Self> {
        Ok(Self(serde_json::from_str(text)?))
    }

    /// The `type` discriminator, if it is present and truthy
    pub fn kind(&self) -> Option<&Value> {
        self.0.get("type").filter(|v| is_truthy(v))
    }

    /// Validate the envelope and build the outgoing chat message.
    /// `now` fills in a missing timestamp.
    pub fn into_chat(self, now: DateTime<Utc>) -> RelayResult<ChatMessage> {
        let kind = self
            .kind()
            .ok_or(RelayError::Validation("missing type"))?;

        if kind.as_str() != Some(CHAT_TYPE) {
            return Err(RelayError::Unsupported(kind.to_string()));
        }

        let text = self
            .0
            .get("text")
            .and_then(Value::as_str)
            .ok_or(RelayError::Validation("chat message without string text"))?
            .to_string();

        let sender = non_empty_str(self.0.get("sender"))
            .unwrap_or(DEFAULT_SENDER)
            .to_string();

        let time = non_empty_str(self.0.get("time"))
            .map(str::to_string)
            .unwrap_or_else(|| iso8601(now));

        Ok(ChatMessage { text, sender, time })
    }
}

/// Format a timestamp as `2024-01-01T00:00:00.000Z`
pub fn iso8601(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Clients treat null, false, 0 and "" as "not set"
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap()
    }

    fn chat(json: &str) -> RelayResult<ChatMessage> {
        InboundEnvelope::parse(json)?.into_chat(fixed_now())
    }

    #[test]
    fn test_full_chat_message_passes_through() {
        let msg = chat(r#"{"type":"chat","text":"hi","sender":"alice","time":"2024-01-01T00:00:00Z"}"#)
            .unwrap();
        assert_eq!(msg.text, "hi");
        assert_eq!(msg.sender, "alice");
        assert_eq!(msg.time, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_defaults_are_filled() {
        let msg = chat(r#"{"type":"chat","text":"hi"}"#).unwrap();
        assert_eq!(msg.sender, DEFAULT_SENDER);
        assert_eq!(msg.time, "2025-03-14T15:09:26.000Z");
    }

    #[test]
    fn test_non_string_or_empty_sender_becomes_anonymous() {
        for json in [
            r#"{"type":"chat","text":"hi","sender":42}"#,
            r#"{"type":"chat","text":"hi","sender":null}"#,
            r#"{"type":"chat","text":"hi","sender":""}"#,
            r#"{"type":"chat","text":"hi","sender":{"name":"bob"}}"#,
        ] {
            assert_eq!(chat(json).unwrap().sender, "anonymous", "{}", json);
        }
    }

    #[test]
    fn test_empty_text_is_still_a_string() {
        let msg = chat(r#"{"type":"chat","text":""}"#).unwrap();
        assert_eq!(msg.text, "");
    }

    #[test]
    fn test_missing_type_is_rejected() {
        assert!(matches!(
            chat(r#"{"text":"hi"}"#),
            Err(RelayError::Validation(_))
        ));
        assert!(matches!(
            chat(r#"{"type":"","text":"hi"}"#),
            Err(RelayError::Validation(_))
        ));
        assert!(matches!(
            chat(r#"{"type":null,"text":"hi"}"#),
            Err(RelayError::Validation(_))
        ));
    }

    #[test]
    fn test_other_types_are_unsupported() {
        assert!(matches!(
            chat(r#"{"type":"ping"}"#),
            Err(RelayError::Unsupported(_))
        ));
        assert!(matches!(
            chat(r#"{"type":7,"text":"hi"}"#),
            Err(RelayError::Unsupported(_))
        ));
    }

    #[test]
    fn test_chat_without_string_text_is_rejected() {
        for json in [
            r#"{"type":"chat"}"#,
            r#"{"type":"chat","text":5}"#,
            r#"{"type":"chat","text":null}"#,
        ] {
            assert!(
                matches!(chat(json), Err(RelayError::Validation(_))),
                "{}",
                json
            );
        }
    }

    #[test]
    fn test_non_object_json_is_rejected() {
        assert!(matches!(chat("42"), Err(RelayError::Validation(_))));
        assert!(matches!(chat(r#""chat""#), Err(RelayError::Validation(_))));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            InboundEnvelope::parse("not json"),
            Err(RelayError::Parse(_))
        ));
    }

    #[test]
    fn test_outbound_shape_has_four_fields() {
        let json = ServerMessage::Chat(ChatMessage {
            text: "hi".to_string(),
            sender: "alice".to_string(),
            time: "2024-01-01T00:00:00Z".to_string(),
        })
        .to_json()
        .unwrap();

        let value: Value = serde_json::from_str(&json).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(obj["type"], "chat");
        assert_eq!(obj["text"], "hi");
        assert_eq!(obj["sender"], "alice");
        assert_eq!(obj["time"], "2024-01-01T00:00:00Z");
    }
}
