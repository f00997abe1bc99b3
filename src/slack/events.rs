use serde_json::Value;
use std::fmt;

/// Returns the challenge to echo back if this is a Slack URL verification handshake.
/// A missing challenge echoes as `null`.
pub fn url_verification_challenge(body: &Value) -> Option<Value> {
    match body.get("type").and_then(Value::as_str) {
        Some("url_verification") => Some(body.get("challenge").cloned().unwrap_or(Value::Null)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    UrlVerification,
    Message,
    Other(String),
}
impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        match value {
            "url_verification" => EventType::UrlVerification,
            "message" => EventType::Message,
            other => EventType::Other(other.to_string()),
        }
    }
}

/// Loosely-typed view of the `event` object inside an Events API callback.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub event_type: Option<EventType>,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
    pub text: String,
    pub channel: Option<String>,
    pub ts: Option<String>,
}
impl InboundEvent {
    pub fn from_value(event: &Value) -> Self {
        Self {
            event_type: event.get("type").and_then(Value::as_str).map(EventType::from),
            bot_id: present(event.get("bot_id")),
            subtype: present(event.get("subtype")),
            text: event
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            channel: event
                .get("channel")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|channel| !channel.is_empty())
                .map(str::to_string),
            ts: present(event.get("ts")),
        }
    }

    /// Applies the reply filter. Bot authors (including ourselves), edits, joins and other
    /// subtyped messages never reach the pipeline.
    pub fn accept(self) -> Result<MessageEvent, DropReason> {
        if let Some(bot_id) = self.bot_id {
            return Err(DropReason::FromBot(bot_id));
        }
        match self.event_type {
            Some(EventType::Message) => {}
            other => return Err(DropReason::NotMessage(other)),
        }
        if let Some(subtype) = self.subtype {
            return Err(DropReason::HasSubtype(subtype));
        }

        let text = self.text.trim();
        if text.is_empty() {
            return Err(DropReason::EmptyText);
        }
        let channel = self.channel.ok_or(DropReason::MissingChannel)?;

        Ok(MessageEvent {
            channel,
            text: text.to_string(),
            ts: self.ts,
        })
    }
}

/// A plain user message that warrants a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel: String,

    /// Already trimmed and non-empty.
    pub text: String,

    /// Thread token the reply nests under.
    pub ts: Option<String>,
}
impl MessageEvent {
    pub fn from_envelope(body: &Value) -> Result<Self, DropReason> {
        match body.get("event") {
            Some(event) if event.is_object() => InboundEvent::from_value(event).accept(),
            _ => Err(DropReason::MissingEvent),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    MissingEvent,
    FromBot(String),
    NotMessage(Option<EventType>),
    HasSubtype(String),
    EmptyText,
    MissingChannel,
}
impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingEvent => write!(f, "no event object"),
            DropReason::FromBot(bot_id) => write!(f, "posted by bot {bot_id}"),
            DropReason::NotMessage(Some(event_type)) => {
                write!(f, "not a message event ({event_type:?})")
            }
            DropReason::NotMessage(None) => write!(f, "event has no type"),
            DropReason::HasSubtype(subtype) => write!(f, "message subtype {subtype}"),
            DropReason::EmptyText => write!(f, "empty message text"),
            DropReason::MissingChannel => write!(f, "no channel to reply to"),
        }
    }
}

/// Truthy field value as a string: `null`, `false` and blank strings count as absent.
fn present(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(event: Value) -> Value {
        json!({ "type": "event_callback", "event": event })
    }

    #[test]
    fn test_url_verification_echoes_challenge() {
        let body = json!({ "type": "url_verification", "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P", "token": "ignored" });
        assert_eq!(
            url_verification_challenge(&body),
            Some(json!("3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"))
        );

        // Echoed verbatim, whatever its JSON type.
        let body = json!({ "type": "url_verification", "challenge": { "nested": [1, 2] } });
        assert_eq!(
            url_verification_challenge(&body),
            Some(json!({ "nested": [1, 2] }))
        );

        let body = json!({ "type": "url_verification" });
        assert_eq!(url_verification_challenge(&body), Some(Value::Null));
    }

    #[test]
    fn test_non_verification_bodies() {
        assert_eq!(url_verification_challenge(&json!({ "type": "event_callback" })), None);
        assert_eq!(url_verification_challenge(&json!({ "challenge": "abc" })), None);
        assert_eq!(url_verification_challenge(&json!("url_verification")), None);
        assert_eq!(url_verification_challenge(&Value::Null), None);
    }

    #[test]
    fn test_accepts_plain_message() {
        let body = envelope(json!({
            "type": "message",
            "text": "  Can I ignore a subpoena?  ",
            "channel": "C123",
            "ts": "1712345678.000100"
        }));

        assert_eq!(
            MessageEvent::from_envelope(&body),
            Ok(MessageEvent {
                channel: "C123".to_string(),
                text: "Can I ignore a subpoena?".to_string(),
                ts: Some("1712345678.000100".to_string()),
            })
        );
    }

    #[test]
    fn test_missing_ts_still_accepted() {
        let body = envelope(json!({ "type": "message", "text": "hi", "channel": "C1" }));
        let event = MessageEvent::from_envelope(&body).unwrap();
        assert_eq!(event.ts, None);
    }

    #[test]
    fn test_drop_reasons() {
        let cases = [
            (json!({}), DropReason::MissingEvent),
            (json!({ "event": null }), DropReason::MissingEvent),
            (json!({ "event": "message" }), DropReason::MissingEvent),
            (
                envelope(json!({ "type": "message", "bot_id": "B01", "text": "hi", "channel": "C1" })),
                DropReason::FromBot("B01".to_string()),
            ),
            (
                envelope(json!({ "type": "message", "bot_id": 42, "text": "hi", "channel": "C1" })),
                DropReason::FromBot("42".to_string()),
            ),
            (
                envelope(json!({ "type": "app_mention", "text": "hi", "channel": "C1" })),
                DropReason::NotMessage(Some(EventType::Other("app_mention".to_string()))),
            ),
            (
                envelope(json!({ "type": "url_verification", "text": "hi", "channel": "C1" })),
                DropReason::NotMessage(Some(EventType::UrlVerification)),
            ),
            (
                envelope(json!({ "text": "hi", "channel": "C1" })),
                DropReason::NotMessage(None),
            ),
            (
                envelope(json!({ "type": "message", "subtype": "message_changed", "text": "hi", "channel": "C1" })),
                DropReason::HasSubtype("message_changed".to_string()),
            ),
            (
                envelope(json!({ "type": "message", "subtype": "channel_join", "text": "joined", "channel": "C1" })),
                DropReason::HasSubtype("channel_join".to_string()),
            ),
            (
                envelope(json!({ "type": "message", "text": " \n\t ", "channel": "C1" })),
                DropReason::EmptyText,
            ),
            (
                envelope(json!({ "type": "message", "text": 12, "channel": "C1" })),
                DropReason::EmptyText,
            ),
            (
                envelope(json!({ "type": "message", "channel": "C1" })),
                DropReason::EmptyText,
            ),
            (
                envelope(json!({ "type": "message", "text": "hi" })),
                DropReason::MissingChannel,
            ),
        ];

        for (body, expected) in cases {
            assert_eq!(
                MessageEvent::from_envelope(&body),
                Err(expected.clone()),
                "Unexpected result for {body}"
            );
        }
    }

    #[test]
    fn test_absent_like_fields_do_not_drop() {
        let body = envelope(json!({
            "type": "message",
            "bot_id": null,
            "subtype": "",
            "text": "hello",
            "channel": "C1",
            "ts": "1.1"
        }));
        assert!(MessageEvent::from_envelope(&body).is_ok());
    }

    #[test]
    fn test_bot_check_precedes_type_check() {
        let body = envelope(json!({ "type": "reaction_added", "bot_id": "B1" }));
        assert_eq!(
            MessageEvent::from_envelope(&body),
            Err(DropReason::FromBot("B1".to_string()))
        );
    }
}
