use crate::bridge::ChatMessage;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One archived message as stored in a conversation's `messages.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageRecord {
    pub id: String,
    pub from: String,
    pub to: String,
    pub author: Option<String>,
    pub body: String,
    /// ISO-8601, UTC, millisecond precision.
    pub timestamp: String,
    pub has_media: bool,
    pub is_sent_by_me: bool,
    pub is_view_once: bool,
}

pub fn iso_timestamp(epoch_secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(epoch_secs, 0)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<&ChatMessage> for MessageRecord {
    fn from(message: &ChatMessage) -> Self {
        Self {
            id: message.id.clone(),
            from: message.from.clone(),
            to: message.to.clone(),
            author: message.author.clone(),
            body: message.body.clone(),
            timestamp: iso_timestamp(message.timestamp),
            has_media: message.has_media,
            is_sent_by_me: message.from_me,
            is_view_once: message.is_view_once,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::fake::incoming;

    #[test]
    fn record_serializes_with_camel_case_keys_and_iso_time() {
        let mut message = incoming("1@c.us", "ABC", 1_704_067_200, "happy new year");
        message.has_media = true;
        let record = MessageRecord::from(&message);
        assert_eq!(record.timestamp, "2024-01-01T00:00:00.000Z");

        let json = serde_json::to_value(&record).expect("json");
        assert_eq!(json["isSentByMe"], false);
        assert_eq!(json["hasMedia"], true);
        assert_eq!(json["isViewOnce"], false);
        assert!(json["author"].is_null());
    }
}
