pub mod process;

#[cfg(test)]
pub mod fake;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A conversation known to the messaging client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    /// Contact display name for direct chats, subject line for groups.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pushname: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
}

/// A message as delivered by the client, live or from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: String,
    /// Unix seconds.
    pub timestamp: i64,
    #[serde(default)]
    pub has_media: bool,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub is_view_once: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub mimetype: String,
    pub data: Vec<u8>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchQuery {
    /// `None` fetches everything the client still holds.
    pub limit: Option<usize>,
    pub from_me_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    Qr { code: String },
    Ready,
    Message { message: ChatMessage },
    Error { message: String },
    Disconnected { reason: String },
}

/// The messaging client seen from the archiver.
pub trait ChatProvider {
    fn chats(&mut self) -> Result<Vec<Chat>>;
    fn chat(&mut self, chat_id: &str) -> Result<Chat>;
    fn contact(&mut self, contact_id: &str) -> Result<Contact>;

    /// History for one chat, newest message first.
    fn fetch_messages(&mut self, chat_id: &str, query: &FetchQuery) -> Result<Vec<ChatMessage>>;

    fn download_media(&mut self, message: &ChatMessage) -> Result<MediaPayload>;

    /// Blocks until the next client event. `None` once the event stream is closed.
    fn next_event(&mut self) -> Result<Option<ClientEvent>>;

    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn is_group_chat_id(chat_id: &str) -> bool {
    chat_id.ends_with("@g.us")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_parses_tagged_json() {
        let ready: ClientEvent = serde_json::from_str(r#"{"event":"ready"}"#).expect("ready");
        assert_eq!(ready, ClientEvent::Ready);

        let raw = r#"{"event":"message","message":{"id":"m1","chatId":"1@c.us","from":"1@c.us","to":"2@c.us","body":"hi","timestamp":1700000000,"hasMedia":true}}"#;
        let ClientEvent::Message { message } = serde_json::from_str(raw).expect("message") else {
            panic!("expected message event");
        };
        assert_eq!(message.id, "m1");
        assert!(message.has_media);
        assert!(!message.from_me);
        assert_eq!(message.author, None);
    }

    #[test]
    fn group_ids_are_detected_by_suffix() {
        assert!(is_group_chat_id("12036302@g.us"));
        assert!(!is_group_chat_id("4915112345@c.us"));
    }
}
