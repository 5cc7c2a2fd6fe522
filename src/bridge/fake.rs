use super::{Chat, ChatMessage, ChatProvider, ClientEvent, Contact, FetchQuery, MediaPayload};
use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// In-memory provider for tests.
#[derive(Debug, Default)]
pub struct FakeProvider {
    pub chats: Vec<Chat>,
    pub contacts: BTreeMap<String, Contact>,
    /// Stored newest-first, the order a real client returns.
    pub history: BTreeMap<String, Vec<ChatMessage>>,
    pub failing_fetches: BTreeSet<String>,
    pub media: BTreeMap<String, MediaPayload>,
    pub events: VecDeque<ClientEvent>,
    pub media_downloads: usize,
    pub fetch_queries: Vec<(String, FetchQuery)>,
    pub shut_down: bool,
}

impl FakeProvider {
    pub fn with_chat(mut self, chat: Chat) -> Self {
        self.chats.push(chat);
        self
    }

    pub fn with_history(mut self, chat_id: &str, newest_first: Vec<ChatMessage>) -> Self {
        self.history.insert(chat_id.to_string(), newest_first);
        self
    }

    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contacts.insert(contact.id.clone(), contact);
        self
    }

    pub fn with_media(mut self, message_id: &str, mimetype: &str, data: &[u8]) -> Self {
        self.media.insert(
            message_id.to_string(),
            MediaPayload {
                mimetype: mimetype.to_string(),
                data: data.to_vec(),
                filename: None,
            },
        );
        self
    }

    pub fn with_events(mut self, events: Vec<ClientEvent>) -> Self {
        self.events.extend(events);
        self
    }
}

impl ChatProvider for FakeProvider {
    fn chats(&mut self) -> Result<Vec<Chat>> {
        Ok(self.chats.clone())
    }

    fn chat(&mut self, chat_id: &str) -> Result<Chat> {
        self.chats
            .iter()
            .find(|c| c.id == chat_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown chat {chat_id}"))
    }

    fn contact(&mut self, contact_id: &str) -> Result<Contact> {
        self.contacts
            .get(contact_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown contact {contact_id}"))
    }

    fn fetch_messages(&mut self, chat_id: &str, query: &FetchQuery) -> Result<Vec<ChatMessage>> {
        self.fetch_queries.push((chat_id.to_string(), *query));
        if self.failing_fetches.contains(chat_id) {
            return Err(anyhow!("fetch failed for {chat_id}"));
        }
        let mut out = self.history.get(chat_id).cloned().unwrap_or_default();
        if query.from_me_only {
            out.retain(|m| m.from_me);
        }
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn download_media(&mut self, message: &ChatMessage) -> Result<MediaPayload> {
        self.media_downloads += 1;
        self.media
            .get(&message.id)
            .cloned()
            .ok_or_else(|| anyhow!("media for {} expired", message.id))
    }

    fn next_event(&mut self) -> Result<Option<ClientEvent>> {
        Ok(self.events.pop_front())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.shut_down = true;
        Ok(())
    }
}

pub fn direct_chat(id: &str, name: Option<&str>) -> Chat {
    Chat {
        id: id.to_string(),
        name: name.map(ToOwned::to_owned),
        is_group: false,
    }
}

pub fn group_chat(id: &str, subject: Option<&str>) -> Chat {
    Chat {
        id: id.to_string(),
        name: subject.map(ToOwned::to_owned),
        is_group: true,
    }
}

pub fn incoming(chat_id: &str, id: &str, timestamp: i64, body: &str) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        from: chat_id.to_string(),
        to: "10000@c.us".to_string(),
        author: None,
        body: body.to_string(),
        timestamp,
        has_media: false,
        from_me: false,
        is_view_once: false,
    }
}
