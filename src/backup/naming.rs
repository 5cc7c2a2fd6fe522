//! Folder names for archived conversations.
//!
//! A name is derived from the friendliest label available and sanitized so it
//! is safe as a single path component. Resolution never fails; it only
//! degrades towards the raw chat id.

use crate::backup::warn::{self, WarnEvent};
use crate::bridge::{Chat, ChatMessage, ChatProvider, Contact};

const UNKNOWN_FOLDER: &str = "unknown";

/// Replace every character outside `[A-Za-z0-9_- ]` with `_`, then trim.
pub fn sanitize_folder_name(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | ' ') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    replaced.trim().to_string()
}

/// User part of an address such as `4915112345@c.us`.
pub fn numeric_id(address: &str) -> Option<&str> {
    let user = address.split('@').next().unwrap_or_default().trim();
    if user.is_empty() { None } else { Some(user) }
}

fn counterpart_address(message: &ChatMessage) -> &str {
    if message.from_me {
        &message.to
    } else {
        &message.from
    }
}

pub fn resolve_folder_name(
    chat: &Chat,
    contact: Option<&Contact>,
    message: Option<&ChatMessage>,
) -> String {
    let mut candidates: Vec<&str> = Vec::new();

    if chat.is_group {
        candidates.extend(chat.name.as_deref());
    } else {
        if let Some(contact) = contact {
            candidates.extend(contact.name.as_deref());
            candidates.extend(contact.pushname.as_deref());
            candidates.extend(contact.number.as_deref());
        }
        candidates.extend(message.map(counterpart_address).and_then(numeric_id));
        candidates.extend(numeric_id(&chat.id));
    }
    candidates.push(&chat.id);

    candidates
        .into_iter()
        .map(sanitize_folder_name)
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_FOLDER.to_string())
}

/// Resolve the folder for `chat`, looking up the contact for direct chats.
pub fn folder_for_chat(
    provider: &mut dyn ChatProvider,
    chat: &Chat,
    message: Option<&ChatMessage>,
) -> String {
    if chat.is_group {
        return resolve_folder_name(chat, None, message);
    }

    let contact = match provider.contact(&chat.id) {
        Ok(contact) => Some(contact),
        Err(err) => {
            warn::emit(WarnEvent {
                code: "CONTACT_LOOKUP_FAILED",
                stage: "naming",
                action: "lookup-contact",
                chat: &chat.id,
                message: message.map(|m| m.id.as_str()).unwrap_or_default(),
                reason: "falling-back-to-number",
                err: &format!("{err:#}"),
            });
            None
        }
    };
    resolve_folder_name(chat, contact.as_ref(), message)
}
