use crate::backup::log::read_log;
use crate::backup::naming::numeric_id;
use crate::backup::paths::BackupPaths;
use crate::backup::record::MessageRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::io::{BufRead, Write};

/// Archived conversation folders, sorted by name.
pub fn list_chats(paths: &BackupPaths) -> Result<Vec<String>> {
    if !paths.chats_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    let entries = fs::read_dir(&paths.chats_dir)
        .with_context(|| format!("failed to read {}", paths.chats_dir.display()))?;
    for entry in entries {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            out.push(name.to_string());
        }
    }
    out.sort();
    Ok(out)
}

/// `None` when the folder has no log file yet.
pub fn load_chat(paths: &BackupPaths, folder: &str) -> Option<Vec<MessageRecord>> {
    let log_path = paths.chat_log_path(folder);
    if !log_path.is_file() {
        return None;
    }
    Some(read_log(&log_path))
}

fn display_time(timestamp: &str) -> String {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(ts) => ts
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => timestamp.to_string(),
    }
}

fn sender_label(record: &MessageRecord) -> String {
    if record.is_sent_by_me {
        return "Me".to_string();
    }
    let address = record
        .author
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or(record.from.as_str());
    numeric_id(address).unwrap_or("unknown").to_string()
}

pub fn render_record(record: &MessageRecord) -> String {
    let mut line = format!(
        "[{}] {}: {}",
        display_time(&record.timestamp),
        sender_label(record),
        record.body
    );
    if record.has_media {
        line.push_str(if record.is_view_once {
            " [view-once media]"
        } else {
            " [media]"
        });
    } else if record.body.is_empty() {
        line.push_str("(empty)");
    }
    line
}

fn parse_selection(raw: &str, count: usize) -> Option<usize> {
    let index = raw.trim().parse::<usize>().ok()?;
    if index == 0 || index > count {
        return None;
    }
    Some(index - 1)
}

/// Numbered menu over `input`/`output`. Invalid input ends the session quietly.
pub fn run_viewer<R: BufRead, W: Write>(
    paths: &BackupPaths,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    let chats = list_chats(paths)?;
    if chats.is_empty() {
        writeln!(output, "No chats found.")?;
        return Ok(());
    }

    writeln!(output, "Archived chats:")?;
    for (i, name) in chats.iter().enumerate() {
        writeln!(output, "  {}. {}", i + 1, name)?;
    }
    write!(output, "Select a chat number: ")?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer).is_err() {
        answer.clear();
    }
    writeln!(output)?;

    let Some(index) = parse_selection(&answer, chats.len()) else {
        writeln!(output, "Invalid selection.")?;
        return Ok(());
    };
    let folder = &chats[index];

    let records = match load_chat(paths, folder) {
        Some(records) if !records.is_empty() => records,
        _ => {
            writeln!(output, "No messages.")?;
            return Ok(());
        }
    };

    writeln!(output, "=== {folder} ===")?;
    for record in &records {
        writeln!(output, "{}", render_record(record))?;
    }
    writeln!(output, "Total: {} messages", records.len())?;
    Ok(())
}
