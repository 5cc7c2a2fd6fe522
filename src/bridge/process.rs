use super::{Chat, ChatMessage, ChatProvider, ClientEvent, Contact, FetchQuery, MediaPayload};
use crate::backup::warn::{self, WarnEvent};
use crate::error::BackupError;
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::env;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_BRIDGE_BIN: &str = "chatkeep-bridge";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub type ProcessBridge = BridgeClient<BufReader<ChildStdout>, ChildStdin>;

#[derive(Debug, Clone)]
pub struct BridgeLaunch {
    pub session_dir: PathBuf,
    pub headless: bool,
}

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMedia {
    mimetype: String,
    data: String,
    #[serde(default)]
    filename: Option<String>,
}

enum Frame {
    Event(ClientEvent),
    Response(BridgeResponse),
}

/// JSON-lines client for the bridge process hosting the messaging session.
///
/// Requests and responses share the stream with unsolicited events; events
/// read while a request is in flight are queued for `next_event`.
pub struct BridgeClient<R, W> {
    reader: R,
    writer: Option<W>,
    child: Option<Child>,
    next_id: u64,
    pending: VecDeque<ClientEvent>,
}

fn ensure_executable_path(path: &Path) -> Result<()> {
    let meta = fs::metadata(path)
        .with_context(|| format!("bridge binary path does not exist: {}", path.display()))?;
    if !meta.is_file() {
        anyhow::bail!("bridge binary path is not a file: {}", path.display());
    }
    Ok(())
}

pub fn resolve_bridge_bin() -> Result<PathBuf> {
    if let Ok(custom) = env::var("CHATKEEP_BRIDGE_BIN") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            let path = PathBuf::from(trimmed);
            ensure_executable_path(&path)
                .map_err(|err| BackupError::MissingBridgeBinary(format!("{err:#}")))?;
            return Ok(path);
        }
    }

    which::which(DEFAULT_BRIDGE_BIN).map_err(|_| {
        BackupError::MissingBridgeBinary(format!(
            "set CHATKEEP_BRIDGE_BIN or put {DEFAULT_BRIDGE_BIN} on PATH"
        ))
        .into()
    })
}

pub fn spawn(launch: &BridgeLaunch) -> Result<ProcessBridge> {
    let bin = resolve_bridge_bin()?;
    fs::create_dir_all(&launch.session_dir)
        .with_context(|| format!("failed to create {}", launch.session_dir.display()))?;

    let mut child = Command::new(&bin)
        .arg("serve")
        .arg("--session-dir")
        .arg(&launch.session_dir)
        .arg("--headless")
        .arg(launch.headless.to_string())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("failed to start bridge `{}`", bin.display()))?;

    let stdin = child
        .stdin
        .take()
        .context("bridge stdin was not captured")?;
    let stdout = child
        .stdout
        .take()
        .context("bridge stdout was not captured")?;

    let mut client = BridgeClient::from_streams(BufReader::new(stdout), stdin);
    client.child = Some(child);
    Ok(client)
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|err| {
        BackupError::BridgeProtocol(format!("invalid `{method}` result: {err}")).into()
    })
}

fn warn_protocol(reason: &str, err: &str) {
    warn::emit(WarnEvent {
        code: "BRIDGE_FRAME_SKIPPED",
        stage: "bridge",
        action: "read-frame",
        chat: "",
        message: "",
        reason,
        err,
    });
}

impl<R: BufRead, W: Write> BridgeClient<R, W> {
    pub fn from_streams(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer: Some(writer),
            child: None,
            next_id: 0,
            pending: VecDeque::new(),
        }
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .context("failed to read from bridge")?;
            if read == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let value: Value = match serde_json::from_str(trimmed) {
                Ok(v) => v,
                Err(err) => {
                    warn_protocol("non-json-line", &err.to_string());
                    continue;
                }
            };

            if value.get("event").is_some() {
                match serde_json::from_value::<ClientEvent>(value) {
                    Ok(event) => return Ok(Some(Frame::Event(event))),
                    Err(err) => {
                        warn_protocol("unknown-event", &err.to_string());
                        continue;
                    }
                }
            }

            if value.get("id").is_some() {
                let response: BridgeResponse = serde_json::from_value(value).map_err(|err| {
                    BackupError::BridgeProtocol(format!("malformed response: {err}"))
                })?;
                return Ok(Some(Frame::Response(response)));
            }

            warn_protocol("unrecognized-frame", trimmed);
        }
    }

    fn call(&mut self, method: &str, params: Value) -> Result<Value> {
        self.next_id += 1;
        let id = self.next_id;
        let line = serde_json::to_string(&BridgeRequest { id, method, params })?;

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| BackupError::Disconnected("bridge input already closed".to_string()))?;
        writeln!(writer, "{line}")
            .and_then(|_| writer.flush())
            .with_context(|| format!("failed to send `{method}` to bridge"))?;

        loop {
            let Some(frame) = self.read_frame()? else {
                return Err(BackupError::Disconnected(format!(
                    "bridge closed its output while waiting for `{method}`"
                ))
                .into());
            };
            match frame {
                Frame::Event(event) => self.pending.push_back(event),
                Frame::Response(resp) if resp.id == id => {
                    if resp.ok {
                        return Ok(resp.result);
                    }
                    return Err(BackupError::BridgeRequest {
                        method: method.to_string(),
                        message: resp.error.unwrap_or_else(|| "no error detail".to_string()),
                    }
                    .into());
                }
                Frame::Response(resp) => {
                    warn_protocol("stale-response", &format!("id={}", resp.id));
                }
            }
        }
    }

    fn wait_for_child(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let started = Instant::now();
        loop {
            if child.try_wait()?.is_some() {
                return Ok(());
            }
            if started.elapsed() >= SHUTDOWN_TIMEOUT {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(());
            }
            thread::sleep(SHUTDOWN_POLL_INTERVAL);
        }
    }
}

impl<R: BufRead, W: Write> ChatProvider for BridgeClient<R, W> {
    fn chats(&mut self) -> Result<Vec<Chat>> {
        let value = self.call("chats", json!({}))?;
        decode("chats", value)
    }

    fn chat(&mut self, chat_id: &str) -> Result<Chat> {
        let value = self.call("chat", json!({ "chatId": chat_id }))?;
        decode("chat", value)
    }

    fn contact(&mut self, contact_id: &str) -> Result<Contact> {
        let value = self.call("contact", json!({ "contactId": contact_id }))?;
        decode("contact", value)
    }

    fn fetch_messages(&mut self, chat_id: &str, query: &FetchQuery) -> Result<Vec<ChatMessage>> {
        let value = self.call(
            "fetch_messages",
            json!({
                "chatId": chat_id,
                "limit": query.limit,
                "fromMeOnly": query.from_me_only,
            }),
        )?;
        decode("fetch_messages", value)
    }

    fn download_media(&mut self, message: &ChatMessage) -> Result<MediaPayload> {
        let value = self.call(
            "download_media",
            json!({ "messageId": message.id, "chatId": message.chat_id }),
        )?;
        let wire: WireMedia = decode("download_media", value)?;
        let data = STANDARD.decode(wire.data.trim()).map_err(|err| {
            BackupError::BridgeProtocol(format!("media for {} is not base64: {err}", message.id))
        })?;
        Ok(MediaPayload {
            mimetype: wire.mimetype,
            data,
            filename: wire.filename,
        })
    }

    fn next_event(&mut self) -> Result<Option<ClientEvent>> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }
        loop {
            match self.read_frame()? {
                None => return Ok(None),
                Some(Frame::Event(event)) => return Ok(Some(event)),
                Some(Frame::Response(resp)) => {
                    warn_protocol("unsolicited-response", &format!("id={}", resp.id));
                }
            }
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            self.next_id += 1;
            let line = serde_json::to_string(&BridgeRequest {
                id: self.next_id,
                method: "destroy",
                params: json!({}),
            })?;
            // The bridge may already be gone; closing stdin is the real signal.
            let _ = writeln!(writer, "{line}").and_then(|_| writer.flush());
        }
        self.wait_for_child()
    }
}

impl<R, W> Drop for BridgeClient<R, W> {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
