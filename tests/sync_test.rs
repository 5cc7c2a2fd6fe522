use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_fake_bridge(bin_path: &Path) {
    let script = r#"#!/usr/bin/env bash
set -uo pipefail

if [[ "${1:-}" != "serve" ]]; then
  exit 2
fi

echo '{"event":"qr","code":"2@fake-pairing"}'
echo '{"event":"ready"}'

while IFS= read -r line; do
  if [[ -n "${CHATKEEP_TEST_REQUEST_LOG:-}" ]]; then
    printf "%s\n" "$line" >> "${CHATKEEP_TEST_REQUEST_LOG}"
  fi
  [[ "$line" =~ \"id\":([0-9]+) ]] || continue
  id="${BASH_REMATCH[1]}"
  [[ "$line" =~ \"method\":\"([a-z_]+)\" ]] || continue
  method="${BASH_REMATCH[1]}"

  case "$method" in
    chats)
      echo "{\"id\":$id,\"ok\":true,\"result\":[{\"id\":\"111@c.us\",\"name\":\"Alice\",\"isGroup\":false},{\"id\":\"222-333@g.us\",\"name\":\"Climbing Crew\",\"isGroup\":true}]}"
      ;;
    contact)
      echo "{\"id\":$id,\"ok\":true,\"result\":{\"id\":\"111@c.us\",\"name\":\"Alice Smith\",\"pushname\":\"ali\"}}"
      ;;
    fetch_messages)
      if [[ "$line" == *"111@c.us"* ]]; then
        echo "{\"id\":$id,\"ok\":true,\"result\":[{\"id\":\"m3\",\"chatId\":\"111@c.us\",\"from\":\"10000@c.us\",\"to\":\"111@c.us\",\"body\":\"see you\",\"timestamp\":1700000200,\"fromMe\":true},{\"id\":\"m2\",\"chatId\":\"111@c.us\",\"from\":\"111@c.us\",\"to\":\"10000@c.us\",\"body\":\"\",\"timestamp\":1700000100,\"hasMedia\":true},{\"id\":\"m1\",\"chatId\":\"111@c.us\",\"from\":\"111@c.us\",\"to\":\"10000@c.us\",\"body\":\"hello\",\"timestamp\":1700000000}]}"
      else
        echo "{\"id\":$id,\"ok\":false,\"error\":\"history unavailable\"}"
      fi
      ;;
    download_media)
      echo '{"event":"error","message":"noise between frames"}'
      echo "{\"id\":$id,\"ok\":true,\"result\":{\"mimetype\":\"image/png\",\"data\":\"aGVsbG8=\"}}"
      ;;
    destroy)
      echo "{\"id\":$id,\"ok\":true,\"result\":null}"
      exit 0
      ;;
    *)
      echo "{\"id\":$id,\"ok\":false,\"error\":\"unsupported $method\"}"
      ;;
  esac
done
"#;
    fs::write(bin_path, script).expect("write fake bridge");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(bin_path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(bin_path, perms).expect("chmod");
    }
}

fn chatkeep(tmp: &Path, backup_dir: &Path, bridge: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("chatkeep");
    cmd.current_dir(tmp)
        .env("CHATKEEP_HOME", tmp)
        .env("CHATKEEP_CONFIG_PATH", tmp.join("missing-config.toml"))
        .env("BACKUP_DIR", backup_dir)
        .env("CHATKEEP_BRIDGE_BIN", bridge)
        .env("SYNC_PAUSE_MS", "0")
        .env_remove("SAVE_GROUPS")
        .env_remove("SAVE_MESSAGES")
        .env_remove("SAVE_MEDIA")
        .env_remove("SYNC_LIMIT")
        .env_remove("SYNC_FROM_ME_ONLY");
    cmd
}

#[test]
fn sync_archives_history_oldest_first_with_media() {
    let tmp = tempdir().expect("tempdir");
    let backup_dir = tmp.path().join("backup");
    let bridge = tmp.path().join("chatkeep-bridge");
    let request_log = tmp.path().join("requests.log");
    write_fake_bridge(&bridge);

    chatkeep(tmp.path(), &backup_dir, &bridge)
        .env("CHATKEEP_TEST_REQUEST_LOG", &request_log)
        .arg("sync")
        .assert()
        .failure()
        .stdout(predicates::str::contains("sync.appended=3"))
        .stdout(predicates::str::contains("history unavailable"));

    let log = backup_dir.join("chats/Alice Smith/messages.json");
    let raw = fs::read_to_string(&log).expect("read chat log");
    let records: serde_json::Value = serde_json::from_str(&raw).expect("parse chat log");
    let ids: Vec<&str> = records
        .as_array()
        .expect("array")
        .iter()
        .map(|r| r["id"].as_str().expect("id"))
        .collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
    assert_eq!(records[0]["timestamp"], "2023-11-14T22:13:20.000Z");
    assert_eq!(records[2]["isSentByMe"], true);
    assert!(raw.ends_with('\n'));

    let media = backup_dir.join("media/2023-11-14/Alice Smith/m2.png");
    assert_eq!(fs::read(&media).expect("read media"), b"hello");

    let requests = fs::read_to_string(&request_log).expect("read request log");
    assert!(requests.contains("\"limit\":50"));
    assert!(requests.contains("\"method\":\"destroy\""));

    let state = fs::read_to_string(backup_dir.join("state/backup_state.json"))
        .expect("read state");
    assert!(state.contains("111@c.us"));
    assert!(backup_dir.join("logs/audit.log").exists());
}

#[test]
fn second_sync_does_not_duplicate_messages_or_media() {
    let tmp = tempdir().expect("tempdir");
    let backup_dir = tmp.path().join("backup");
    let bridge = tmp.path().join("chatkeep-bridge");
    write_fake_bridge(&bridge);

    for _ in 0..2 {
        chatkeep(tmp.path(), &backup_dir, &bridge)
            .arg("sync")
            .assert()
            .failure();
    }

    let raw = fs::read_to_string(backup_dir.join("chats/Alice Smith/messages.json"))
        .expect("read chat log");
    let records: serde_json::Value = serde_json::from_str(&raw).expect("parse chat log");
    assert_eq!(records.as_array().expect("array").len(), 3);

    let media_dir = backup_dir.join("media/2023-11-14/Alice Smith");
    let count = fs::read_dir(&media_dir).expect("read media dir").count();
    assert_eq!(count, 1);
}

#[test]
fn sync_with_groups_disabled_skips_group_history() {
    let tmp = tempdir().expect("tempdir");
    let backup_dir = tmp.path().join("backup");
    let bridge = tmp.path().join("chatkeep-bridge");
    write_fake_bridge(&bridge);

    chatkeep(tmp.path(), &backup_dir, &bridge)
        .env("SAVE_GROUPS", "false")
        .arg("--json")
        .arg("sync")
        .assert()
        .success()
        .stdout(predicates::str::contains("\"ok\": true"))
        .stdout(predicates::str::contains("sync.chats_skipped_groups=1"));

    assert!(!backup_dir.join("chats/Climbing Crew").exists());
    assert!(backup_dir.join("chats/Alice Smith/messages.json").exists());
}

#[test]
fn sync_fails_cleanly_without_bridge_binary() {
    let tmp = tempdir().expect("tempdir");
    let backup_dir = tmp.path().join("backup");

    chatkeep(tmp.path(), &backup_dir, &tmp.path().join("no-such-bridge"))
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicates::str::contains("bridge binary"));
}
