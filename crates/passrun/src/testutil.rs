//! Shared fixtures for unit tests: a fake `pass`, a file-backed clipboard and
//! a notifier that records instead of showing anything.

use passrun_core::config::{DecryptConfig, ENTRY_PLACEHOLDER};
use passrun_notify::{Notification, Notifier, NotifyFuture};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::delivery::ClipboardWriter;

const FAKE_PASS: &str = r#"#!/bin/sh
# fake-pass show <entry>
case "$2" in
    work/github)
        printf 'hunter2\nuser: alice\n' ;;
    Work/VPN)
        printf ' s3cr3t with spaces \n' ;;
    email)
        printf 'm@il-P4ss' ;;
    long/notes)
        printf 'hunter2\n'
        head -c 10000 /dev/zero | tr '\000' n ;;
    cancel/me)
        echo "gpg: public key decryption failed: Operation cancelled" >&2
        exit 2 ;;
    locked/out)
        echo "gpg: decryption failed: No secret key" >&2
        exit 2 ;;
    slow/prompt)
        sleep 5 ;;
    *)
        echo "Error: $2 is not in the password store." >&2
        exit 1 ;;
esac
"#;

/// Write the fake decryption script into `dir`
pub fn fake_pass(dir: &Path) -> PathBuf {
    let script = dir.join("fake-pass.sh");
    fs::write(&script, FAKE_PASS).unwrap();
    script
}

/// Decrypt config that runs the fake script through `sh`
pub fn decrypt_config(script: &Path, timeout_secs: u64) -> DecryptConfig {
    DecryptConfig {
        command: "sh".to_string(),
        args: vec![
            script.display().to_string(),
            "show".to_string(),
            ENTRY_PLACEHOLDER.to_string(),
        ],
        timeout_secs,
        first_line_only: true,
    }
}

/// Create `<name>.gpg` files under `root`
pub fn populate_store(root: &Path, names: &[&str]) {
    for name in names {
        let path = root.join(format!("{}.gpg", name));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"-----BEGIN PGP MESSAGE-----").unwrap();
    }
}

fn sh(script: String) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script]
}

/// A clipboard backed by a plain file
pub struct FileClipboard {
    pub path: PathBuf,
}

impl FileClipboard {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join("clipboard"),
        }
    }

    pub fn writer(&self, clear_after: Option<std::time::Duration>) -> ClipboardWriter {
        let file = self.path.display().to_string();
        ClipboardWriter::from_commands(
            sh(format!("cat > '{}'", file)),
            Some(sh(format!("cat '{}'", file))),
            Some(sh(format!(": > '{}'", file))),
            clear_after,
        )
    }

    /// Clipboard content, `None` if nothing was ever copied
    pub fn contents(&self) -> Option<Vec<u8>> {
        fs::read(&self.path).ok()
    }
}

/// Notifier that keeps every notification for inspection
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(&'a self, notification: &'a Notification) -> NotifyFuture<'a> {
        self.sent.lock().unwrap().push(notification.clone());
        Box::pin(std::future::ready(Ok::<(), anyhow::Error>(())))
    }
}

/// Notifier whose sends never complete, like notify-send against a wedged daemon
pub struct HangingNotifier;

impl Notifier for HangingNotifier {
    fn notify<'a>(&'a self, _notification: &'a Notification) -> NotifyFuture<'a> {
        Box::pin(std::future::pending::<anyhow::Result<()>>())
    }
}
