//! Secret resolver - turns an entry into its decrypted value
//!
//! Decryption is delegated to an external command (`pass show <entry>` by
//! default), which talks to gpg-agent and may pop up a pinentry prompt. The
//! call is bounded by a timeout and never retried: a second attempt would
//! mean a second prompt, which is the user's call.

use passrun_core::config::DecryptConfig;
use passrun_core::process::{self, ProcessError, SensitiveOutput};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{DecryptReason, DecryptionError};
use crate::secret::Secret;
use crate::store::Entry;

pub struct SecretResolver {
    config: DecryptConfig,
}

impl SecretResolver {
    pub fn new(config: DecryptConfig) -> Self {
        Self { config }
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Decrypt one entry
    pub async fn resolve(&self, entry: &Entry) -> Result<Secret, DecryptionError> {
        let fail = |reason| DecryptionError::new(entry.as_str(), reason);
        let args = self.config.args_for(entry.as_str());

        debug!("Decrypting '{}' with {}", entry, self.config.command);
        let SensitiveOutput {
            status,
            stdout,
            stderr,
        } = process::run_sensitive(&self.config.command, &args, self.timeout())
            .await
            .map_err(|e| fail(self.classify_process_error(e)))?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            warn!(
                "Decryption of '{}' failed ({}): {}",
                entry,
                status,
                stderr.trim()
            );
            return Err(fail(classify_failure(&stderr, &status.to_string())));
        }

        Secret::from_output(&stdout, self.config.first_line_only).map_err(fail)
    }

    fn classify_process_error(&self, err: ProcessError) -> DecryptReason {
        match err {
            ProcessError::TimedOut { timeout, .. } => DecryptReason::TimedOut {
                after: Some(timeout),
            },
            e if e.is_not_found() => {
                DecryptReason::CommandUnavailable(format!("{} is not installed", self.config.command))
            }
            e => DecryptReason::Failed(e.to_string()),
        }
    }
}

/// Map the decryption command's complaint onto a reason
fn classify_failure(stderr: &str, status: &str) -> DecryptReason {
    let lower = stderr.to_lowercase();

    if lower.contains("cancel") {
        DecryptReason::Cancelled
    } else if lower.contains("not in the password store") {
        DecryptReason::NotFound
    } else if lower.contains("timeout") || lower.contains("timed out") {
        DecryptReason::TimedOut { after: None }
    } else if lower.contains("no secret key")
        || lower.contains("bad passphrase")
        || lower.contains("decryption failed")
    {
        DecryptReason::WrongKey
    } else {
        let detail = stderr
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or(status);
        DecryptReason::Failed(detail.to_string())
    }
}
