//! Decrypted secret values
//!
//! A `Secret` lives for one `Run` only. Its buffer is wiped on drop and it has
//! no `Display`; `Debug` is redacted so it cannot leak through logging.

use std::fmt;
use zeroize::Zeroizing;

use crate::error::DecryptReason;

pub struct Secret(Zeroizing<String>);

impl Secret {
    pub fn new(value: String) -> Self {
        Self(Zeroizing::new(value))
    }

    /// Build a secret from raw decryption output.
    ///
    /// With `first_line_only` the value is the first line (the `pass`
    /// convention); otherwise the whole output minus one trailing newline.
    pub(crate) fn from_output(output: &[u8], first_line_only: bool) -> Result<Self, DecryptReason> {
        let text = std::str::from_utf8(output).map_err(|_| DecryptReason::InvalidOutput)?;

        let value = if first_line_only {
            let line = text.split('\n').next().unwrap_or_default();
            line.strip_suffix('\r').unwrap_or(line)
        } else {
            text.strip_suffix('\n').unwrap_or(text)
        };

        if value.is_empty() {
            return Err(DecryptReason::Empty);
        }
        Ok(Self::new(value.to_owned()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}
