//! Display session detection

use serde::Serialize;
use std::fmt;

/// Windowing system of the running session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayServer {
    X11,
    Wayland,
    Unknown,
}

impl DisplayServer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X11 => "x11",
            Self::Wayland => "wayland",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DisplayServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session facts, read once at startup and never changed afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    display_server: DisplayServer,
    /// `XDG_SESSION_TYPE` as reported, for diagnostics only
    session_type: Option<String>,
}

impl SessionContext {
    pub fn new(display_server: DisplayServer) -> Self {
        Self {
            display_server,
            session_type: None,
        }
    }

    /// Detect from the process environment
    pub fn detect() -> Self {
        Self::from_env(|key| std::env::var(key).ok())
    }

    /// Detect from an arbitrary environment lookup.
    ///
    /// A reachable Wayland socket wins over `DISPLAY`, since XWayland sets
    /// both and keystrokes must go through the compositor.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let is_set = |key: &str| lookup(key).map(|v| !v.is_empty()).unwrap_or(false);

        let display_server = if is_set("WAYLAND_DISPLAY") {
            DisplayServer::Wayland
        } else if is_set("DISPLAY") {
            DisplayServer::X11
        } else {
            DisplayServer::Unknown
        };

        Self {
            display_server,
            session_type: lookup("XDG_SESSION_TYPE").map(|t| t.to_lowercase()),
        }
    }

    pub fn display_server(&self) -> DisplayServer {
        self.display_server
    }

    pub fn session_type(&self) -> Option<&str> {
        self.session_type.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn detect(vars: &[(&str, &str)]) -> SessionContext {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SessionContext::from_env(|key| env.get(key).cloned())
    }

    #[test]
    fn test_wayland_wins_over_xwayland() {
        let session = detect(&[
            ("WAYLAND_DISPLAY", "wayland-0"),
            ("DISPLAY", ":0"),
            ("XDG_SESSION_TYPE", "Wayland"),
        ]);
        assert_eq!(session.display_server(), DisplayServer::Wayland);
        assert_eq!(session.session_type(), Some("wayland"));
    }

    #[test]
    fn test_x11() {
        let session = detect(&[("DISPLAY", ":1")]);
        assert_eq!(session.display_server(), DisplayServer::X11);
        assert_eq!(session.session_type(), None);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(detect(&[]).display_server(), DisplayServer::Unknown);
        assert_eq!(
            detect(&[("WAYLAND_DISPLAY", ""), ("XDG_SESSION_TYPE", "tty")]).display_server(),
            DisplayServer::Unknown
        );
    }
}
