//! Match service - the query / actions / run pipeline
//!
//! `Match` ranks store entries against a query. `Actions` lists what can be
//! done with one match. `Run` decrypts the entry and hands the secret to the
//! chosen backend, then tells the user how it went. No call carries state
//! into the next one apart from the cached store listing, and no failure
//! takes the service down.

use passrun_core::Config;
use passrun_notify::{Backend, Notification, Notifier, Urgency};
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::delivery::{Backends, DeliveryBackend};
use crate::error::{RunError, StoreAccessError};
use crate::matcher;
use crate::resolver::SecretResolver;
use crate::session::SessionContext;
use crate::store::{Entry, Snapshot, StoreIndex};

/// Prefix that marks a match id as ours
pub const MATCH_ID_PREFIX: &str = "pass:";

pub const CATEGORY: &str = "Passwords";
pub const MATCH_ICON: &str = "dialog-password";
pub const MATCH_SUBTEXT: &str = "Press Enter to copy, Ctrl+Enter to type";

const ERROR_ICON: &str = "dialog-error";
const ERROR_EXPIRE_MS: u32 = 5000;

/// What to do with a matched entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Copy,
    Type,
}

impl Action {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Type => "type",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Copy => "Copy Password",
            Self::Type => "Type Password",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Copy => "edit-copy",
            Self::Type => "input-keyboard",
        }
    }

    fn success(&self, entry: &Entry) -> Notification {
        match self {
            Self::Copy => Notification::new(format!("Password for '{}' copied to clipboard", entry))
                .with_icon(self.icon())
                .with_expire_ms(3000),
            Self::Type => Notification::new(format!("Password for '{}' typed", entry))
                .with_icon(self.icon())
                .with_expire_ms(2000),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Action {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "copy" => Ok(Self::Copy),
            "type" => Ok(Self::Type),
            other => Err(RunError::UnknownAction(other.to_string())),
        }
    }
}

/// An action offered for a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionInfo {
    pub action_id: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
}

impl From<Action> for ActionInfo {
    fn from(action: Action) -> Self {
        Self {
            action_id: action.id(),
            label: action.label(),
            icon: action.icon(),
        }
    }
}

/// One row of a `Match` result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchItem {
    pub match_id: String,
    pub entry: Entry,
    pub text: String,
    pub subtext: &'static str,
    pub icon: &'static str,
    pub category: &'static str,
    pub score: i64,
    pub relevance: f64,
    pub highlights: Vec<Range<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Idle,
    Matching,
    AwaitingAction,
}

/// Stable handle for an entry
pub fn match_id(entry: &Entry) -> String {
    format!("{}{}", MATCH_ID_PREFIX, entry)
}

pub struct MatchService {
    config: Config,
    session: SessionContext,
    index: StoreIndex,
    resolver: SecretResolver,
    backends: Backends,
    notifier: Option<Box<dyn Notifier>>,
    state: Mutex<ServiceState>,
}

impl MatchService {
    pub fn new(
        config: Config,
        session: SessionContext,
        backends: Backends,
        notifier: Option<Box<dyn Notifier>>,
    ) -> Self {
        Self {
            index: StoreIndex::new(&config.store_dir),
            resolver: SecretResolver::new(config.decrypt.clone()),
            config,
            session,
            backends,
            notifier,
            state: Mutex::new(ServiceState::Idle),
        }
    }

    /// Detect the session, probe backends and pick a notifier
    pub async fn from_config(config: Config) -> Self {
        let session = SessionContext::detect();
        info!(
            "Display server: {} (XDG_SESSION_TYPE={})",
            session.display_server(),
            session.session_type().unwrap_or("unset")
        );

        let backends = Backends::select(&session, &config).await;
        let notifier: Option<Box<dyn Notifier>> = if config.notify.enabled {
            let backend = Backend::detect();
            debug!("Notifications via {}", backend.name());
            Some(Box::new(backend))
        } else {
            None
        };

        Self::new(config, session, backends, notifier)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ServiceState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Every entry in the store, sorted
    pub fn list_entries(&self) -> Result<Snapshot, StoreAccessError> {
        self.index.list()
    }

    /// Rescan the store. Returns the new entry count.
    pub fn refresh(&self) -> Result<usize, StoreAccessError> {
        let snapshot = self.index.refresh()?;
        info!("Store refreshed: {} entries", snapshot.len());
        Ok(snapshot.len())
    }

    /// Rank entries against `query`.
    ///
    /// An empty (or blank) query lists everything. A store that cannot be
    /// read yields no matches rather than an error.
    pub fn match_query(&self, query: &str) -> Vec<MatchItem> {
        self.set_state(ServiceState::Matching);
        let query = query.trim();

        let entries = match self.index.list() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("{}", e);
                self.set_state(ServiceState::Idle);
                return Vec::new();
            }
        };

        let limit = if query.is_empty() {
            self.config.max_results_list_all
        } else {
            self.config.max_results
        };

        let items: Vec<MatchItem> = matcher::rank(query, &entries)
            .into_iter()
            .take(limit)
            .map(|m| MatchItem {
                match_id: match_id(&m.entry),
                text: format!("🔑 {}", m.entry),
                subtext: MATCH_SUBTEXT,
                icon: MATCH_ICON,
                category: CATEGORY,
                relevance: matcher::relevance(query, m.score),
                score: m.score,
                highlights: m.highlights,
                entry: m.entry,
            })
            .collect();

        debug!("Query '{}' matched {} entries", query, items.len());
        self.set_state(if items.is_empty() {
            ServiceState::Idle
        } else {
            ServiceState::AwaitingAction
        });
        items
    }

    /// Actions available for a match. Empty if the match is unknown.
    pub fn actions(&self, match_id: &str) -> Vec<ActionInfo> {
        if self.lookup(match_id).is_err() {
            return Vec::new();
        }

        let mut actions = vec![ActionInfo::from(Action::Copy)];
        if self.backends.typing.is_available() {
            actions.push(ActionInfo::from(Action::Type));
        }
        actions
    }

    /// Decrypt the matched entry and deliver it.
    ///
    /// Always ends in `Idle`, and the user is notified either way.
    pub async fn run(&self, match_id: &str, action: Action) -> Result<(), RunError> {
        let result = self.execute(match_id, action).await;

        match &result {
            Ok(entry) => {
                info!("{} succeeded for '{}'", action, entry);
                self.notify(action.success(entry)).await;
            }
            Err(e) => {
                warn!("{} failed for {}: {}", action, match_id, e);
                self.notify(
                    Notification::new(failure_message(action, match_id, e))
                        .with_icon(ERROR_ICON)
                        .with_urgency(Urgency::Critical)
                        .with_expire_ms(ERROR_EXPIRE_MS),
                )
                .await;
            }
        }

        self.set_state(ServiceState::Idle);
        result.map(|_| ())
    }

    /// Wait for background clipboard clearing, if any
    pub async fn wait_pending(&self) {
        self.backends.copy.settle().await;
    }

    async fn execute(&self, match_id: &str, action: Action) -> Result<Entry, RunError> {
        let entry = self.lookup(match_id)?;

        let backend = self.backend_for(action);
        if let Some(reason) = backend.unavailable_reason() {
            return Err(RunError::BackendUnavailable(reason.to_string()));
        }

        let secret = self.resolver.resolve(&entry).await?;
        backend.deliver(&secret).await?;
        Ok(entry)
    }

    fn backend_for(&self, action: Action) -> &DeliveryBackend {
        match action {
            Action::Copy => &self.backends.copy,
            Action::Type => &self.backends.typing,
        }
    }

    /// Resolve a match id back to an entry in the current listing
    fn lookup(&self, match_id: &str) -> Result<Entry, RunError> {
        let unknown = || RunError::UnknownMatch(match_id.to_string());

        let name = match_id.strip_prefix(MATCH_ID_PREFIX).ok_or_else(unknown)?;
        let entry = Entry::from(name);
        match self.index.contains(&entry) {
            Ok(true) => Ok(entry),
            Ok(false) => Err(unknown()),
            Err(e) => {
                debug!("Cannot check {}: {}", match_id, e);
                Err(unknown())
            }
        }
    }

    async fn notify(&self, notification: Notification) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let notification = notification.with_title(self.config.notify.title.as_str());
        let limit = self.config.notify.timeout();
        match tokio::time::timeout(limit, notifier.notify(&notification)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to send notification: {}", e),
            Err(_) => warn!("Notification not delivered within {}ms", limit.as_millis()),
        }
    }
}

fn failure_message(action: Action, match_id: &str, err: &RunError) -> String {
    let target = match_id.strip_prefix(MATCH_ID_PREFIX).unwrap_or(match_id);
    format!("Failed to {} password for '{}': {}", action, target, err)
}
