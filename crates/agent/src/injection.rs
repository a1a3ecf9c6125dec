//! Knowledge injection policy.
//!
//! Decides per turn whether the knowledge document must be (re)fetched.
//! The per-session counters live behind [`SessionStore`] so the policy can
//! be shared across threads and swapped out in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use turnstile_config::InjectionConfig;
use turnstile_core::knowledge::KnowledgeSource;

/// Per-session injection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionTracker {
    /// Number of turns run for the session
    pub turn_count: u64,

    /// `turn_count` at the last successful fetch
    pub last_injection_turn: u64,
}

impl SessionTracker {
    /// Turns since the document was last fetched.
    pub fn gap(&self) -> u64 {
        self.turn_count.saturating_sub(self.last_injection_turn)
    }
}

/// Storage for session trackers, keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The tracker for `session_id`, or a zeroed one for unknown sessions.
    async fn get(&self, session_id: &str) -> SessionTracker;

    async fn put(&self, session_id: &str, tracker: SessionTracker);

    /// Increment the turn counter and return the updated tracker.
    async fn advance(&self, session_id: &str) -> SessionTracker {
        let mut tracker = self.get(session_id).await;
        tracker.turn_count += 1;
        self.put(session_id, tracker).await;
        tracker
    }

    /// Mark `turn` as the last fetch, leaving the turn counter untouched.
    async fn record_injection(&self, session_id: &str, turn: u64) {
        let mut tracker = self.get(session_id).await;
        tracker.last_injection_turn = turn;
        self.put(session_id, tracker).await;
    }
}

/// Process-local session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    trackers: Mutex<HashMap<String, SessionTracker>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> SessionTracker {
        self.trackers
            .lock()
            .await
            .get(session_id)
            .copied()
            .unwrap_or_default()
    }

    async fn put(&self, session_id: &str, tracker: SessionTracker) {
        self.trackers
            .lock()
            .await
            .insert(session_id.to_string(), tracker);
    }

    // Read-modify-write under one lock acquisition.
    async fn advance(&self, session_id: &str) -> SessionTracker {
        let mut trackers = self.trackers.lock().await;
        let tracker = trackers.entry(session_id.to_string()).or_default();
        tracker.turn_count += 1;
        *tracker
    }

    async fn record_injection(&self, session_id: &str, turn: u64) {
        let mut trackers = self.trackers.lock().await;
        let tracker = trackers.entry(session_id.to_string()).or_default();
        tracker.last_injection_turn = tracker.last_injection_turn.max(turn);
    }
}

/// Thresholds and trigger keywords of the policy.
#[derive(Debug, Clone)]
pub struct InjectionSettings {
    pub cooldown_turns: u64,
    pub max_staleness_turns: u64,
    /// Lower-cased trigger keywords
    pub trigger_keywords: Vec<String>,
}

impl Default for InjectionSettings {
    fn default() -> Self {
        Self::from(&InjectionConfig::default())
    }
}

impl From<&InjectionConfig> for InjectionSettings {
    fn from(config: &InjectionConfig) -> Self {
        Self {
            cooldown_turns: config.cooldown_turns,
            max_staleness_turns: config.max_staleness_turns,
            trigger_keywords: config
                .trigger_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

/// Outcome of one injection decision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InjectionDecision {
    /// The document to use this turn (fresh or previously cached)
    pub document: Option<String>,

    pub should_fetch: bool,

    /// The session turn this decision was made for (1-based)
    pub current_turn: u64,

    /// A fresh non-empty document was fetched
    pub refreshed: bool,

    /// Error text of a failed fetch
    pub fetch_error: Option<String>,
}

impl InjectionDecision {
    /// Whether the document is surfaced as a system annotation this turn.
    pub fn surfaces_document(&self) -> bool {
        self.document.is_some() && (self.should_fetch || self.current_turn == 1)
    }

    /// Whether the document is also appended to the last user message.
    pub fn appends_to_user(&self) -> bool {
        self.document.is_some() && self.current_turn == 1
    }
}

pub struct SessionInjectionPolicy {
    sessions: Arc<dyn SessionStore>,
    source: Arc<dyn KnowledgeSource>,
    settings: InjectionSettings,
}

impl SessionInjectionPolicy {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        source: Arc<dyn KnowledgeSource>,
        settings: InjectionSettings,
    ) -> Self {
        Self {
            sessions,
            source,
            settings,
        }
    }

    /// Whether a fresh document is needed, given the already-advanced tracker.
    pub fn should_fetch(&self, cached: Option<&str>, query: &str, tracker: &SessionTracker) -> bool {
        if cached.is_none_or(|doc| doc.trim().is_empty()) {
            return true;
        }
        let gap = tracker.gap();
        if gap >= self.settings.cooldown_turns && self.matches_keyword(query) {
            return true;
        }
        gap >= self.settings.max_staleness_turns
    }

    /// Case-insensitive substring match against the trigger keywords.
    pub fn matches_keyword(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.settings
            .trigger_keywords
            .iter()
            .any(|keyword| query.contains(keyword.as_str()))
    }

    /// Advance the session, fetch if needed, and report what to use.
    ///
    /// A failed or empty fetch keeps `cached`.
    pub async fn decide(&self, session_id: &str, cached: Option<&str>, query: &str) -> InjectionDecision {
        let tracker = self.sessions.advance(session_id).await;
        let current_turn = tracker.turn_count;
        let should_fetch = self.should_fetch(cached, query, &tracker);

        let mut decision = InjectionDecision {
            document: cached.filter(|doc| !doc.trim().is_empty()).map(String::from),
            should_fetch,
            current_turn,
            refreshed: false,
            fetch_error: None,
        };

        debug!(
            session_id,
            turn = current_turn,
            gap = tracker.gap(),
            should_fetch,
            "Injection decision"
        );

        if !should_fetch {
            return decision;
        }

        match self.source.fetch().await {
            Ok(fetch) => match fetch.non_empty() {
                Some(document) => {
                    info!(
                        session_id,
                        turn = current_turn,
                        source = self.source.name(),
                        chars = document.len(),
                        "Knowledge document refreshed"
                    );
                    self.sessions.record_injection(session_id, current_turn).await;
                    decision.document = Some(document);
                    decision.refreshed = true;
                }
                None => {
                    debug!(session_id, source = self.source.name(), "Knowledge source returned no document");
                }
            },
            Err(e) => {
                warn!(session_id, source = self.source.name(), error = %e, "Knowledge fetch failed, keeping cached document");
                decision.fetch_error = Some(e.to_string());
            }
        }

        decision
    }
}
