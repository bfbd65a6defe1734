//! Reactive store fed by the push transport.
//!
//! The [`Store`] is constructed explicitly and owned by whoever drives the
//! push connection. Readers get immutable [`StoreSnapshot`]s behind an
//! `Arc`; every mutation builds a new snapshot instead of editing the old
//! one, so a snapshot taken before an update stays consistent for as long
//! as it is held. Within a snapshot, item lists are `Arc<Vec<Arc<T>>>` and
//! an incremental patch only swaps the `Arc` of the item that changed.
//!
//! Source selection ([`StoreSnapshot::select`]) is pure: the live buffer is
//! used when the transport is connected and has data for the scope,
//! otherwise the caller is pointed at the cached pull endpoint.

pub mod protocol;
pub mod recent;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::api::{Endpoint, Payload};
use crate::models::{ActivityEvent, Agent, Issue, ItemList, MailMessage, RigProgress};

pub use protocol::{ClientMessage, IssueRef, PushMessage};
pub use recent::{DEFAULT_HIGHLIGHT_WINDOW, RecentToken, RecentUpdates};

/// Maximum activity events kept in the live buffer.
pub const MAX_ACTIVITY_EVENTS: usize = 200;

/// A data subset addressable by both the push buffers and the pull API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Issues(String),
    Agents(String),
    Progress(String),
    Mail,
    Activity,
}

impl Scope {
    /// Pull endpoint serving the same data.
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Scope::Issues(rig) => Endpoint::Issues { rig: rig.clone() },
            Scope::Agents(rig) => Endpoint::Agents { rig: rig.clone() },
            Scope::Progress(rig) => Endpoint::Progress { rig: rig.clone() },
            Scope::Mail => Endpoint::Mail,
            Scope::Activity => Endpoint::Activity,
        }
    }

    /// Cache key for the fallback path (the pull request path).
    pub fn cache_key(&self) -> String {
        self.endpoint().path()
    }

    pub fn rig(&self) -> Option<&str> {
        match self {
            Scope::Issues(rig) | Scope::Agents(rig) | Scope::Progress(rig) => Some(rig),
            Scope::Mail | Scope::Activity => None,
        }
    }
}

/// Where a scope's data should come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Push-fed buffer
    Live(Payload),
    /// Use the cached pull endpoint with this key
    Fallback { cache_key: String, endpoint: Endpoint },
}

impl Selection {
    pub fn is_live(&self) -> bool {
        matches!(self, Selection::Live(_))
    }

    /// Whether two selections pick the same source and, for live data, the
    /// same allocation.
    pub fn same_as(&self, other: &Selection) -> bool {
        match (self, other) {
            (Selection::Live(a), Selection::Live(b)) => a.same_as(b),
            (
                Selection::Fallback { cache_key: a, .. },
                Selection::Fallback { cache_key: b, .. },
            ) => a == b,
            _ => false,
        }
    }
}

/// Incoming event for [`Store::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Push transport handshake succeeded
    Connected,
    /// Push transport lost
    Disconnected,
    Message(PushMessage),
}

/// Immutable view of the store at one point in time.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub connected: bool,
    pub issues: HashMap<String, ItemList<Issue>>,
    pub agents: HashMap<String, ItemList<Agent>>,
    pub progress: HashMap<String, Arc<RigProgress>>,
    pub mail: ItemList<MailMessage>,
    pub activity: ItemList<ActivityEvent>,
    pub recent: RecentUpdates,
    /// Incremented on every mutation
    pub revision: u64,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            connected: false,
            issues: HashMap::new(),
            agents: HashMap::new(),
            progress: HashMap::new(),
            mail: Arc::new(Vec::new()),
            activity: Arc::new(Vec::new()),
            recent: RecentUpdates::default(),
            revision: 0,
        }
    }
}

impl StoreSnapshot {
    /// Pick the data source for `scope`.
    ///
    /// Returns the live buffer when connected and the buffer is non-empty,
    /// otherwise the fallback cache key. Side-effect free.
    pub fn select(&self, scope: &Scope) -> Selection {
        if self.connected {
            if let Some(payload) = self.live_payload(scope) {
                return Selection::Live(payload);
            }
        }
        Selection::Fallback {
            cache_key: scope.cache_key(),
            endpoint: scope.endpoint(),
        }
    }

    fn live_payload(&self, scope: &Scope) -> Option<Payload> {
        match scope {
            Scope::Issues(rig) => self
                .issues
                .get(rig)
                .filter(|items| !items.is_empty())
                .map(|items| Payload::Issues(Arc::clone(items))),
            Scope::Agents(rig) => self
                .agents
                .get(rig)
                .filter(|items| !items.is_empty())
                .map(|items| Payload::Agents(Arc::clone(items))),
            Scope::Progress(rig) => self
                .progress
                .get(rig)
                .map(|progress| Payload::Progress(Arc::clone(progress))),
            Scope::Mail => {
                (!self.mail.is_empty()).then(|| Payload::Mail(Arc::clone(&self.mail)))
            }
            Scope::Activity => (!self.activity.is_empty())
                .then(|| Payload::Activity(Arc::clone(&self.activity))),
        }
    }

    /// Issues buffered for `rig`, if any.
    pub fn issues_for(&self, rig: &str) -> Option<&ItemList<Issue>> {
        self.issues.get(rig)
    }

    /// Whether `id` should be highlighted as recently updated.
    pub fn is_recent(&self, id: &str, now: Instant) -> bool {
        self.recent.contains(id, now)
    }
}

/// Replace the item whose key matches, or append it. Untouched items keep
/// their `Arc`.
fn upsert<T>(list: &ItemList<T>, item: T, key: impl Fn(&T) -> &str) -> ItemList<T> {
    let mut next: Vec<Arc<T>> = Vec::with_capacity(list.len() + 1);
    let mut replaced = false;
    let wanted = key(&item).to_string();
    let mut item = Some(item);
    for existing in list.iter() {
        if !replaced && key(Arc::as_ref(existing)) == wanted {
            if let Some(item) = item.take() {
                next.push(Arc::new(item));
            }
            replaced = true;
        } else {
            next.push(Arc::clone(existing));
        }
    }
    if let Some(item) = item {
        next.push(Arc::new(item));
    }
    Arc::new(next)
}

fn remove_by_key<T>(list: &ItemList<T>, wanted: &str, key: impl Fn(&T) -> &str) -> ItemList<T> {
    Arc::new(
        list.iter()
            .filter(|existing| key(Arc::as_ref(existing)) != wanted)
            .cloned()
            .collect(),
    )
}

fn into_item_list<T>(items: Vec<T>) -> ItemList<T> {
    Arc::new(items.into_iter().map(Arc::new).collect())
}

/// Process-wide state container, explicitly constructed and injected.
pub struct Store {
    current: Arc<StoreSnapshot>,
    updates: watch::Sender<Arc<StoreSnapshot>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_highlight_window(DEFAULT_HIGHLIGHT_WINDOW)
    }

    pub fn with_highlight_window(window: Duration) -> Self {
        let current = Arc::new(StoreSnapshot {
            recent: RecentUpdates::new(window),
            ..StoreSnapshot::default()
        });
        let (updates, _) = watch::channel(Arc::clone(&current));
        Self { current, updates }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        Arc::clone(&self.current)
    }

    /// Receive every published snapshot. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<StoreSnapshot>> {
        self.updates.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.current.connected
    }

    /// See [`StoreSnapshot::select`].
    pub fn select(&self, scope: &Scope) -> Selection {
        self.current.select(scope)
    }

    /// Apply one event and publish the resulting snapshot.
    ///
    /// Returns a token when an issue was marked as recently updated, so the
    /// caller can expire exactly that mark later.
    pub fn apply(&mut self, event: StoreEvent, now: Instant) -> Option<RecentToken> {
        let mut next = (*self.current).clone();
        let token = match event {
            StoreEvent::Connected => {
                if !next.connected {
                    info!("push transport connected");
                }
                next.connected = true;
                None
            }
            StoreEvent::Disconnected => {
                if next.connected {
                    info!("push transport lost, keeping last-known buffers");
                }
                next.connected = false;
                None
            }
            StoreEvent::Message(message) => {
                debug!(kind = message.kind(), rig = ?message.rig(), "applying push message");
                Self::apply_message(&mut next, message, now)
            }
        };
        next.revision += 1;
        self.publish(next);
        token
    }

    fn apply_message(
        next: &mut StoreSnapshot,
        message: PushMessage,
        now: Instant,
    ) -> Option<RecentToken> {
        match message {
            PushMessage::IssuesSnapshot { rig, payload } => {
                next.issues.insert(rig, into_item_list(payload));
                None
            }
            PushMessage::IssueCreated { rig, payload } | PushMessage::IssueChanged { rig, payload } => {
                let id = payload.id.clone();
                let list = next
                    .issues
                    .get(&rig)
                    .cloned()
                    .unwrap_or_else(|| Arc::new(Vec::new()));
                next.issues
                    .insert(rig, upsert(&list, payload, |issue| issue.id.as_str()));
                Some(next.recent.mark(&id, now))
            }
            PushMessage::IssueDeleted { rig, payload } => {
                if let Some(list) = next.issues.get(&rig) {
                    let pruned = remove_by_key(list, &payload.id, |issue| issue.id.as_str());
                    next.issues.insert(rig, pruned);
                }
                None
            }
            PushMessage::AgentsSnapshot { rig, payload } => {
                next.agents.insert(rig, into_item_list(payload));
                None
            }
            PushMessage::AgentStateChanged { rig, payload } => {
                let list = next
                    .agents
                    .get(&rig)
                    .cloned()
                    .unwrap_or_else(|| Arc::new(Vec::new()));
                next.agents
                    .insert(rig, upsert(&list, payload, |agent| agent.address.as_str()));
                None
            }
            PushMessage::MailReceived { payload } => {
                next.mail = upsert(&next.mail, payload, |mail| mail.id.as_str());
                None
            }
            PushMessage::Activity { payload } => {
                let skip = (next.activity.len() + 1).saturating_sub(MAX_ACTIVITY_EVENTS);
                let mut events: Vec<Arc<ActivityEvent>> =
                    next.activity.iter().skip(skip).cloned().collect();
                events.push(Arc::new(payload));
                next.activity = Arc::new(events);
                None
            }
            PushMessage::ProgressChanged { rig, payload } => {
                next.progress.insert(rig, Arc::new(payload));
                None
            }
        }
    }

    /// Start the live buffer for `scope` from a pulled payload.
    ///
    /// Only issue and agent lists are adopted, and only while no buffer
    /// exists for the rig, so an incremental message arriving before the
    /// first snapshot patches the full list instead of replacing it.
    pub fn adopt(&mut self, scope: &Scope, payload: Payload) -> bool {
        let mut next = (*self.current).clone();
        let adopted = match (scope, payload) {
            (Scope::Issues(rig), Payload::Issues(items)) if !next.issues.contains_key(rig) => {
                next.issues.insert(rig.clone(), items);
                true
            }
            (Scope::Agents(rig), Payload::Agents(items)) if !next.agents.contains_key(rig) => {
                next.agents.insert(rig.clone(), items);
                true
            }
            _ => false,
        };
        if adopted {
            debug!(?scope, "live buffer started from pulled data");
            next.revision += 1;
            self.publish(next);
        }
        adopted
    }

    /// Expire one highlight mark. No-op if a newer mark replaced it.
    pub fn expire_recent(&mut self, token: &RecentToken) -> bool {
        let mut next = (*self.current).clone();
        let removed = next.recent.expire(token);
        if removed {
            next.revision += 1;
            self.publish(next);
        }
        removed
    }

    /// Drop every highlight older than the window.
    pub fn prune_recent(&mut self, now: Instant) -> usize {
        let mut next = (*self.current).clone();
        let dropped = next.recent.prune(now);
        if dropped > 0 {
            next.revision += 1;
            self.publish(next);
        }
        dropped
    }

    fn publish(&mut self, next: StoreSnapshot) {
        self.current = Arc::new(next);
        self.updates.send_replace(Arc::clone(&self.current));
    }
}
