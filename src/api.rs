//! Pull transport: JSON over HTTP.
//!
//! Every endpoint is addressed by an [`Endpoint`] whose request path doubles
//! as its cache key. Failures of any kind are normalized into [`FetchError`].

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use urlencoding::encode;

use crate::FetchError;
use crate::models::{ActivityEvent, Agent, Issue, ItemList, MailMessage, Rig, RigProgress};

/// Freshness class of a resource, mapped to a TTL by [`CacheTtls`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    /// Fast-moving data (agent state, mail, activity)
    Fast,
    /// Issue lists and progress
    Default,
    /// Slow-moving catalog data (rig list)
    Slow,
}

/// TTLs per [`TtlClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub fast: Duration,
    pub default: Duration,
    pub slow: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            fast: Duration::from_secs(5),
            default: Duration::from_secs(15),
            slow: Duration::from_secs(60),
        }
    }
}

impl CacheTtls {
    pub fn for_class(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Fast => self.fast,
            TtlClass::Default => self.default,
            TtlClass::Slow => self.slow,
        }
    }
}

/// A pull endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Rigs,
    Issues { rig: String },
    Agents { rig: String },
    Progress { rig: String },
    Mail,
    Activity,
}

impl Endpoint {
    /// Request path including query string. Also used as the cache key.
    /// Rig names are percent-encoded as a single path segment.
    pub fn path(&self) -> String {
        match self {
            Endpoint::Rigs => "/api/rigs".to_string(),
            Endpoint::Issues { rig } => format!("/api/rigs/{}/issues?all=true", encode(rig)),
            Endpoint::Agents { rig } => format!("/api/rigs/{}/agents", encode(rig)),
            Endpoint::Progress { rig } => format!("/api/rigs/{}/progress", encode(rig)),
            Endpoint::Mail => "/api/mail".to_string(),
            Endpoint::Activity => "/api/activity".to_string(),
        }
    }

    pub fn ttl_class(&self) -> TtlClass {
        match self {
            Endpoint::Rigs => TtlClass::Slow,
            Endpoint::Issues { .. } | Endpoint::Progress { .. } => TtlClass::Default,
            Endpoint::Agents { .. } | Endpoint::Mail | Endpoint::Activity => TtlClass::Fast,
        }
    }
}

/// Decoded response body, shaped per endpoint.
///
/// Lists are wrapped in `Arc` so a cache hit hands back the same allocation
/// the previous caller saw.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Rigs(Arc<Vec<Rig>>),
    Issues(ItemList<Issue>),
    Agents(ItemList<Agent>),
    Progress(Arc<RigProgress>),
    Mail(ItemList<MailMessage>),
    Activity(ItemList<ActivityEvent>),
}

impl Payload {
    /// Whether both payloads point at the same allocation.
    pub fn same_as(&self, other: &Payload) -> bool {
        match (self, other) {
            (Payload::Rigs(a), Payload::Rigs(b)) => Arc::ptr_eq(a, b),
            (Payload::Issues(a), Payload::Issues(b)) => Arc::ptr_eq(a, b),
            (Payload::Agents(a), Payload::Agents(b)) => Arc::ptr_eq(a, b),
            (Payload::Progress(a), Payload::Progress(b)) => Arc::ptr_eq(a, b),
            (Payload::Mail(a), Payload::Mail(b)) => Arc::ptr_eq(a, b),
            (Payload::Activity(a), Payload::Activity(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn into_issues(self) -> Option<ItemList<Issue>> {
        match self {
            Payload::Issues(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_agents(self) -> Option<ItemList<Agent>> {
        match self {
            Payload::Agents(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_rigs(self) -> Option<Arc<Vec<Rig>>> {
        match self {
            Payload::Rigs(rigs) => Some(rigs),
            _ => None,
        }
    }
}

fn into_item_list<T>(items: Vec<T>) -> ItemList<T> {
    Arc::new(items.into_iter().map(Arc::new).collect())
}

/// Structured error body (`{"error": "..."}`).
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the dashboard server's REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g., "http://localhost:8080").
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an endpoint.
    pub fn url(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Load and decode an endpoint.
    pub async fn load(&self, endpoint: &Endpoint) -> Result<Payload, FetchError> {
        let path = endpoint.path();
        let payload = match endpoint {
            Endpoint::Rigs => Payload::Rigs(Arc::new(self.get_json(&path).await?)),
            Endpoint::Issues { .. } => Payload::Issues(into_item_list(self.get_json(&path).await?)),
            Endpoint::Agents { .. } => Payload::Agents(into_item_list(self.get_json(&path).await?)),
            Endpoint::Progress { .. } => Payload::Progress(Arc::new(self.get_json(&path).await?)),
            Endpoint::Mail => Payload::Mail(into_item_list(self.get_json(&path).await?)),
            Endpoint::Activity => Payload::Activity(into_item_list(self.get_json(&path).await?)),
        };
        Ok(payload)
    }
}

/// Build a status error, preferring a structured `{"error": ...}` message.
fn status_error(status: u16, body: &str) -> FetchError {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error,
        Err(_) if body.trim().is_empty() => "no response body".to_string(),
        Err(_) => body.trim().chars().take(200).collect(),
    };
    FetchError::Status { status, message }
}
