//! Push transport protocol types.
//!
//! The server exposes a WebSocket endpoint at `/ws`. Messages are JSON
//! encoded and use a `type` field for discrimination.
//!
//! ## Client → Server Messages ([`ClientMessage`])
//! - `subscribe`: Limit updates to a set of rigs
//! - `ping`: Keepalive ping
//!
//! ## Server → Client Messages ([`PushMessage`])
//! - `issues-snapshot` / `agents-snapshot`: full buffer for a rig
//! - `issue-created` / `issue-changed` / `issue-deleted`: single issue patch
//! - `agent-state-changed`: single agent patch
//! - `mail-received`, `activity`: feed entries
//! - `progress-changed`: aggregate counts for a rig
//!
//! The set is closed: an unknown `type` fails to decode rather than being
//! ignored by a catch-all arm.

use serde::{Deserialize, Serialize};

use crate::models::{ActivityEvent, Agent, Issue, MailMessage, RigProgress};

// ============================================================================
// Client → Server Messages
// ============================================================================

/// Messages sent from the dashboard to the server.
///
/// ```json
/// {"type": "subscribe", "rigs": ["gastown"]}
/// {"type": "ping"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Subscribe to updates for these rigs. Empty means all rigs.
    Subscribe { rigs: Vec<String> },

    /// Keepalive ping message.
    Ping,
}

// ============================================================================
// Server → Client Messages
// ============================================================================

/// Reference to a removed issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub id: String,
}

/// Incremental state-change messages delivered by the push transport.
///
/// ```json
/// {"type": "issue-changed", "rig": "gastown", "payload": {"id": "gt-1.2", ...}}
/// {"type": "mail-received", "payload": {"id": "m-9", ...}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PushMessage {
    /// Full issue list for a rig.
    IssuesSnapshot { rig: String, payload: Vec<Issue> },

    #[serde(alias = "item-created")]
    IssueCreated { rig: String, payload: Issue },

    #[serde(alias = "item-changed")]
    IssueChanged { rig: String, payload: Issue },

    #[serde(alias = "item-deleted")]
    IssueDeleted { rig: String, payload: IssueRef },

    /// Full agent list for a rig.
    AgentsSnapshot { rig: String, payload: Vec<Agent> },

    AgentStateChanged { rig: String, payload: Agent },

    MailReceived { payload: MailMessage },

    Activity { payload: ActivityEvent },

    ProgressChanged { rig: String, payload: RigProgress },
}

impl PushMessage {
    /// Wire name of this message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            PushMessage::IssuesSnapshot { .. } => "issues-snapshot",
            PushMessage::IssueCreated { .. } => "issue-created",
            PushMessage::IssueChanged { .. } => "issue-changed",
            PushMessage::IssueDeleted { .. } => "issue-deleted",
            PushMessage::AgentsSnapshot { .. } => "agents-snapshot",
            PushMessage::AgentStateChanged { .. } => "agent-state-changed",
            PushMessage::MailReceived { .. } => "mail-received",
            PushMessage::Activity { .. } => "activity",
            PushMessage::ProgressChanged { .. } => "progress-changed",
        }
    }

    /// Rig the message applies to, if it is rig-scoped.
    pub fn rig(&self) -> Option<&str> {
        match self {
            PushMessage::IssuesSnapshot { rig, .. }
            | PushMessage::IssueCreated { rig, .. }
            | PushMessage::IssueChanged { rig, .. }
            | PushMessage::IssueDeleted { rig, .. }
            | PushMessage::AgentsSnapshot { rig, .. }
            | PushMessage::AgentStateChanged { rig, .. }
            | PushMessage::ProgressChanged { rig, .. } => Some(rig),
            PushMessage::MailReceived { .. } => None,
            PushMessage::Activity { payload } => payload.rig.as_deref(),
        }
    }

    /// Decode a text frame.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IssueStatus;

    #[test]
    fn test_client_message_serialization() {
        let msg = ClientMessage::Subscribe {
            rigs: vec!["gastown".to_string()],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"subscribe","rigs":["gastown"]}"#);
        assert_eq!(
            serde_json::to_string(&ClientMessage::Ping).unwrap(),
            r#"{"type":"ping"}"#
        );
    }

    #[test]
    fn test_parse_issue_changed() {
        let text = r#"{
            "type": "issue-changed",
            "rig": "gastown",
            "payload": {
                "id": "gt-1.2",
                "title": "Refinery merge queue",
                "status": "in_progress",
                "created_at": "2026-01-31T09:00:00Z",
                "updated_at": "2026-01-31T10:00:00Z"
            }
        }"#;
        let msg = PushMessage::parse(text).unwrap();
        assert_eq!(msg.kind(), "issue-changed");
        assert_eq!(msg.rig(), Some("gastown"));
        match msg {
            PushMessage::IssueChanged { payload, .. } => {
                assert_eq!(payload.id, "gt-1.2");
                assert_eq!(payload.status, IssueStatus::InProgress);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_item_alias() {
        let text = r#"{
            "type": "item-created",
            "rig": "gastown",
            "payload": {
                "id": "gt-7",
                "title": "New",
                "created_at": "2026-01-31T09:00:00Z",
                "updated_at": "2026-01-31T09:00:00Z"
            }
        }"#;
        assert!(matches!(
            PushMessage::parse(text).unwrap(),
            PushMessage::IssueCreated { .. }
        ));
    }

    #[test]
    fn test_parse_mail_received_has_no_rig() {
        let text = r#"{
            "type": "mail-received",
            "payload": {
                "id": "m-1",
                "from": "gastown/witness",
                "to": "mayor",
                "subject": "Polecat stuck",
                "sent_at": "2026-01-31T09:00:00Z"
            }
        }"#;
        let msg = PushMessage::parse(text).unwrap();
        assert_eq!(msg.rig(), None);
    }

    #[test]
    fn test_parse_unknown_type_fails() {
        let text = r#"{"type": "weather-report", "payload": {}}"#;
        assert!(PushMessage::parse(text).is_err());
    }

    #[test]
    fn test_parse_missing_payload_fails() {
        let text = r#"{"type": "issue-changed", "rig": "gastown"}"#;
        assert!(PushMessage::parse(text).is_err());
    }
}
