use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which identity provider issued the stored token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
}

/// The bearer credential held by the token store.
///
/// No expiry timestamp is tracked locally; staleness is discovered
/// reactively through a 401 from the mail API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub issued_via: Provider,
}

/// Cached copy of the identity provider's userinfo data. Refreshed only at
/// sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub label_type: Option<String>,
}

/// Mailbox-level totals from the provider's profile endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxProfile {
    pub email_address: String,
    #[serde(default)]
    pub messages_total: u64,
    #[serde(default)]
    pub messages_unread: u64,
}

/// One page of a message search: matching ids plus the provider's estimate
/// of the total result size. The estimate is forwarded as-is, never
/// recomputed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub ids: Vec<String>,
    pub result_size_estimate: u64,
}

/// Point-in-time message counts for one label. Stale as soon as any
/// mutation lands; never invalidated incrementally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelStats {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub messages_total: u64,
    #[serde(default)]
    pub messages_unread: u64,
}

/// Mailbox-statistics snapshot assembled by a scan. Ephemeral: rebuilt on
/// every scan and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxStats {
    pub email: String,
    pub total_emails: u64,
    pub unread: u64,
    /// Only the fixed set of queried category labels, never the full list.
    pub categories: BTreeMap<String, LabelStats>,
    /// The provider's result-size estimate for mail older than the
    /// threshold, forwarded unmodified. An approximation, not a count.
    pub old_emails: u64,
    pub last_scanned: DateTime<Utc>,
}

/// Metadata-format view of a single message, headers hoisted out of the
/// payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: String,
    pub thread_id: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub size_estimate: u64,
    pub snippet: Option<String>,
    pub label_ids: Vec<String>,
}

/// One entry in the top-senders ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderCount {
    pub sender: String,
    pub count: u64,
}
