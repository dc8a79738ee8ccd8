//! Inbox scanner: mailbox-statistics snapshot and top-senders ranking.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, warn};

use crate::config::ScanConfig;
use crate::error::Result;
use crate::gmail::MailApi;
use crate::models::{MailboxStats, SenderCount};
use crate::query::Term;
use crate::util::format_size;

/// The fixed set of well-known category labels a scan reports on. Never the
/// account's full label list.
pub const CATEGORY_LABELS: [&str; 3] = ["CATEGORY_PROMOTIONS", "CATEGORY_SOCIAL", "INBOX"];

pub struct InboxScanner {
    mail: Arc<dyn MailApi>,
    config: ScanConfig,
}

impl InboxScanner {
    pub fn new(mail: Arc<dyn MailApi>, config: ScanConfig) -> Self {
        Self { mail, config }
    }

    /// Assemble a mailbox snapshot: profile totals, per-category label
    /// stats, and the old-mail estimate.
    ///
    /// Fail-fast: any underlying fetch failure aborts the whole scan; there
    /// are no partial stats.
    pub async fn scan_inbox(&self) -> Result<MailboxStats> {
        let profile = self.mail.get_profile().await?;
        let labels = self.mail.list_labels().await?;

        let mut categories = BTreeMap::new();
        for label_id in CATEGORY_LABELS {
            if labels.iter().any(|l| l.id == label_id) {
                let stats = self.mail.get_label(label_id).await?;
                categories.insert(label_id.to_string(), stats);
            }
        }

        // The old-mail figure is the provider's result-size estimate for a
        // one-result search, forwarded unmodified.
        let cutoff = Utc::now() - Duration::days(self.config.old_mail_threshold_days);
        let page = self
            .mail
            .search_messages(Term::before_epoch(cutoff).as_str(), 1)
            .await?;

        debug!(
            email = %profile.email_address,
            total = profile.messages_total,
            old = page.result_size_estimate,
            "inbox scan complete"
        );

        Ok(MailboxStats {
            email: profile.email_address,
            total_emails: profile.messages_total,
            unread: profile.messages_unread,
            categories,
            old_emails: page.result_size_estimate,
            last_scanned: Utc::now(),
        })
    }

    /// Rank the most frequent senders among recent mail.
    ///
    /// Lists `limit x oversample` recent messages and fetches each one's
    /// headers sequentially; one remote round-trip per message is the price
    /// of having no server-side aggregation. Returns at most `limit`
    /// entries, sorted by descending count with ties kept in encounter
    /// order. Any mid-scan failure yields an empty ranking.
    pub async fn top_senders(&self, limit: usize) -> Vec<SenderCount> {
        match self.rank_senders(limit).await {
            Ok(ranking) => ranking,
            Err(e) => {
                warn!("top-senders scan failed, returning empty ranking: {e}");
                Vec::new()
            }
        }
    }

    async fn rank_senders(&self, limit: usize) -> Result<Vec<SenderCount>> {
        let sample_size = (limit as u32).saturating_mul(self.config.sender_oversample);
        let page = self.mail.search_messages("", sample_size).await?;

        // Tally in encounter order so the later stable sort breaks count
        // ties by first appearance.
        let mut order: Vec<String> = Vec::new();
        let mut counts: std::collections::HashMap<String, u64> =
            std::collections::HashMap::new();
        let mut sample_bytes = 0u64;

        for id in &page.ids {
            let message = self.mail.get_message(id).await?;
            sample_bytes += message.size_estimate;
            let Some(from) = message.from else { continue };
            if !counts.contains_key(&from) {
                order.push(from.clone());
            }
            *counts.entry(from).or_insert(0) += 1;
        }

        debug!(
            sampled = page.ids.len(),
            size = %format_size(sample_bytes),
            "sender sample fetched"
        );

        let mut ranking: Vec<SenderCount> = order
            .into_iter()
            .map(|sender| {
                let count = counts[&sender];
                SenderCount { sender, count }
            })
            .collect();
        ranking.sort_by_key(|entry| std::cmp::Reverse(entry.count));
        ranking.truncate(limit);
        Ok(ranking)
    }
}
