use tokio::time::{Duration, Instant};

use crate::cleaner::CleanupOp;

/// Record of a reversible batch operation, honorable until its deadline.
///
/// Only archives produce one; deletion is terminal. At most one record is
/// live at a time and a newer record supersedes the old one outright.
#[derive(Debug, Clone)]
pub struct UndoRecord {
    message_ids: Vec<String>,
    operation: CleanupOp,
    expires_at: Instant,
}

impl UndoRecord {
    pub fn new(message_ids: Vec<String>, operation: CleanupOp, window: Duration) -> Self {
        Self {
            message_ids,
            operation,
            expires_at: Instant::now() + window,
        }
    }

    /// The deadline is authoritative: an expired record must be treated as
    /// gone even if it is still readable.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn message_ids(&self) -> &[String] {
        &self.message_ids
    }

    pub fn operation(&self) -> CleanupOp {
        self.operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn record_reports_its_contents_and_deadline() {
        let record = UndoRecord::new(
            vec!["m1".to_string(), "m2".to_string()],
            CleanupOp::Archive,
            Duration::from_secs(5),
        );
        assert_eq!(record.operation(), CleanupOp::Archive);
        assert_eq!(record.message_ids(), ["m1", "m2"]);
        assert!(!record.is_expired());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(record.is_expired());
    }
}
