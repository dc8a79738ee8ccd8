//! Cleanup workflow: preview -> confirm -> execute -> undo.
//!
//! The only stateful control flow in the crate. Exactly one pending action
//! may exist at a time (a new selection replaces it, last write wins) and
//! exactly one undo record, which counts down independently of any preview
//! that opens after it.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::auth::SessionManager;
use crate::config::CleanupConfig;
use crate::error::{Error, Result};
use crate::gmail::MailApi;
use crate::query::Term;
use crate::undo::UndoRecord;

/// Workflow states observed by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    PreviewOpen,
    Executing,
    Succeeded,
    Failed,
}

/// What a pending action selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    ByLabel(String),
    BySender(String),
    ByAge { older_than_days: u32 },
}

impl Selection {
    fn describe(&self) -> String {
        match self {
            Selection::ByLabel(id) => format!("label {id}"),
            Selection::BySender(sender) => format!("sender {sender}"),
            Selection::ByAge { older_than_days } => {
                format!("older than {older_than_days} days")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOp {
    Archive,
    Delete,
}

/// The single outstanding preview, consumed by execution or replaced by a
/// newer selection.
#[derive(Debug, Clone)]
pub struct PendingAction {
    pub selection: Selection,
    pub estimated_count: u64,
    generation: u64,
}

/// Result of a confirmed execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Executed {
        operation: CleanupOp,
        affected: usize,
        undo_available: bool,
    },
    /// The pending action was replaced while this execution was resolving
    /// its selection; nothing was mutated.
    Superseded,
}

/// Result of an undo request. Expired and absent records are no-ops, not
/// errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    Restored(usize),
    Expired,
    Nothing,
}

struct Inner {
    pending: Option<PendingAction>,
    undo: Option<UndoRecord>,
    next_generation: u64,
}

pub struct CleanupWorkflow {
    mail: Arc<dyn MailApi>,
    session: Arc<SessionManager>,
    config: CleanupConfig,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<WorkflowState>,
}

impl CleanupWorkflow {
    pub fn new(
        mail: Arc<dyn MailApi>,
        session: Arc<SessionManager>,
        config: CleanupConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(WorkflowState::Idle);
        Self {
            mail,
            session,
            config,
            inner: Mutex::new(Inner {
                pending: None,
                undo: None,
                next_generation: 0,
            }),
            state_tx,
        }
    }

    /// Observe state transitions. The presentation layer subscribes here
    /// instead of being called back directly.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> WorkflowState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: WorkflowState) {
        self.state_tx.send_replace(state);
    }

    pub async fn select_by_label(&self, label_id: &str, estimated_count: u64) {
        self.open_preview(Selection::ByLabel(label_id.to_string()), estimated_count)
            .await;
    }

    pub async fn select_by_sender(&self, sender: &str, estimated_count: u64) {
        self.open_preview(Selection::BySender(sender.to_string()), estimated_count)
            .await;
    }

    pub async fn select_by_age(&self, older_than_days: u32, estimated_count: u64) {
        self.open_preview(Selection::ByAge { older_than_days }, estimated_count)
            .await;
    }

    /// Open (or replace) the preview. An outstanding undo window is left
    /// alone; it keeps counting down on its own.
    async fn open_preview(&self, selection: Selection, estimated_count: u64) {
        let mut inner = self.inner.lock().await;
        if inner.pending.is_some() {
            debug!("replacing pending action with {}", selection.describe());
        }
        inner.next_generation += 1;
        inner.pending = Some(PendingAction {
            selection,
            estimated_count,
            generation: inner.next_generation,
        });
        drop(inner);
        self.set_state(WorkflowState::PreviewOpen);
    }

    /// Discard the preview without executing.
    pub async fn cancel_preview(&self) {
        self.inner.lock().await.pending = None;
        self.set_state(WorkflowState::Idle);
    }

    pub async fn pending(&self) -> Option<PendingAction> {
        self.inner.lock().await.pending.clone()
    }

    /// Confirm the pending action: resolve the selection into concrete ids
    /// (capped), dispatch one batch mutation, and arm the undo window for
    /// archives.
    pub async fn execute(&self, operation: CleanupOp) -> Result<Outcome> {
        let action = {
            let inner = self.inner.lock().await;
            inner.pending.clone()
        };
        let Some(action) = action else {
            return Err(Error::EmptySelection);
        };

        self.set_state(WorkflowState::Executing);

        let ids = match self.resolve(&action.selection).await {
            Ok(ids) => ids,
            Err(e) => return Err(self.fail(e).await),
        };

        // The selection may have been replaced while we were resolving it.
        // The stale result is discarded, never applied to the new one.
        {
            let inner = self.inner.lock().await;
            let current = inner.pending.as_ref().map(|p| p.generation);
            if current != Some(action.generation) {
                debug!("selection superseded during resolution, discarding result");
                return Ok(Outcome::Superseded);
            }
        }

        if ids.is_empty() {
            return Err(self.fail(Error::EmptySelection).await);
        }

        let dispatch = match operation {
            CleanupOp::Archive => self.mail.batch_archive(&ids).await,
            CleanupOp::Delete => self.mail.batch_delete(&ids).await,
        };
        if let Err(e) = dispatch {
            return Err(self.fail(e).await);
        }

        let affected = ids.len();
        let undo_available = operation == CleanupOp::Archive;
        {
            let mut inner = self.inner.lock().await;
            inner.pending = None;
            if undo_available {
                inner.undo = Some(UndoRecord::new(
                    ids,
                    operation,
                    std::time::Duration::from_secs(self.config.undo_window_secs),
                ));
            }
        }
        self.set_state(WorkflowState::Succeeded);
        info!(
            affected,
            "cleanup executed ({})",
            match operation {
                CleanupOp::Archive => "archive",
                CleanupOp::Delete => "delete",
            }
        );

        Ok(Outcome::Executed {
            operation,
            affected,
            undo_available,
        })
    }

    /// Reverse the last archive, if its window is still open. With no live
    /// record, or past the deadline, this is a no-op.
    pub async fn undo(&self) -> Result<UndoOutcome> {
        let record = self.inner.lock().await.undo.take();
        let Some(record) = record else {
            return Ok(UndoOutcome::Nothing);
        };

        if record.is_expired() {
            debug!("undo requested after the window elapsed, ignoring");
            self.set_state(WorkflowState::Idle);
            return Ok(UndoOutcome::Expired);
        }

        match self.mail.batch_restore(record.message_ids()).await {
            Ok(()) => {
                let restored = record.message_ids().len();
                info!(restored, operation = ?record.operation(), "cleanup undone");
                self.set_state(WorkflowState::Idle);
                Ok(UndoOutcome::Restored(restored))
            }
            Err(e) => {
                // Keep the record so the user may retry within the window.
                self.inner.lock().await.undo = Some(record);
                Err(self.handle_auth_failure(e).await)
            }
        }
    }

    async fn resolve(&self, selection: &Selection) -> Result<Vec<String>> {
        let cap = self.config.max_batch_size;
        match selection {
            Selection::ByLabel(label_id) => {
                self.mail.list_messages_by_label(label_id, cap).await
            }
            Selection::BySender(sender) => {
                let page = self
                    .mail
                    .search_messages(Term::from_sender(sender).as_str(), cap)
                    .await?;
                Ok(page.ids)
            }
            Selection::ByAge { older_than_days } => {
                let page = self
                    .mail
                    .search_messages(Term::older_than_days(*older_than_days).as_str(), cap)
                    .await?;
                Ok(page.ids)
            }
        }
    }

    /// Execution failure: discard the pending action, transition to
    /// `Failed` (or out of the workflow entirely for auth errors), surface
    /// the error.
    async fn fail(&self, e: Error) -> Error {
        self.inner.lock().await.pending = None;
        let e = self.handle_auth_failure(e).await;
        if !matches!(e, Error::AuthExpired | Error::PermissionDenied) {
            self.set_state(WorkflowState::Failed);
        }
        e
    }

    /// Auth failures force the session out entirely; the workflow does not
    /// try to recover mid-execution.
    async fn handle_auth_failure(&self, e: Error) -> Error {
        if matches!(e, Error::AuthExpired | Error::PermissionDenied) {
            warn!("auth failure during cleanup, signing out: {e}");
            self.session.sign_out().await;
            self.set_state(WorkflowState::Idle);
        }
        e
    }
}
