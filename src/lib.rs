//! Gmail mailbox cleanup client.
//!
//! Signs a user in against Google OAuth2, takes mailbox-statistics
//! snapshots, ranks top senders, and runs a preview -> confirm -> execute
//! cleanup over the Gmail batch endpoints with a short-lived undo window
//! for archives. All durable state lives in the remote mailbox and the
//! platform keychain; everything here is a client.
//!
//! The embedding presentation layer constructs a [`SessionManager`], a
//! [`GmailClient`], an [`InboxScanner`] and a [`CleanupWorkflow`], then
//! observes workflow state via [`CleanupWorkflow::subscribe`].

pub mod auth;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod gmail;
pub mod identity;
pub mod models;
pub mod query;
pub mod scanner;
pub mod undo;
pub mod util;

pub use auth::{KeyringStore, MemoryStore, SessionManager, TokenStore};
pub use cleaner::{CleanupOp, CleanupWorkflow, Outcome, Selection, UndoOutcome, WorkflowState};
pub use config::Config;
pub use error::{Error, Result};
pub use gmail::{GmailClient, MailApi};
pub use identity::{AcquireMode, GoogleIdentity, IdentityBroker};
pub use models::{
    Credential, Label, LabelStats, MailboxProfile, MailboxStats, MessageSummary, Provider,
    SearchPage, SenderCount, UserProfile,
};
pub use scanner::InboxScanner;
pub use undo::UndoRecord;
