//! Builders for Gmail search-query strings.
//!
//! Every search the scanner or the cleanup workflow issues goes through this
//! module, so the exact query grammar lives in one place.

use chrono::{DateTime, NaiveDate, Utc};

use crate::util;

/// A single Gmail search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term(String);

impl Term {
    /// Messages older than the given number of days.
    pub fn older_than_days(days: u32) -> Self {
        Term(format!("older_than:{days}d"))
    }

    /// Messages received before the given calendar date.
    pub fn before_date(date: NaiveDate) -> Self {
        Term(format!("before:{}", date.format("%Y/%m/%d")))
    }

    /// Messages received before the given instant, as an epoch timestamp.
    /// This is the form the inbox scan uses for its old-mail estimate.
    pub fn before_epoch(instant: DateTime<Utc>) -> Self {
        Term(format!("before:{}", instant.timestamp()))
    }

    /// Messages received before a user-entered date string; `None` if the
    /// string is not one of the accepted formats.
    pub fn before(date_str: &str) -> Option<Self> {
        util::parse_date(date_str).map(Self::before_date)
    }

    /// Messages from the given sender. The value is quoted so display names
    /// with spaces match verbatim.
    pub fn from_sender(sender: &str) -> Self {
        Term(format!("from:\"{sender}\""))
    }

    /// Messages whose subject matches the given pattern.
    pub fn subject(pattern: &str) -> Self {
        Term(format!("subject:{pattern}"))
    }

    /// Messages carrying the given label. Well-known category and system
    /// labels map to their `category:`/`in:` forms.
    pub fn label(label: &str) -> Self {
        let query = match label.to_lowercase().as_str() {
            "promotions" | "category_promotions" => "category:promotions".to_string(),
            "social" | "category_social" => "category:social".to_string(),
            "updates" | "category_updates" => "category:updates".to_string(),
            "forums" | "category_forums" => "category:forums".to_string(),
            "spam" => "in:spam".to_string(),
            "trash" => "in:trash".to_string(),
            "inbox" => "in:inbox".to_string(),
            "sent" => "in:sent".to_string(),
            other => format!("label:{other}"),
        };
        Term(query)
    }

    /// Messages larger than the given byte count.
    pub fn larger(bytes: u64) -> Self {
        Term(format!("larger:{bytes}"))
    }

    /// Messages smaller than the given byte count.
    pub fn smaller(bytes: u64) -> Self {
        Term(format!("smaller:{bytes}"))
    }

    /// Messages larger than a human-readable size like "5MB".
    pub fn larger_than(size: &str) -> Option<Self> {
        util::parse_size(size).map(Self::larger)
    }

    /// Messages smaller than a human-readable size like "500KB".
    pub fn smaller_than(size: &str) -> Option<Self> {
        util::parse_size(size).map(Self::smaller)
    }

    pub fn is_read() -> Self {
        Term("is:read".to_string())
    }

    pub fn is_unread() -> Self {
        Term("is:unread".to_string())
    }

    pub fn has_attachment(has: bool) -> Self {
        if has {
            Term("has:attachment".to_string())
        } else {
            Term("-has:attachment".to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How terms in a [`Query`] combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    All,
    Any,
}

/// A composite query: one or more terms joined with AND (space) or OR.
#[derive(Debug, Clone)]
pub struct Query {
    terms: Vec<Term>,
    combine: Combine,
}

impl Query {
    pub fn all() -> Self {
        Query { terms: Vec::new(), combine: Combine::All }
    }

    pub fn any() -> Self {
        Query { terms: Vec::new(), combine: Combine::Any }
    }

    pub fn with(mut self, term: Term) -> Self {
        self.terms.push(term);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn build(&self) -> String {
        match self.combine {
            Combine::All => self
                .terms
                .iter()
                .map(Term::as_str)
                .collect::<Vec<_>>()
                .join(" "),
            Combine::Any => self
                .terms
                .iter()
                .map(|t| format!("({t})"))
                .collect::<Vec<_>>()
                .join(" OR "),
        }
    }
}

impl From<Term> for Query {
    fn from(term: Term) -> Self {
        Query::all().with(term)
    }
}
