use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::ActorId;
use super::error::EngagementError;
use super::store::StoreState;

/// Storage abstraction. Every mutating operation runs inside a single
/// closure-scoped transaction: the closure sees its own writes, and the
/// whole unit commits on `Ok` or is discarded on `Err`. Implementations
/// must serialize concurrent transactions.
pub trait EngagementStore: Send + Sync {
    fn transaction<T, F>(&self, f: F) -> Result<T, EngagementError>
    where
        F: FnOnce(&mut StoreState) -> Result<T, EngagementError>;

    fn read<T, F>(&self, f: F) -> Result<T, EngagementError>
    where
        F: FnOnce(&StoreState) -> Result<T, EngagementError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Message templates understood by the notification collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    ProposalSent,
    ProposalAccepted,
    StageCompleted,
    AmendmentRequested,
    AmendmentReviewed,
}

impl TemplateKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ProposalSent => "proposal_sent",
            Self::ProposalAccepted => "proposal_accepted",
            Self::StageCompleted => "stage_completed",
            Self::AmendmentRequested => "amendment_requested",
            Self::AmendmentReviewed => "amendment_reviewed",
        }
    }
}

/// Outbound message intent queued after a transaction commits. Delivery is
/// best-effort and never feeds back into the committed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub recipient: ActorId,
    pub template: TemplateKind,
    pub payload: BTreeMap<String, String>,
}

impl NotificationIntent {
    pub fn new(recipient: ActorId, template: TemplateKind) -> Self {
        Self {
            recipient,
            template,
            payload: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }
}

/// Trait describing the outbound notification hook (mailer, webhook, ...).
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, intent: NotificationIntent) -> Result<(), NotificationError>;
}

/// Notification dispatch error; logged, never propagated as an operation error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Caller-supplied paging window (1-based page index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

/// One page of a collection read, with totals for the caller's pager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn from_items(mut items: Vec<T>, request: PageRequest) -> Self {
        let page = request.page.max(1);
        let limit = request.limit.max(1);
        let total = items.len();
        let start = (page - 1).saturating_mul(limit).min(total);
        let end = start.saturating_add(limit).min(total);
        let items = items.drain(start..end).collect();
        Self {
            items,
            total,
            page,
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_windows_are_clamped_to_the_collection() {
        let page = Page::from_items(vec![1, 2, 3, 4, 5], PageRequest { page: 2, limit: 2 });
        assert_eq!(page.items, vec![3, 4]);
        assert_eq!(page.total, 5);

        let past_end = Page::from_items(vec![1, 2, 3], PageRequest { page: 9, limit: 2 });
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total, 3);

        let zeroes = Page::from_items(vec![1], PageRequest { page: 0, limit: 0 });
        assert_eq!(zeroes.items, vec![1]);
        assert_eq!(zeroes.page, 1);
        assert_eq!(zeroes.limit, 1);
    }
}
