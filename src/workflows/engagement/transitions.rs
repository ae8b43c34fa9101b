//! Per-entity status graphs. Each status domain owns a fixed adjacency
//! table; terminal states map to empty successor sets. Proposal signing is
//! gated by the signature coordinator rather than through this table, but
//! the acceptance edge still lives here so re-entrant fan-out attempts are
//! rejected as transition violations.

use super::domain::{AmendmentStatus, ProposalStatus, RequestStatus, StageStatus};
use super::error::EngagementError;

/// A closed status domain with an explicit transition table.
pub trait StatusGraph: Copy + PartialEq + Sized + 'static {
    const ENTITY: &'static str;

    fn graph_label(self) -> &'static str;
    fn successors(self) -> &'static [Self];
}

pub fn can_transition<S: StatusGraph>(current: S, next: S) -> bool {
    current.successors().contains(&next)
}

pub fn assert_transition<S: StatusGraph>(current: S, next: S) -> Result<(), EngagementError> {
    if can_transition(current, next) {
        Ok(())
    } else {
        Err(EngagementError::InvalidTransition {
            entity: S::ENTITY,
            from: current.graph_label(),
            to: next.graph_label(),
        })
    }
}

impl StatusGraph for RequestStatus {
    const ENTITY: &'static str = "request";

    fn graph_label(self) -> &'static str {
        self.label()
    }

    fn successors(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Reviewed, Self::Cancelled],
            Self::Reviewed => &[Self::Scheduled, Self::Cancelled],
            Self::Scheduled => &[Self::Active, Self::Completed, Self::Cancelled],
            Self::Active => &[Self::Completed, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
        }
    }
}

impl StatusGraph for ProposalStatus {
    const ENTITY: &'static str = "proposal";

    fn graph_label(self) -> &'static str {
        self.label()
    }

    fn successors(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::Sent],
            Self::Sent => &[Self::Viewed, Self::Accepted, Self::Rejected, Self::Expired],
            Self::Viewed => &[Self::Accepted, Self::Rejected, Self::Expired],
            Self::Accepted | Self::Rejected | Self::Expired => &[],
        }
    }
}

impl StatusGraph for StageStatus {
    const ENTITY: &'static str = "stage";

    fn graph_label(self) -> &'static str {
        self.label()
    }

    fn successors(self) -> &'static [Self] {
        match self {
            Self::NotStarted => &[Self::InProgress, Self::Completed, Self::OnHold],
            Self::InProgress => &[Self::Completed, Self::OnHold],
            Self::OnHold => &[Self::InProgress, Self::Completed],
            Self::Completed => &[],
        }
    }
}

impl StatusGraph for AmendmentStatus {
    const ENTITY: &'static str = "amendment";

    fn graph_label(self) -> &'static str {
        self.label()
    }

    fn successors(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Approved, Self::Rejected],
            Self::Approved => &[Self::UnderReview],
            Self::UnderReview => &[Self::Completed],
            Self::Rejected | Self::Completed => &[],
        }
    }
}
