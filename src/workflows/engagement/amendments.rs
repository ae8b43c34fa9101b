//! Client-initiated change requests against an accepted proposal, and
//! their promotion into child amendment proposals. A promoted proposal
//! re-enters the ordinary draft → sent → signature lifecycle and produces
//! its own stage set on acceptance.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Actor, AmendmentId, AmendmentRequest, AmendmentStatus, Money, Proposal, ProposalId,
    ProposalKind, ProposalStatus,
};
use super::error::EngagementError;
use super::repository::{NotificationIntent, TemplateKind};
use super::store::StoreState;
use super::transitions::assert_transition;

/// Reviewer verdict on a pending amendment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

pub(crate) fn create_amendment_request(
    state: &mut StoreState,
    parent_id: ProposalId,
    details: String,
    requester: &Actor,
    now: DateTime<Utc>,
) -> Result<(AmendmentRequest, Vec<NotificationIntent>), EngagementError> {
    if details.trim().is_empty() {
        return Err(EngagementError::validation(
            "amendment request requires a description of the change",
        ));
    }

    let parent = state.proposal(parent_id)?;
    if !requester.is_client(&parent.client_identity) && !requester.is_manager() {
        return Err(EngagementError::forbidden(
            "amendments may be requested by the proposal's client or a manager",
        ));
    }
    if parent.status != ProposalStatus::Accepted {
        return Err(EngagementError::invalid_state(format!(
            "amendments require an accepted proposal; {} is {}",
            parent.number,
            parent.status.label()
        )));
    }

    let number = parent.number.clone();
    let id = state.next_amendment_id();
    let amendment = AmendmentRequest {
        id,
        proposal_id: parent_id,
        details,
        status: AmendmentStatus::Pending,
        requested_by: requester.id().clone(),
        reviewed_by: None,
        reviewed_at: None,
        amendment_proposal_id: None,
        completed_by: None,
        completed_at: None,
        created_at: now,
    };
    state.insert_amendment(amendment.clone());

    let intents = state
        .active_managers()
        .into_iter()
        .map(|manager| {
            NotificationIntent::new(manager.id, TemplateKind::AmendmentRequested)
                .with("proposal_number", number.clone())
                .with("amendment_id", amendment.id.0.to_string())
        })
        .collect();

    Ok((amendment, intents))
}

pub(crate) fn review_amendment(
    state: &mut StoreState,
    amendment_id: AmendmentId,
    decision: ReviewDecision,
    reviewer: &Actor,
    now: DateTime<Utc>,
) -> Result<(AmendmentRequest, Vec<NotificationIntent>), EngagementError> {
    if !reviewer.is_manager() {
        return Err(EngagementError::forbidden(
            "amendment review requires a manager-class staff member",
        ));
    }

    let amendment = state.amendment(amendment_id)?;
    if amendment.status != AmendmentStatus::Pending {
        return Err(EngagementError::AlreadyReviewed);
    }

    let next = match decision {
        ReviewDecision::Approve => AmendmentStatus::Approved,
        ReviewDecision::Reject => AmendmentStatus::Rejected,
    };
    assert_transition(amendment.status, next)?;

    let amendment = state.amendment_mut(amendment_id)?;
    amendment.status = next;
    amendment.reviewed_by = Some(reviewer.id().clone());
    amendment.reviewed_at = Some(now);
    let amendment = amendment.clone();

    let intents = vec![NotificationIntent::new(
        amendment.requested_by.clone(),
        TemplateKind::AmendmentReviewed,
    )
    .with("amendment_id", amendment.id.0.to_string())
    .with("decision", next.label())];

    Ok((amendment, intents))
}

/// Promote an approved amendment into a child proposal. Stable fields come
/// from the parent; the new proposal starts as an empty draft and follows
/// the normal lifecycle from there. The amendment keeps exactly one link
/// for its whole life, so a second promotion attempt is rejected.
pub(crate) fn create_proposal_from_amendment(
    state: &mut StoreState,
    amendment_id: AmendmentId,
    title: String,
    actor: &Actor,
    number_prefix: &str,
    now: DateTime<Utc>,
) -> Result<Proposal, EngagementError> {
    if !actor.is_manager() {
        return Err(EngagementError::forbidden(
            "amendment promotion requires a manager-class staff member",
        ));
    }

    let amendment = state.amendment(amendment_id)?;
    if amendment.amendment_proposal_id.is_some() {
        return Err(EngagementError::validation(
            "amendment is already linked to a proposal",
        ));
    }
    if amendment.status != AmendmentStatus::Approved {
        return Err(EngagementError::invalid_state(format!(
            "amendment is {}; only approved amendments can be promoted",
            amendment.status.label()
        )));
    }

    let parent = state.proposal(amendment.proposal_id)?.clone();
    // Amendments of amendment proposals still hang off the root so the
    // proposal tree stays one level deep.
    let root_id = parent.parent_id.unwrap_or(parent.id);

    let id = state.next_proposal_id();
    let number = state.next_proposal_number(number_prefix, now.year());
    let proposal = Proposal {
        id,
        request_id: parent.request_id,
        client_identity: parent.client_identity,
        number,
        title,
        project_location: parent.project_location,
        category: parent.category,
        status: ProposalStatus::Draft,
        kind: ProposalKind::Amendment,
        parent_id: Some(root_id),
        owner_signature: None,
        architect_signature: None,
        subtotal: Money::ZERO,
        tax_rate_bps: parent.tax_rate_bps,
        tax_amount: Money::ZERO,
        total: Money::ZERO,
        created_at: now,
        sent_at: None,
        viewed_at: None,
        responded_at: None,
    };
    state.insert_proposal(proposal.clone());

    let amendment = state.amendment_mut(amendment_id)?;
    assert_transition(amendment.status, AmendmentStatus::UnderReview)?;
    amendment.status = AmendmentStatus::UnderReview;
    amendment.amendment_proposal_id = Some(proposal.id);

    Ok(proposal)
}

pub(crate) fn complete_amendment(
    state: &mut StoreState,
    amendment_id: AmendmentId,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<AmendmentRequest, EngagementError> {
    if !actor.is_manager() {
        return Err(EngagementError::forbidden(
            "amendment completion requires a manager-class staff member",
        ));
    }

    let amendment = state.amendment(amendment_id)?;
    let linked = amendment.amendment_proposal_id.ok_or_else(|| {
        EngagementError::PrerequisiteNotMet(
            "amendment has no generated proposal to complete against".to_string(),
        )
    })?;
    let linked_status = state.proposal(linked)?.status;
    if linked_status != ProposalStatus::Accepted {
        return Err(EngagementError::PrerequisiteNotMet(format!(
            "amendment proposal is {}; it must be accepted first",
            linked_status.label()
        )));
    }

    let current = state.amendment(amendment_id)?.status;
    assert_transition(current, AmendmentStatus::Completed)?;

    let amendment = state.amendment_mut(amendment_id)?;
    amendment.status = AmendmentStatus::Completed;
    amendment.completed_by = Some(actor.id().clone());
    amendment.completed_at = Some(now);
    Ok(amendment.clone())
}
