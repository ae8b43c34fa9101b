//! Dual-party signing and the acceptance fan-out it triggers.
//!
//! A proposal moves to accepted at exactly one point: inside the signing
//! transaction, after the second signature slot is written. The fan-out
//! re-reads the slots from in-transaction state before branching, so a
//! racing second `sign` call is serialized by the store and observes either
//! an occupied slot or an already-accepted proposal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Actor, ProjectStage, Proposal, ProposalId, ProposalStatus, RequestId, RequestStatus,
    Signature, SignatureParty, StageStatus,
};
use super::error::EngagementError;
use super::repository::{NotificationIntent, TemplateKind};
use super::store::StoreState;
use super::transitions::assert_transition;

/// Signature material supplied by the signing party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInput {
    pub signer_name: String,
    pub payload: String,
}

/// Result of a `sign` call, reporting whether acceptance fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignOutcome {
    pub proposal: Proposal,
    pub accepted: bool,
    pub stages_created: usize,
}

/// Apply one party's signature. If both slots are populated afterwards,
/// acceptance fan-out runs inside the same transaction.
pub(crate) fn sign(
    state: &mut StoreState,
    proposal_id: ProposalId,
    party: SignatureParty,
    input: SignatureInput,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<(SignOutcome, Vec<NotificationIntent>), EngagementError> {
    if input.signer_name.trim().is_empty() || input.payload.trim().is_empty() {
        return Err(EngagementError::validation(
            "signature requires a signer name and payload",
        ));
    }

    let proposal = state.proposal(proposal_id)?;
    match party {
        SignatureParty::Owner => {
            if !actor.is_client(&proposal.client_identity) {
                return Err(EngagementError::forbidden(
                    "owner signature is reserved for the proposal's client",
                ));
            }
        }
        SignatureParty::Architect => {
            if !actor.is_manager() {
                return Err(EngagementError::forbidden(
                    "architect signature requires a manager-class staff member",
                ));
            }
        }
    }

    if !proposal.status.is_signable() {
        return Err(EngagementError::invalid_state(format!(
            "proposal {} is {} and cannot be signed",
            proposal.number,
            proposal.status.label()
        )));
    }
    if proposal.signature(party).is_some() {
        return Err(EngagementError::invalid_state(format!(
            "{} signature slot is already executed",
            party.label()
        )));
    }

    let signature = Signature {
        signer_name: input.signer_name,
        payload: input.payload,
        signed_at: now,
    };
    let proposal = state.proposal_mut(proposal_id)?;
    match party {
        SignatureParty::Owner => proposal.owner_signature = Some(signature),
        SignatureParty::Architect => proposal.architect_signature = Some(signature),
    }

    // Double-write guard: branch on the slots as they exist inside this
    // transaction, not on anything observed before it began.
    let fully_signed = state.proposal(proposal_id)?.fully_signed();
    let (stages_created, intents) = if fully_signed {
        accept_proposal(state, proposal_id, now)?
    } else {
        (0, Vec::new())
    };

    let proposal = state.proposal(proposal_id)?.clone();
    let accepted = proposal.status == ProposalStatus::Accepted;
    Ok((
        SignOutcome {
            proposal,
            accepted,
            stages_created,
        },
        intents,
    ))
}

/// Acceptance fan-out. All-or-nothing within the surrounding transaction:
/// status + `responded_at`, one stage per service line in line order, the
/// originating request advanced toward scheduled, and notification intents
/// for the client plus every active manager. A proposal that is already
/// accepted is a no-op so a racing trigger cannot duplicate stages.
pub(crate) fn accept_proposal(
    state: &mut StoreState,
    proposal_id: ProposalId,
    now: DateTime<Utc>,
) -> Result<(usize, Vec<NotificationIntent>), EngagementError> {
    let proposal = state.proposal(proposal_id)?;
    if proposal.status == ProposalStatus::Accepted {
        return Ok((0, Vec::new()));
    }
    assert_transition(proposal.status, ProposalStatus::Accepted)?;
    if !proposal.fully_signed() {
        return Err(EngagementError::invalid_state(
            "acceptance requires both signature slots to be executed",
        ));
    }

    let request_id = proposal.request_id;
    let number = proposal.number.clone();
    let client = proposal.client_identity.clone();
    let total = proposal.total;

    let proposal = state.proposal_mut(proposal_id)?;
    proposal.status = ProposalStatus::Accepted;
    proposal.responded_at = Some(now);

    let lines = state.service_lines_for(proposal_id);
    let stages_created = lines.len();
    for line in lines {
        let id = state.next_stage_id();
        state.insert_stage(ProjectStage {
            id,
            proposal_id,
            name: line.name,
            order: line.order,
            status: StageStatus::NotStarted,
            progress: 0,
            total_tasks: 0,
            completed_tasks: 0,
            assignee: None,
            started_at: None,
            due_on: None,
            completed_at: None,
            notes: Vec::new(),
        });
    }

    advance_request_toward_scheduled(state, request_id)?;

    let mut intents = Vec::new();
    let accepted_intent = |recipient| {
        NotificationIntent::new(recipient, TemplateKind::ProposalAccepted)
            .with("proposal_number", number.clone())
            .with("total", total.to_string())
            .with("stages", stages_created.to_string())
    };
    intents.push(accepted_intent(client));
    for manager in state.active_managers() {
        intents.push(accepted_intent(manager.id));
    }

    tracing::info!(proposal = %number, stages = stages_created, "proposal accepted");
    Ok((stages_created, intents))
}

/// Walk the originating request toward scheduled through the status graph.
/// Requests already at or past scheduled are left alone, so accepting an
/// amendment proposal never regresses an active or completed engagement.
fn advance_request_toward_scheduled(
    state: &mut StoreState,
    request_id: RequestId,
) -> Result<(), EngagementError> {
    let mut current = state.request(request_id)?.status;
    let path: &[RequestStatus] = match current {
        RequestStatus::Pending => &[RequestStatus::Reviewed, RequestStatus::Scheduled],
        RequestStatus::Reviewed => &[RequestStatus::Scheduled],
        RequestStatus::Scheduled
        | RequestStatus::Active
        | RequestStatus::Completed
        | RequestStatus::Cancelled => &[],
    };

    for &next in path {
        assert_transition(current, next)?;
        state.request_mut(request_id)?.status = next;
        current = next;
    }
    Ok(())
}
