//! Facade composing the engagement workflows over a transactional store
//! and a best-effort notification sink. Every mutation runs as one
//! transaction; intents queued by the workflow are delivered only after
//! the transaction commits, and a delivery failure downgrades the result
//! instead of failing it.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::amendments::{self, ReviewDecision};
use super::domain::{
    Actor, ActorId, AmendmentId, AmendmentRequest, ContactInfo, Credit, CreditId, CreditValue,
    IntakeRequest, Money, ProjectStage, Proposal, ProposalId, ProposalKind, ProposalStatus,
    RequestId, RequestStatus, ServiceCategory, ServiceLine, ServiceLineId, SignatureParty,
    StaffMember, StageId,
};
use super::error::EngagementError;
use super::financial;
use super::repository::{EngagementStore, NotificationIntent, NotificationSink, Page, PageRequest, TemplateKind};
use super::signing::{self, SignOutcome, SignatureInput};
use super::stages;
use super::transitions::assert_transition;

/// Tunables the facade needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct EngagementSettings {
    pub proposal_number_prefix: String,
    pub default_tax_rate_bps: u32,
}

impl Default for EngagementSettings {
    fn default() -> Self {
        Self {
            proposal_number_prefix: "PRO".to_string(),
            default_tax_rate_bps: 0,
        }
    }
}

/// Result envelope for state-mutating operations.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub data: T,
    pub message: String,
    /// True when the state change committed but one or more notification
    /// intents could not be handed to the sink.
    pub notifications_degraded: bool,
}

/// Payload for intake submission.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    pub contact: ContactInfo,
    pub category: ServiceCategory,
    pub project_location: String,
    pub details: String,
    pub client_identity: Option<ActorId>,
}

/// Payload for drafting a proposal against a request.
#[derive(Debug, Clone, Deserialize)]
pub struct ProposalDraft {
    pub request_id: RequestId,
    pub title: String,
    pub tax_rate_bps: Option<u32>,
    pub client_identity: Option<ActorId>,
}

/// Payload for adding a service line to a draft proposal.
#[derive(Debug, Clone, Deserialize)]
pub struct NewServiceLine {
    pub name: String,
    pub unit_amount: Money,
    pub quantity: u32,
}

/// Payload for adding a credit to a draft proposal.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCredit {
    pub description: String,
    pub value: CreditValue,
}

pub struct EngagementService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    settings: EngagementSettings,
}

impl<S, N> EngagementService<S, N>
where
    S: EngagementStore + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, settings: EngagementSettings) -> Self {
        Self {
            store,
            notifier,
            settings,
        }
    }

    /// Deliver intents after commit. Failures are logged and reported as a
    /// degraded success, never as the operation's error.
    fn dispatch<T>(&self, data: T, message: String, intents: Vec<NotificationIntent>) -> Outcome<T> {
        let mut degraded = false;
        for intent in intents {
            let template = intent.template;
            if let Err(err) = self.notifier.deliver(intent) {
                tracing::warn!(template = template.label(), error = %err, "notification delivery failed");
                degraded = true;
            }
        }
        Outcome {
            data,
            message,
            notifications_degraded: degraded,
        }
    }

    /// Sync one staff directory entry from the identity collaborator.
    pub fn sync_staff(&self, member: StaffMember) -> Result<Outcome<StaffMember>, EngagementError> {
        let stored = self.store.transaction(|state| {
            state.upsert_staff(member.clone());
            Ok(member.clone())
        })?;
        Ok(self.dispatch(stored, "staff directory updated".to_string(), Vec::new()))
    }

    // --- intake requests ---------------------------------------------------

    pub fn submit_request(&self, new: NewRequest) -> Result<Outcome<IntakeRequest>, EngagementError> {
        if new.contact.name.trim().is_empty() {
            return Err(EngagementError::validation("contact name is required"));
        }
        if !new.contact.email.contains('@') {
            return Err(EngagementError::validation("contact email is malformed"));
        }

        let request = self.store.transaction(|state| {
            let id = state.next_request_id();
            let request = IntakeRequest {
                id,
                contact: new.contact.clone(),
                category: new.category,
                project_location: new.project_location.clone(),
                details: new.details.clone(),
                client_identity: new.client_identity.clone(),
                status: RequestStatus::Pending,
                created_at: Utc::now(),
                deleted_at: None,
            };
            state.insert_request(request.clone());
            Ok(request)
        })?;
        Ok(self.dispatch(request, "request received".to_string(), Vec::new()))
    }

    pub fn review_request(
        &self,
        id: RequestId,
        actor: &Actor,
    ) -> Result<Outcome<IntakeRequest>, EngagementError> {
        self.advance_request(id, RequestStatus::Reviewed, actor, "request reviewed")
    }

    pub fn cancel_request(
        &self,
        id: RequestId,
        actor: &Actor,
    ) -> Result<Outcome<IntakeRequest>, EngagementError> {
        self.advance_request(id, RequestStatus::Cancelled, actor, "request cancelled")
    }

    fn advance_request(
        &self,
        id: RequestId,
        next: RequestStatus,
        actor: &Actor,
        message: &str,
    ) -> Result<Outcome<IntakeRequest>, EngagementError> {
        require_manager(actor, "request status changes")?;
        let request = self.store.transaction(|state| {
            let current = state.request(id)?.status;
            assert_transition(current, next)?;
            let request = state.request_mut(id)?;
            request.status = next;
            Ok(request.clone())
        })?;
        Ok(self.dispatch(request, message.to_string(), Vec::new()))
    }

    /// Soft-delete a settled request. The row survives but reads as missing.
    pub fn archive_request(
        &self,
        id: RequestId,
        actor: &Actor,
    ) -> Result<Outcome<RequestId>, EngagementError> {
        require_manager(actor, "request archival")?;
        let archived = self.store.transaction(|state| {
            let request = state.request(id)?;
            if !matches!(
                request.status,
                RequestStatus::Completed | RequestStatus::Cancelled
            ) {
                return Err(EngagementError::invalid_state(format!(
                    "only settled requests can be archived; request is {}",
                    request.status.label()
                )));
            }
            state.request_mut(id)?.deleted_at = Some(Utc::now());
            Ok(id)
        })?;
        Ok(self.dispatch(archived, "request archived".to_string(), Vec::new()))
    }

    pub fn list_requests(&self, page: PageRequest) -> Result<Page<IntakeRequest>, EngagementError> {
        self.store.read(|state| {
            let mut items: Vec<IntakeRequest> = state.requests().cloned().collect();
            items.sort_by_key(|request| request.created_at);
            Ok(Page::from_items(items, page))
        })
    }

    // --- proposal drafting -------------------------------------------------

    pub fn create_proposal(
        &self,
        draft: ProposalDraft,
        actor: &Actor,
    ) -> Result<Outcome<Proposal>, EngagementError> {
        require_manager(actor, "proposal drafting")?;
        let prefix = self.settings.proposal_number_prefix.clone();
        let default_tax = self.settings.default_tax_rate_bps;

        let proposal = self.store.transaction(move |state| {
            let request = state.request(draft.request_id)?.clone();
            if request.status == RequestStatus::Cancelled {
                return Err(EngagementError::invalid_state(
                    "cannot draft a proposal against a cancelled request",
                ));
            }
            let client_identity = draft
                .client_identity
                .or(request.client_identity)
                .ok_or_else(|| {
                    EngagementError::validation(
                        "proposal requires a client identity for the owner signature",
                    )
                })?;

            let now = Utc::now();
            let id = state.next_proposal_id();
            let number = state.next_proposal_number(&prefix, now.year());
            let proposal = Proposal {
                id,
                request_id: request.id,
                client_identity,
                number,
                title: draft.title,
                project_location: request.project_location,
                category: request.category,
                status: ProposalStatus::Draft,
                kind: ProposalKind::Normal,
                parent_id: None,
                owner_signature: None,
                architect_signature: None,
                subtotal: Money::ZERO,
                tax_rate_bps: draft.tax_rate_bps.unwrap_or(default_tax),
                tax_amount: Money::ZERO,
                total: Money::ZERO,
                created_at: now,
                sent_at: None,
                viewed_at: None,
                responded_at: None,
            };
            state.insert_proposal(proposal.clone());
            Ok(proposal)
        })?;
        let message = format!("proposal {} drafted", proposal.number);
        Ok(self.dispatch(proposal, message, Vec::new()))
    }

    pub fn add_service_line(
        &self,
        proposal_id: ProposalId,
        new: NewServiceLine,
        actor: &Actor,
    ) -> Result<Outcome<ServiceLine>, EngagementError> {
        require_manager(actor, "draft edits")?;
        if new.name.trim().is_empty() {
            return Err(EngagementError::validation("service line requires a name"));
        }
        if new.quantity == 0 {
            return Err(EngagementError::validation(
                "service line quantity must be at least 1",
            ));
        }
        if new.unit_amount < Money::ZERO {
            return Err(EngagementError::validation(
                "service line amount cannot be negative",
            ));
        }

        let line = self.store.transaction(move |state| {
            require_draft(state.proposal(proposal_id)?)?;
            let order = state.service_lines_for(proposal_id).len() as u32;
            let id = state.next_service_line_id();
            let line = ServiceLine {
                id,
                proposal_id,
                name: new.name,
                unit_amount: new.unit_amount,
                quantity: new.quantity,
                order,
            };
            state.insert_service_line(line.clone());
            financial::recalculate(state, proposal_id)?;
            Ok(line)
        })?;
        Ok(self.dispatch(line, "service line added".to_string(), Vec::new()))
    }

    pub fn remove_service_line(
        &self,
        proposal_id: ProposalId,
        line_id: ServiceLineId,
        actor: &Actor,
    ) -> Result<Outcome<Proposal>, EngagementError> {
        require_manager(actor, "draft edits")?;
        let proposal = self.store.transaction(move |state| {
            require_draft(state.proposal(proposal_id)?)?;
            let removed = state.remove_service_line(line_id)?;
            if removed.proposal_id != proposal_id {
                return Err(EngagementError::not_found("service line"));
            }
            financial::recalculate(state, proposal_id)?;
            Ok(state.proposal(proposal_id)?.clone())
        })?;
        Ok(self.dispatch(proposal, "service line removed".to_string(), Vec::new()))
    }

    pub fn add_credit(
        &self,
        proposal_id: ProposalId,
        new: NewCredit,
        actor: &Actor,
    ) -> Result<Outcome<Credit>, EngagementError> {
        require_manager(actor, "draft edits")?;
        match new.value {
            CreditValue::Dollar(amount) if amount < Money::ZERO => {
                return Err(EngagementError::validation("credit amount cannot be negative"));
            }
            CreditValue::PercentBps(bps) if bps > 10_000 => {
                return Err(EngagementError::validation(
                    "percent credit cannot exceed 100%",
                ));
            }
            _ => {}
        }

        let credit = self.store.transaction(move |state| {
            require_draft(state.proposal(proposal_id)?)?;
            let id = state.next_credit_id();
            let credit = Credit {
                id,
                proposal_id,
                description: new.description,
                value: new.value,
            };
            state.insert_credit(credit.clone());
            financial::recalculate(state, proposal_id)?;
            Ok(credit)
        })?;
        Ok(self.dispatch(credit, "credit added".to_string(), Vec::new()))
    }

    pub fn remove_credit(
        &self,
        proposal_id: ProposalId,
        credit_id: CreditId,
        actor: &Actor,
    ) -> Result<Outcome<Proposal>, EngagementError> {
        require_manager(actor, "draft edits")?;
        let proposal = self.store.transaction(move |state| {
            require_draft(state.proposal(proposal_id)?)?;
            let removed = state.remove_credit(credit_id)?;
            if removed.proposal_id != proposal_id {
                return Err(EngagementError::not_found("credit"));
            }
            financial::recalculate(state, proposal_id)?;
            Ok(state.proposal(proposal_id)?.clone())
        })?;
        Ok(self.dispatch(proposal, "credit removed".to_string(), Vec::new()))
    }

    // --- proposal lifecycle ------------------------------------------------

    pub fn send_proposal(
        &self,
        proposal_id: ProposalId,
        actor: &Actor,
    ) -> Result<Outcome<Proposal>, EngagementError> {
        require_manager(actor, "sending proposals")?;
        let (proposal, intents) = self.store.transaction(move |state| {
            let proposal = state.proposal(proposal_id)?;
            assert_transition(proposal.status, ProposalStatus::Sent)?;
            if state.service_lines_for(proposal_id).is_empty() {
                return Err(EngagementError::invalid_state(
                    "a proposal needs at least one service line before it can be sent",
                ));
            }

            let proposal = state.proposal_mut(proposal_id)?;
            proposal.status = ProposalStatus::Sent;
            proposal.sent_at = Some(Utc::now());
            let proposal = proposal.clone();

            let intent = NotificationIntent::new(
                proposal.client_identity.clone(),
                TemplateKind::ProposalSent,
            )
            .with("proposal_number", proposal.number.clone())
            .with("total", proposal.total.to_string());
            Ok((proposal, vec![intent]))
        })?;
        let message = format!("proposal {} sent", proposal.number);
        Ok(self.dispatch(proposal, message, intents))
    }

    /// Record that the client opened the proposal. Re-opening an already
    /// viewed proposal is a no-op rather than a transition violation.
    pub fn mark_viewed(
        &self,
        proposal_id: ProposalId,
        actor: &Actor,
    ) -> Result<Outcome<Proposal>, EngagementError> {
        let proposal = self.store.transaction(move |state| {
            let proposal = state.proposal(proposal_id)?;
            if !actor.is_client(&proposal.client_identity) {
                return Err(EngagementError::forbidden(
                    "only the proposal's client can record a view",
                ));
            }
            if proposal.status == ProposalStatus::Viewed {
                return Ok(proposal.clone());
            }
            assert_transition(proposal.status, ProposalStatus::Viewed)?;
            let proposal = state.proposal_mut(proposal_id)?;
            proposal.status = ProposalStatus::Viewed;
            proposal.viewed_at = Some(Utc::now());
            Ok(proposal.clone())
        })?;
        Ok(self.dispatch(proposal, "proposal viewed".to_string(), Vec::new()))
    }

    /// Client declines the proposal outright.
    pub fn decline_proposal(
        &self,
        proposal_id: ProposalId,
        actor: &Actor,
    ) -> Result<Outcome<Proposal>, EngagementError> {
        let proposal = self.store.transaction(move |state| {
            let proposal = state.proposal(proposal_id)?;
            if !actor.is_client(&proposal.client_identity) {
                return Err(EngagementError::forbidden(
                    "only the proposal's client can decline it",
                ));
            }
            assert_transition(proposal.status, ProposalStatus::Rejected)?;
            let proposal = state.proposal_mut(proposal_id)?;
            proposal.status = ProposalStatus::Rejected;
            proposal.responded_at = Some(Utc::now());
            Ok(proposal.clone())
        })?;
        let message = format!("proposal {} declined", proposal.number);
        Ok(self.dispatch(proposal, message, Vec::new()))
    }

    /// Staff retires a proposal the client never answered.
    pub fn expire_proposal(
        &self,
        proposal_id: ProposalId,
        actor: &Actor,
    ) -> Result<Outcome<Proposal>, EngagementError> {
        require_manager(actor, "expiring proposals")?;
        let proposal = self.store.transaction(move |state| {
            let proposal = state.proposal(proposal_id)?;
            assert_transition(proposal.status, ProposalStatus::Expired)?;
            let proposal = state.proposal_mut(proposal_id)?;
            proposal.status = ProposalStatus::Expired;
            proposal.responded_at = Some(Utc::now());
            Ok(proposal.clone())
        })?;
        let message = format!("proposal {} expired", proposal.number);
        Ok(self.dispatch(proposal, message, Vec::new()))
    }

    pub fn sign_proposal(
        &self,
        proposal_id: ProposalId,
        party: SignatureParty,
        input: SignatureInput,
        actor: &Actor,
    ) -> Result<Outcome<SignOutcome>, EngagementError> {
        let (outcome, intents) = self
            .store
            .transaction(move |state| signing::sign(state, proposal_id, party, input, actor, Utc::now()))?;
        let message = if outcome.accepted {
            format!("proposal {} accepted", outcome.proposal.number)
        } else {
            format!("{} signature recorded", party.label())
        };
        Ok(self.dispatch(outcome, message, intents))
    }

    pub fn get_proposal(&self, proposal_id: ProposalId) -> Result<Proposal, EngagementError> {
        self.store.read(|state| state.proposal(proposal_id).cloned())
    }

    pub fn list_proposals(
        &self,
        request_id: Option<RequestId>,
        page: PageRequest,
    ) -> Result<Page<Proposal>, EngagementError> {
        self.store.read(|state| {
            let mut items: Vec<Proposal> = state
                .proposals()
                .filter(|proposal| request_id.map_or(true, |id| proposal.request_id == id))
                .cloned()
                .collect();
            items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            Ok(Page::from_items(items, page))
        })
    }

    /// Root proposal plus every amendment proposal, ordered by creation.
    pub fn proposal_tree(&self, proposal_id: ProposalId) -> Result<Vec<Proposal>, EngagementError> {
        self.store.read(|state| state.proposal_tree(proposal_id))
    }

    // --- amendments --------------------------------------------------------

    pub fn create_amendment_request(
        &self,
        parent_id: ProposalId,
        details: String,
        requester: &Actor,
    ) -> Result<Outcome<AmendmentRequest>, EngagementError> {
        let (amendment, intents) = self.store.transaction(move |state| {
            amendments::create_amendment_request(state, parent_id, details, requester, Utc::now())
        })?;
        Ok(self.dispatch(amendment, "amendment request received".to_string(), intents))
    }

    pub fn review_amendment(
        &self,
        amendment_id: AmendmentId,
        decision: ReviewDecision,
        reviewer: &Actor,
    ) -> Result<Outcome<AmendmentRequest>, EngagementError> {
        let (amendment, intents) = self.store.transaction(move |state| {
            amendments::review_amendment(state, amendment_id, decision, reviewer, Utc::now())
        })?;
        let message = format!("amendment {}", amendment.status.label());
        Ok(self.dispatch(amendment, message, intents))
    }

    pub fn create_proposal_from_amendment(
        &self,
        amendment_id: AmendmentId,
        title: String,
        actor: &Actor,
    ) -> Result<Outcome<Proposal>, EngagementError> {
        let prefix = self.settings.proposal_number_prefix.clone();
        let proposal = self.store.transaction(move |state| {
            amendments::create_proposal_from_amendment(
                state,
                amendment_id,
                title,
                actor,
                &prefix,
                Utc::now(),
            )
        })?;
        let message = format!("amendment proposal {} drafted", proposal.number);
        Ok(self.dispatch(proposal, message, Vec::new()))
    }

    pub fn complete_amendment(
        &self,
        amendment_id: AmendmentId,
        actor: &Actor,
    ) -> Result<Outcome<AmendmentRequest>, EngagementError> {
        let amendment = self.store.transaction(move |state| {
            amendments::complete_amendment(state, amendment_id, actor, Utc::now())
        })?;
        Ok(self.dispatch(amendment, "amendment completed".to_string(), Vec::new()))
    }

    pub fn list_amendments(
        &self,
        proposal_id: ProposalId,
        page: PageRequest,
    ) -> Result<Page<AmendmentRequest>, EngagementError> {
        self.store.read(|state| {
            state.proposal(proposal_id)?;
            Ok(Page::from_items(state.amendments_for(proposal_id), page))
        })
    }

    // --- stages ------------------------------------------------------------

    pub fn set_stage_progress(
        &self,
        stage_id: StageId,
        progress: u32,
        completed_tasks: Option<u32>,
        note: Option<String>,
        actor: &Actor,
    ) -> Result<Outcome<ProjectStage>, EngagementError> {
        let (stage, intents) = self.store.transaction(move |state| {
            stages::set_stage_progress(
                state,
                stage_id,
                progress,
                completed_tasks,
                note,
                actor,
                Utc::now(),
            )
        })?;
        Ok(self.dispatch(stage, "stage progress updated".to_string(), intents))
    }

    pub fn complete_stage(
        &self,
        stage_id: StageId,
        actor: &Actor,
    ) -> Result<Outcome<ProjectStage>, EngagementError> {
        let (stage, intents) = self
            .store
            .transaction(move |state| stages::complete_stage(state, stage_id, actor, Utc::now()))?;
        Ok(self.dispatch(stage, "stage completed".to_string(), intents))
    }

    /// Hand a stage to a staff member and optionally pin its due date.
    pub fn assign_stage(
        &self,
        stage_id: StageId,
        assignee: ActorId,
        due_on: Option<NaiveDate>,
        actor: &Actor,
    ) -> Result<Outcome<ProjectStage>, EngagementError> {
        require_manager(actor, "stage assignment")?;
        let stage = self.store.transaction(move |state| {
            let stage = state.stage_mut(stage_id)?;
            stage.assignee = Some(assignee);
            if due_on.is_some() {
                stage.due_on = due_on;
            }
            Ok(stage.clone())
        })?;
        Ok(self.dispatch(stage, "stage assigned".to_string(), Vec::new()))
    }

    pub fn stages_for(&self, proposal_id: ProposalId) -> Result<Vec<ProjectStage>, EngagementError> {
        self.store.read(|state| {
            state.proposal(proposal_id)?;
            Ok(state.stages_for(proposal_id))
        })
    }
}

fn require_manager(actor: &Actor, operation: &str) -> Result<(), EngagementError> {
    if actor.is_manager() {
        Ok(())
    } else {
        Err(EngagementError::forbidden(format!(
            "{operation} require a manager-class staff member"
        )))
    }
}

fn require_draft(proposal: &Proposal) -> Result<(), EngagementError> {
    if proposal.status == ProposalStatus::Draft {
        Ok(())
    } else {
        Err(EngagementError::invalid_state(format!(
            "proposal {} is {}; content is immutable after drafting",
            proposal.number,
            proposal.status.label()
        )))
    }
}
