use std::collections::BTreeMap;
use std::sync::Mutex;

use super::domain::{
    is_manager_role, ActorId, AmendmentId, AmendmentRequest, Credit, CreditId, IntakeRequest,
    ProjectStage, Proposal, ProposalId, RequestId, ServiceLine, ServiceLineId, StaffMember,
    StageId,
};
use super::error::EngagementError;
use super::repository::{EngagementStore, RepositoryError};

/// The full relational snapshot a transaction operates on. Reads inside a
/// transaction observe the transaction's own writes, which is what the
/// signature coordinator's re-read guard relies on.
#[derive(Debug, Default, Clone)]
pub struct StoreState {
    requests: BTreeMap<RequestId, IntakeRequest>,
    proposals: BTreeMap<ProposalId, Proposal>,
    service_lines: BTreeMap<ServiceLineId, ServiceLine>,
    credits: BTreeMap<CreditId, Credit>,
    stages: BTreeMap<StageId, ProjectStage>,
    amendments: BTreeMap<AmendmentId, AmendmentRequest>,
    staff: BTreeMap<ActorId, StaffMember>,
    proposal_sequences: BTreeMap<i32, u32>,
    next_id: u64,
}

impl StoreState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn next_request_id(&mut self) -> RequestId {
        RequestId(self.allocate_id())
    }

    pub fn next_proposal_id(&mut self) -> ProposalId {
        ProposalId(self.allocate_id())
    }

    pub fn next_service_line_id(&mut self) -> ServiceLineId {
        ServiceLineId(self.allocate_id())
    }

    pub fn next_credit_id(&mut self) -> CreditId {
        CreditId(self.allocate_id())
    }

    pub fn next_stage_id(&mut self) -> StageId {
        StageId(self.allocate_id())
    }

    pub fn next_amendment_id(&mut self) -> AmendmentId {
        AmendmentId(self.allocate_id())
    }

    /// Allocate the next human-readable proposal number for a year.
    pub fn next_proposal_number(&mut self, prefix: &str, year: i32) -> String {
        let sequence = self.proposal_sequences.entry(year).or_insert(0);
        *sequence += 1;
        format!("{prefix}-{year}-{sequence:04}")
    }

    pub fn insert_request(&mut self, request: IntakeRequest) {
        self.requests.insert(request.id, request);
    }

    /// Fetch a request, treating soft-deleted rows as missing.
    pub fn request(&self, id: RequestId) -> Result<&IntakeRequest, EngagementError> {
        self.requests
            .get(&id)
            .filter(|request| request.deleted_at.is_none())
            .ok_or(EngagementError::not_found("request"))
    }

    pub fn request_mut(&mut self, id: RequestId) -> Result<&mut IntakeRequest, EngagementError> {
        self.requests
            .get_mut(&id)
            .filter(|request| request.deleted_at.is_none())
            .ok_or(EngagementError::not_found("request"))
    }

    pub fn requests(&self) -> impl Iterator<Item = &IntakeRequest> {
        self.requests
            .values()
            .filter(|request| request.deleted_at.is_none())
    }

    pub fn insert_proposal(&mut self, proposal: Proposal) {
        self.proposals.insert(proposal.id, proposal);
    }

    pub fn proposal(&self, id: ProposalId) -> Result<&Proposal, EngagementError> {
        self.proposals
            .get(&id)
            .ok_or(EngagementError::not_found("proposal"))
    }

    pub fn proposal_mut(&mut self, id: ProposalId) -> Result<&mut Proposal, EngagementError> {
        self.proposals
            .get_mut(&id)
            .ok_or(EngagementError::not_found("proposal"))
    }

    pub fn proposals(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    /// Root proposal plus all amendment children, ordered by creation time.
    pub fn proposal_tree(&self, id: ProposalId) -> Result<Vec<Proposal>, EngagementError> {
        let proposal = self.proposal(id)?;
        let root_id = proposal.parent_id.unwrap_or(proposal.id);
        let root = self.proposal(root_id)?.clone();

        let mut tree: Vec<Proposal> = self
            .proposals
            .values()
            .filter(|candidate| candidate.parent_id == Some(root_id))
            .cloned()
            .collect();
        tree.push(root);
        tree.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tree)
    }

    pub fn insert_service_line(&mut self, line: ServiceLine) {
        self.service_lines.insert(line.id, line);
    }

    /// Service lines for a proposal in ascending display order.
    pub fn service_lines_for(&self, proposal_id: ProposalId) -> Vec<ServiceLine> {
        let mut lines: Vec<ServiceLine> = self
            .service_lines
            .values()
            .filter(|line| line.proposal_id == proposal_id)
            .cloned()
            .collect();
        lines.sort_by_key(|line| line.order);
        lines
    }

    /// Remove a line and close the order gap so orders stay dense.
    pub fn remove_service_line(&mut self, id: ServiceLineId) -> Result<ServiceLine, EngagementError> {
        let removed = self
            .service_lines
            .remove(&id)
            .ok_or(EngagementError::not_found("service line"))?;
        for line in self.service_lines.values_mut() {
            if line.proposal_id == removed.proposal_id && line.order > removed.order {
                line.order -= 1;
            }
        }
        Ok(removed)
    }

    pub fn insert_credit(&mut self, credit: Credit) {
        self.credits.insert(credit.id, credit);
    }

    pub fn credits_for(&self, proposal_id: ProposalId) -> Vec<Credit> {
        self.credits
            .values()
            .filter(|credit| credit.proposal_id == proposal_id)
            .cloned()
            .collect()
    }

    pub fn remove_credit(&mut self, id: CreditId) -> Result<Credit, EngagementError> {
        self.credits
            .remove(&id)
            .ok_or(EngagementError::not_found("credit"))
    }

    pub fn insert_stage(&mut self, stage: ProjectStage) {
        self.stages.insert(stage.id, stage);
    }

    pub fn stage(&self, id: StageId) -> Result<&ProjectStage, EngagementError> {
        self.stages
            .get(&id)
            .ok_or(EngagementError::not_found("stage"))
    }

    pub fn stage_mut(&mut self, id: StageId) -> Result<&mut ProjectStage, EngagementError> {
        self.stages
            .get_mut(&id)
            .ok_or(EngagementError::not_found("stage"))
    }

    /// Stages for a proposal in ascending order.
    pub fn stages_for(&self, proposal_id: ProposalId) -> Vec<ProjectStage> {
        let mut stages: Vec<ProjectStage> = self
            .stages
            .values()
            .filter(|stage| stage.proposal_id == proposal_id)
            .cloned()
            .collect();
        stages.sort_by_key(|stage| stage.order);
        stages
    }

    pub fn insert_amendment(&mut self, amendment: AmendmentRequest) {
        self.amendments.insert(amendment.id, amendment);
    }

    pub fn amendment(&self, id: AmendmentId) -> Result<&AmendmentRequest, EngagementError> {
        self.amendments
            .get(&id)
            .ok_or(EngagementError::not_found("amendment"))
    }

    pub fn amendment_mut(
        &mut self,
        id: AmendmentId,
    ) -> Result<&mut AmendmentRequest, EngagementError> {
        self.amendments
            .get_mut(&id)
            .ok_or(EngagementError::not_found("amendment"))
    }

    pub fn amendments_for(&self, proposal_id: ProposalId) -> Vec<AmendmentRequest> {
        let mut amendments: Vec<AmendmentRequest> = self
            .amendments
            .values()
            .filter(|amendment| amendment.proposal_id == proposal_id)
            .cloned()
            .collect();
        amendments.sort_by_key(|amendment| amendment.created_at);
        amendments
    }

    pub fn upsert_staff(&mut self, member: StaffMember) {
        self.staff.insert(member.id.clone(), member);
    }

    /// Active manager-class staff, the audience for acceptance notifications.
    pub fn active_managers(&self) -> Vec<StaffMember> {
        self.staff
            .values()
            .filter(|member| member.active && is_manager_role(member.role))
            .cloned()
            .collect()
    }
}

/// In-memory store. A transaction clones the state under the mutex, applies
/// the closure to the copy, and swaps it in only when the closure succeeds,
/// so a failing step can never leave partial writes behind. The mutex also
/// serializes racing transactions, which is what keeps double-signature
/// detection single-fire.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EngagementStore for MemoryStore {
    fn transaction<T, F>(&self, f: F) -> Result<T, EngagementError>
    where
        F: FnOnce(&mut StoreState) -> Result<T, EngagementError>,
    {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("state lock poisoned".to_string()))?;
        let mut working = guard.clone();
        let value = f(&mut working)?;
        *guard = working;
        Ok(value)
    }

    fn read<T, F>(&self, f: F) -> Result<T, EngagementError>
    where
        F: FnOnce(&StoreState) -> Result<T, EngagementError>,
    {
        let guard = self
            .state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("state lock poisoned".to_string()))?;
        f(&guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::engagement::domain::{
        ActorId, ContactInfo, IntakeRequest, RequestStatus, ServiceCategory,
    };
    use chrono::Utc;

    fn request(state: &mut StoreState) -> RequestId {
        let id = state.next_request_id();
        state.insert_request(IntakeRequest {
            id,
            contact: ContactInfo {
                name: "Dana Webb".to_string(),
                email: "dana@example.com".to_string(),
                phone: None,
            },
            category: ServiceCategory::Renovation,
            project_location: "412 Grand Ave".to_string(),
            details: "Kitchen renovation".to_string(),
            client_identity: Some(ActorId("client-dana".to_string())),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            deleted_at: None,
        });
        id
    }

    #[test]
    fn failed_transaction_rolls_back_every_write() {
        let store = MemoryStore::new();
        let result: Result<(), EngagementError> = store.transaction(|state| {
            request(state);
            Err(EngagementError::validation("boom"))
        });
        assert!(result.is_err());

        let count = store
            .read(|state| Ok(state.requests().count()))
            .expect("read");
        assert_eq!(count, 0);
    }

    #[test]
    fn soft_deleted_requests_read_as_missing() {
        let store = MemoryStore::new();
        let id = store
            .transaction(|state| Ok(request(state)))
            .expect("insert");

        store
            .transaction(|state| {
                state.request_mut(id)?.deleted_at = Some(Utc::now());
                Ok(())
            })
            .expect("archive");

        let err = store
            .read(|state| state.request(id).map(|_| ()))
            .expect_err("archived request must read as missing");
        assert!(matches!(err, EngagementError::NotFound { entity: "request" }));
    }

    #[test]
    fn proposal_numbers_are_scoped_by_year() {
        let mut state = StoreState::default();
        assert_eq!(state.next_proposal_number("PRO", 2026), "PRO-2026-0001");
        assert_eq!(state.next_proposal_number("PRO", 2026), "PRO-2026-0002");
        assert_eq!(state.next_proposal_number("PRO", 2027), "PRO-2027-0001");
    }

    #[test]
    fn removing_a_line_keeps_orders_dense() {
        use crate::workflows::engagement::domain::{Money, ProposalId, ServiceLine};

        let mut state = StoreState::default();
        let proposal_id = ProposalId(1);
        let mut ids = Vec::new();
        for order in 0..3 {
            let id = state.next_service_line_id();
            ids.push(id);
            state.insert_service_line(ServiceLine {
                id,
                proposal_id,
                name: format!("Phase {order}"),
                unit_amount: Money(10_000),
                quantity: 1,
                order,
            });
        }

        state.remove_service_line(ids[1]).expect("line removed");
        let orders: Vec<u32> = state
            .service_lines_for(proposal_id)
            .iter()
            .map(|line| line.order)
            .collect();
        assert_eq!(orders, vec![0, 1]);
    }
}
