//! Client engagement lifecycle: intake → proposal → dual signature →
//! stage generation → progress tracking → amendments.

pub(crate) mod amendments;
pub mod domain;
pub mod error;
pub(crate) mod financial;
pub mod repository;
pub mod router;
pub mod service;
pub(crate) mod signing;
pub(crate) mod stages;
pub mod store;
pub mod transitions;

pub use amendments::ReviewDecision;
pub use domain::{
    is_manager_role, Actor, ActorId, AmendmentId, AmendmentRequest, AmendmentStatus, ContactInfo,
    Credit, CreditId, CreditValue, IntakeRequest, Money, ProjectStage, Proposal, ProposalId,
    ProposalKind, ProposalStatus, RequestId, RequestStatus, ServiceCategory, ServiceLine,
    ServiceLineId, Signature, SignatureParty, StaffMember, StaffRole, StageId, StageNote,
    StageStatus,
};
pub use error::EngagementError;
pub use financial::FinancialBreakdown;
pub use repository::{
    EngagementStore, NotificationError, NotificationIntent, NotificationSink, Page, PageRequest,
    RepositoryError, TemplateKind,
};
pub use router::engagement_router;
pub use service::{
    EngagementService, EngagementSettings, NewCredit, NewRequest, NewServiceLine, Outcome,
    ProposalDraft,
};
pub use signing::{SignOutcome, SignatureInput};
pub use store::{MemoryStore, StoreState};
pub use transitions::{assert_transition, can_transition, StatusGraph};
