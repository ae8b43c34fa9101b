use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier for a client intake request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// Identifier for a proposal (root or amendment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub u64);

/// Identifier for a proposal service line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceLineId(pub u64);

/// Identifier for a proposal credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CreditId(pub u64);

/// Identifier for a project stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StageId(pub u64);

/// Identifier for an amendment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AmendmentId(pub u64);

/// Opaque identity handed to the core by the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monetary value in integer cents. Derived figures round half up.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Self = Self(0);

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Apply a basis-point rate to this amount, rounding half up.
    pub fn at_bps(self, bps: u32) -> Money {
        let scaled = i128::from(self.0) * i128::from(bps);
        let rounded = if scaled >= 0 {
            (scaled + 5_000) / 10_000
        } else {
            (scaled - 5_000) / 10_000
        };
        Money(rounded as i64)
    }

    pub fn times(self, quantity: u32) -> Money {
        Money(self.0 * i64::from(quantity))
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, item| acc + item)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dollars = self.0 / 100;
        let cents = (self.0 % 100).abs();
        write!(f, "${dollars}.{cents:02}")
    }
}

/// Staff roles recognized by the studio directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Principal,
    ProjectManager,
    OfficeAdmin,
    Architect,
    Drafter,
}

impl StaffRole {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Principal => "Principal",
            Self::ProjectManager => "Project Manager",
            Self::OfficeAdmin => "Office Admin",
            Self::Architect => "Architect",
            Self::Drafter => "Drafter",
        }
    }
}

/// Roles allowed to review requests, send proposals, and countersign them.
pub const fn is_manager_role(role: StaffRole) -> bool {
    matches!(
        role,
        StaffRole::Principal | StaffRole::ProjectManager | StaffRole::OfficeAdmin
    )
}

/// Pre-authenticated caller identity; the core only checks role and ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    Staff { id: ActorId, role: StaffRole },
    Client { id: ActorId },
}

impl Actor {
    pub fn id(&self) -> &ActorId {
        match self {
            Actor::Staff { id, .. } | Actor::Client { id } => id,
        }
    }

    pub fn is_manager(&self) -> bool {
        matches!(self, Actor::Staff { role, .. } if is_manager_role(*role))
    }

    pub fn is_client(&self, client: &ActorId) -> bool {
        matches!(self, Actor::Client { id } if id == client)
    }
}

/// Entry in the staff directory used to address manager notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: ActorId,
    pub name: String,
    pub role: StaffRole,
    pub active: bool,
}

/// Service categories offered at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    NewConstruction,
    Renovation,
    Addition,
    InteriorDesign,
    Consultation,
}

impl ServiceCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NewConstruction => "New Construction",
            Self::Renovation => "Renovation",
            Self::Addition => "Addition",
            Self::InteriorDesign => "Interior Design",
            Self::Consultation => "Consultation",
        }
    }
}

/// Lifecycle of a client intake request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Reviewed,
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reviewed => "reviewed",
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Lifecycle of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Draft,
    Sent,
    Viewed,
    Accepted,
    Rejected,
    Expired,
}

impl ProposalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Viewed => "viewed",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    /// Signature slots may only be written while the client can still respond.
    pub const fn is_signable(self) -> bool {
        matches!(self, Self::Sent | Self::Viewed)
    }
}

/// Lifecycle of a project stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    NotStarted,
    InProgress,
    Completed,
    OnHold,
}

impl StageStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::OnHold => "on_hold",
        }
    }
}

/// Lifecycle of an amendment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmendmentStatus {
    Pending,
    Approved,
    Rejected,
    UnderReview,
    Completed,
}

impl AmendmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::UnderReview => "under_review",
            Self::Completed => "completed",
        }
    }
}

/// Distinguishes a root proposal from a child spawned by an amendment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    Normal,
    Amendment,
}

/// Contact details captured at intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// A client's intake request, the root of every engagement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeRequest {
    pub id: RequestId,
    pub contact: ContactInfo,
    pub category: ServiceCategory,
    pub project_location: String,
    pub details: String,
    /// Present when the requester holds a registered client account.
    pub client_identity: Option<ActorId>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// One party's executed signature on a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub signer_name: String,
    pub payload: String,
    pub signed_at: DateTime<Utc>,
}

/// The two signature slots on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureParty {
    Owner,
    Architect,
}

impl SignatureParty {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Architect => "architect",
        }
    }
}

/// A priced offer tied to one intake request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub request_id: RequestId,
    /// Identity allowed to execute the owner signature slot.
    pub client_identity: ActorId,
    pub number: String,
    pub title: String,
    pub project_location: String,
    pub category: ServiceCategory,
    pub status: ProposalStatus,
    pub kind: ProposalKind,
    pub parent_id: Option<ProposalId>,
    pub owner_signature: Option<Signature>,
    pub architect_signature: Option<Signature>,
    pub subtotal: Money,
    pub tax_rate_bps: u32,
    pub tax_amount: Money,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl Proposal {
    pub fn signature(&self, party: SignatureParty) -> Option<&Signature> {
        match party {
            SignatureParty::Owner => self.owner_signature.as_ref(),
            SignatureParty::Architect => self.architect_signature.as_ref(),
        }
    }

    pub fn fully_signed(&self) -> bool {
        self.owner_signature.is_some() && self.architect_signature.is_some()
    }
}

/// A single priced line on a proposal; stage generation mirrors its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLine {
    pub id: ServiceLineId,
    pub proposal_id: ProposalId,
    pub name: String,
    pub unit_amount: Money,
    pub quantity: u32,
    pub order: u32,
}

impl ServiceLine {
    pub fn line_total(&self) -> Money {
        self.unit_amount.times(self.quantity)
    }
}

/// Discount value, either fixed cents or basis points of the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CreditValue {
    Dollar(Money),
    PercentBps(u32),
}

/// A discount applied to a proposal's subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub id: CreditId,
    pub proposal_id: ProposalId,
    pub description: String,
    pub value: CreditValue,
}

/// Dated note appended to a stage's running log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageNote {
    pub author: ActorId,
    pub body: String,
    pub recorded_at: DateTime<Utc>,
}

/// A unit of post-acceptance delivery work, generated from one service line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStage {
    pub id: StageId,
    pub proposal_id: ProposalId,
    pub name: String,
    pub order: u32,
    pub status: StageStatus,
    pub progress: u8,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub assignee: Option<ActorId>,
    pub started_at: Option<DateTime<Utc>>,
    pub due_on: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Vec<StageNote>,
}

/// A client-requested change against an accepted proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendmentRequest {
    pub id: AmendmentId,
    pub proposal_id: ProposalId,
    pub details: String,
    pub status: AmendmentStatus,
    pub requested_by: ActorId,
    pub reviewed_by: Option<ActorId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Set exactly once when the approved amendment is promoted to a proposal.
    pub amendment_proposal_id: Option<ProposalId>,
    pub completed_by: Option<ActorId>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
