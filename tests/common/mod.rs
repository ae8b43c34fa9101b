#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use atelier_ai::workflows::engagement::{
    Actor, ActorId, ContactInfo, CreditValue, EngagementService, EngagementSettings, MemoryStore,
    Money, NewCredit, NewRequest, NewServiceLine, NotificationError, NotificationIntent,
    NotificationSink, ProposalDraft, ProposalId, RequestId, ServiceCategory, SignatureInput,
    SignatureParty, StaffMember, StaffRole,
};

pub const MANAGER_ID: &str = "staff-mora";
pub const CLIENT_ID: &str = "client-webb";

pub fn manager() -> Actor {
    Actor::Staff {
        id: ActorId(MANAGER_ID.to_string()),
        role: StaffRole::ProjectManager,
    }
}

pub fn client() -> Actor {
    Actor::Client {
        id: ActorId(CLIENT_ID.to_string()),
    }
}

pub fn stranger_client() -> Actor {
    Actor::Client {
        id: ActorId("client-other".to_string()),
    }
}

pub fn drafter() -> Actor {
    Actor::Staff {
        id: ActorId("staff-lee".to_string()),
        role: StaffRole::Drafter,
    }
}

/// Sink that records every intent so tests can assert on the queue.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<NotificationIntent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<NotificationIntent> {
        self.events.lock().expect("lock").clone()
    }

    pub fn clear(&self) {
        self.events.lock().expect("lock").clear();
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, intent: NotificationIntent) -> Result<(), NotificationError> {
        self.events.lock().expect("lock").push(intent);
        Ok(())
    }
}

/// Sink that always fails, for degraded-delivery scenarios.
pub struct FailingSink;

impl NotificationSink for FailingSink {
    fn deliver(&self, _intent: NotificationIntent) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("mailer offline".to_string()))
    }
}

pub fn settings() -> EngagementSettings {
    EngagementSettings {
        proposal_number_prefix: "PRO".to_string(),
        default_tax_rate_bps: 800,
    }
}

pub type TestService<N> = EngagementService<MemoryStore, N>;

pub fn build_service() -> (
    Arc<TestService<RecordingSink>>,
    Arc<MemoryStore>,
    Arc<RecordingSink>,
) {
    let sink = Arc::new(RecordingSink::default());
    let (service, store) = build_service_with(sink.clone());
    (service, store, sink)
}

pub fn build_service_with<N: NotificationSink + 'static>(
    sink: Arc<N>,
) -> (Arc<TestService<N>>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = Arc::new(EngagementService::new(store.clone(), sink, settings()));
    seed_staff(&service);
    (service, store)
}

/// One active manager, one inactive manager, one active non-manager, so
/// acceptance fan-out audiences are observable.
fn seed_staff<N: NotificationSink + 'static>(service: &TestService<N>) {
    service
        .sync_staff(StaffMember {
            id: ActorId(MANAGER_ID.to_string()),
            name: "A. Mora".to_string(),
            role: StaffRole::ProjectManager,
            active: true,
        })
        .expect("seed manager");
    service
        .sync_staff(StaffMember {
            id: ActorId("staff-emeritus".to_string()),
            name: "R. Voss".to_string(),
            role: StaffRole::Principal,
            active: false,
        })
        .expect("seed inactive principal");
    service
        .sync_staff(StaffMember {
            id: ActorId("staff-lee".to_string()),
            name: "J. Lee".to_string(),
            role: StaffRole::Drafter,
            active: true,
        })
        .expect("seed drafter");
}

pub fn intake() -> NewRequest {
    NewRequest {
        contact: ContactInfo {
            name: "Dana Webb".to_string(),
            email: "dana@example.com".to_string(),
            phone: Some("555-0117".to_string()),
        },
        category: ServiceCategory::Renovation,
        project_location: "412 Grand Ave".to_string(),
        details: "Full kitchen and dining renovation".to_string(),
        client_identity: Some(ActorId(CLIENT_ID.to_string())),
    }
}

pub fn owner_signature() -> SignatureInput {
    SignatureInput {
        signer_name: "Dana Webb".to_string(),
        payload: "sig:owner".to_string(),
    }
}

pub fn architect_signature() -> SignatureInput {
    SignatureInput {
        signer_name: "A. Mora".to_string(),
        payload: "sig:architect".to_string(),
    }
}

/// Reviewed request plus a sent two-line proposal (1000 + 500 with a 10%
/// credit at 8% tax), ready for signatures.
pub fn sent_proposal<N: NotificationSink + 'static>(
    service: &TestService<N>,
) -> (RequestId, ProposalId) {
    let request = service.submit_request(intake()).expect("intake").data;
    service
        .review_request(request.id, &manager())
        .expect("review");

    let proposal = service
        .create_proposal(
            ProposalDraft {
                request_id: request.id,
                title: "Grand Ave renovation".to_string(),
                tax_rate_bps: Some(800),
                client_identity: None,
            },
            &manager(),
        )
        .expect("draft")
        .data;

    service
        .add_service_line(
            proposal.id,
            NewServiceLine {
                name: "Schematic design".to_string(),
                unit_amount: Money(100_000),
                quantity: 1,
            },
            &manager(),
        )
        .expect("line one");
    service
        .add_service_line(
            proposal.id,
            NewServiceLine {
                name: "Construction documents".to_string(),
                unit_amount: Money(50_000),
                quantity: 1,
            },
            &manager(),
        )
        .expect("line two");
    service
        .add_credit(
            proposal.id,
            NewCredit {
                description: "Returning client".to_string(),
                value: CreditValue::PercentBps(1_000),
            },
            &manager(),
        )
        .expect("credit");

    service.send_proposal(proposal.id, &manager()).expect("send");
    (request.id, proposal.id)
}

/// Drive a sent proposal through both signatures to acceptance.
pub fn accept<N: NotificationSink + 'static>(service: &TestService<N>, proposal_id: ProposalId) {
    service
        .sign_proposal(
            proposal_id,
            SignatureParty::Owner,
            owner_signature(),
            &client(),
        )
        .expect("owner signs");
    service
        .sign_proposal(
            proposal_id,
            SignatureParty::Architect,
            architect_signature(),
            &manager(),
        )
        .expect("architect signs");
}

pub fn accepted_proposal<N: NotificationSink + 'static>(
    service: &TestService<N>,
) -> (RequestId, ProposalId) {
    let (request_id, proposal_id) = sent_proposal(service);
    accept(service, proposal_id);
    (request_id, proposal_id)
}
