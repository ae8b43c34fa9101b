use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::amendments::ReviewDecision;
use super::domain::{
    Actor, ActorId, AmendmentId, CreditId, ProposalId, RequestId, ServiceLineId, SignatureParty,
    StaffMember, StageId,
};
use super::error::EngagementError;
use super::repository::{EngagementStore, NotificationSink, PageRequest};
use super::service::{
    EngagementService, NewCredit, NewRequest, NewServiceLine, Outcome, ProposalDraft,
};
use super::signing::SignatureInput;

/// Router builder exposing the engagement lifecycle over HTTP. Actors are
/// carried in request bodies; authentication happens upstream.
pub fn engagement_router<S, N>(service: Arc<EngagementService<S, N>>) -> Router
where
    S: EngagementStore + 'static,
    N: NotificationSink + 'static,
{
    Router::new()
        .route("/api/v1/staff", put(sync_staff::<S, N>))
        .route("/api/v1/requests", post(submit_request::<S, N>).get(list_requests::<S, N>))
        .route("/api/v1/requests/:id/review", post(review_request::<S, N>))
        .route("/api/v1/requests/:id/cancel", post(cancel_request::<S, N>))
        .route("/api/v1/requests/:id/archive", post(archive_request::<S, N>))
        .route(
            "/api/v1/proposals",
            post(create_proposal::<S, N>).get(list_proposals::<S, N>),
        )
        .route("/api/v1/proposals/:id", get(get_proposal::<S, N>))
        .route("/api/v1/proposals/:id/lines", post(add_service_line::<S, N>))
        .route(
            "/api/v1/proposals/:id/lines/:line_id",
            delete(remove_service_line::<S, N>),
        )
        .route("/api/v1/proposals/:id/credits", post(add_credit::<S, N>))
        .route(
            "/api/v1/proposals/:id/credits/:credit_id",
            delete(remove_credit::<S, N>),
        )
        .route("/api/v1/proposals/:id/send", post(send_proposal::<S, N>))
        .route("/api/v1/proposals/:id/view", post(mark_viewed::<S, N>))
        .route("/api/v1/proposals/:id/decline", post(decline_proposal::<S, N>))
        .route("/api/v1/proposals/:id/expire", post(expire_proposal::<S, N>))
        .route("/api/v1/proposals/:id/sign", post(sign_proposal::<S, N>))
        .route("/api/v1/proposals/:id/tree", get(proposal_tree::<S, N>))
        .route("/api/v1/proposals/:id/stages", get(list_stages::<S, N>))
        .route(
            "/api/v1/proposals/:id/amendments",
            post(create_amendment::<S, N>).get(list_amendments::<S, N>),
        )
        .route(
            "/api/v1/amendments/:id/review",
            post(review_amendment::<S, N>),
        )
        .route(
            "/api/v1/amendments/:id/proposal",
            post(promote_amendment::<S, N>),
        )
        .route(
            "/api/v1/amendments/:id/complete",
            post(complete_amendment::<S, N>),
        )
        .route("/api/v1/stages/:id/progress", post(stage_progress::<S, N>))
        .route("/api/v1/stages/:id/complete", post(complete_stage::<S, N>))
        .route("/api/v1/stages/:id/assign", post(assign_stage::<S, N>))
        .with_state(service)
}

pub fn error_status(error: &EngagementError) -> StatusCode {
    match error {
        EngagementError::NotFound { .. } => StatusCode::NOT_FOUND,
        EngagementError::Forbidden(_) => StatusCode::FORBIDDEN,
        EngagementError::InvalidTransition { .. }
        | EngagementError::InvalidState(_)
        | EngagementError::AlreadyReviewed
        | EngagementError::AlreadyCompleted
        | EngagementError::PrerequisiteNotMet(_) => StatusCode::CONFLICT,
        EngagementError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngagementError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T: Serialize>(
    result: Result<Outcome<T>, EngagementError>,
    success: StatusCode,
) -> Response {
    match result {
        Ok(outcome) => {
            let payload = json!({
                "success": true,
                "data": outcome.data,
                "message": outcome.message,
                "notifications_degraded": outcome.notifications_degraded,
            });
            (success, axum::Json(payload)).into_response()
        }
        Err(error) => respond_error(error),
    }
}

fn respond_read<T: Serialize>(result: Result<T, EngagementError>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, axum::Json(data)).into_response(),
        Err(error) => respond_error(error),
    }
}

fn respond_error(error: EngagementError) -> Response {
    let payload = json!({ "success": false, "error": error.to_string() });
    (error_status(&error), axum::Json(payload)).into_response()
}

#[derive(Debug, Deserialize)]
struct ActorEnvelope<T> {
    actor: Actor,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Deserialize)]
struct ActorOnly {
    actor: Actor,
}

#[derive(Debug, Deserialize)]
struct SignBody {
    party: SignatureParty,
    signature: SignatureInput,
}

#[derive(Debug, Deserialize)]
struct AmendmentBody {
    details: String,
}

#[derive(Debug, Deserialize)]
struct ReviewBody {
    decision: ReviewDecision,
}

#[derive(Debug, Deserialize)]
struct PromoteBody {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ProgressBody {
    progress: u32,
    completed_tasks: Option<u32>,
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssignBody {
    assignee: ActorId,
    due_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Default)]
struct PageQuery {
    page: Option<usize>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct ProposalsQuery {
    request_id: Option<u64>,
    page: Option<usize>,
    limit: Option<usize>,
}

impl ProposalsQuery {
    fn to_request(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest {
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(defaults.limit),
        }
    }
}

impl PageQuery {
    fn to_request(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest {
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(defaults.limit),
        }
    }
}

type Service<S, N> = Arc<EngagementService<S, N>>;

async fn submit_request<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    axum::Json(body): axum::Json<NewRequest>,
) -> Response {
    respond(service.submit_request(body), StatusCode::CREATED)
}

async fn list_requests<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Query(page): Query<PageQuery>,
) -> Response {
    respond_read(service.list_requests(page.to_request()))
}

async fn review_request<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorOnly>,
) -> Response {
    respond(
        service.review_request(RequestId(id), &body.actor),
        StatusCode::OK,
    )
}

async fn cancel_request<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorOnly>,
) -> Response {
    respond(
        service.cancel_request(RequestId(id), &body.actor),
        StatusCode::OK,
    )
}

async fn archive_request<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorOnly>,
) -> Response {
    respond(
        service.archive_request(RequestId(id), &body.actor),
        StatusCode::OK,
    )
}

async fn sync_staff<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    axum::Json(member): axum::Json<StaffMember>,
) -> Response {
    respond(service.sync_staff(member), StatusCode::OK)
}

async fn create_proposal<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    axum::Json(body): axum::Json<ActorEnvelope<ProposalDraft>>,
) -> Response {
    respond(
        service.create_proposal(body.body, &body.actor),
        StatusCode::CREATED,
    )
}

async fn get_proposal<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
) -> Response {
    respond_read(service.get_proposal(ProposalId(id)))
}

async fn add_service_line<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorEnvelope<NewServiceLine>>,
) -> Response {
    respond(
        service.add_service_line(ProposalId(id), body.body, &body.actor),
        StatusCode::CREATED,
    )
}

async fn remove_service_line<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path((id, line_id)): Path<(u64, u64)>,
    axum::Json(body): axum::Json<ActorOnly>,
) -> Response {
    respond(
        service.remove_service_line(ProposalId(id), ServiceLineId(line_id), &body.actor),
        StatusCode::OK,
    )
}

async fn remove_credit<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path((id, credit_id)): Path<(u64, u64)>,
    axum::Json(body): axum::Json<ActorOnly>,
) -> Response {
    respond(
        service.remove_credit(ProposalId(id), CreditId(credit_id), &body.actor),
        StatusCode::OK,
    )
}

async fn list_proposals<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Query(query): Query<ProposalsQuery>,
) -> Response {
    respond_read(service.list_proposals(query.request_id.map(RequestId), query.to_request()))
}

async fn add_credit<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorEnvelope<NewCredit>>,
) -> Response {
    respond(
        service.add_credit(ProposalId(id), body.body, &body.actor),
        StatusCode::CREATED,
    )
}

async fn send_proposal<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorOnly>,
) -> Response {
    respond(service.send_proposal(ProposalId(id), &body.actor), StatusCode::OK)
}

async fn mark_viewed<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorOnly>,
) -> Response {
    respond(service.mark_viewed(ProposalId(id), &body.actor), StatusCode::OK)
}

async fn decline_proposal<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorOnly>,
) -> Response {
    respond(
        service.decline_proposal(ProposalId(id), &body.actor),
        StatusCode::OK,
    )
}

async fn expire_proposal<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorOnly>,
) -> Response {
    respond(
        service.expire_proposal(ProposalId(id), &body.actor),
        StatusCode::OK,
    )
}

async fn sign_proposal<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorEnvelope<SignBody>>,
) -> Response {
    respond(
        service.sign_proposal(ProposalId(id), body.body.party, body.body.signature, &body.actor),
        StatusCode::OK,
    )
}

async fn proposal_tree<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
) -> Response {
    respond_read(service.proposal_tree(ProposalId(id)))
}

async fn list_stages<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
) -> Response {
    respond_read(service.stages_for(ProposalId(id)))
}

async fn create_amendment<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorEnvelope<AmendmentBody>>,
) -> Response {
    respond(
        service.create_amendment_request(ProposalId(id), body.body.details, &body.actor),
        StatusCode::CREATED,
    )
}

async fn list_amendments<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    Query(page): Query<PageQuery>,
) -> Response {
    respond_read(service.list_amendments(ProposalId(id), page.to_request()))
}

async fn review_amendment<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorEnvelope<ReviewBody>>,
) -> Response {
    respond(
        service.review_amendment(AmendmentId(id), body.body.decision, &body.actor),
        StatusCode::OK,
    )
}

async fn promote_amendment<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorEnvelope<PromoteBody>>,
) -> Response {
    respond(
        service.create_proposal_from_amendment(AmendmentId(id), body.body.title, &body.actor),
        StatusCode::CREATED,
    )
}

async fn complete_amendment<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorOnly>,
) -> Response {
    respond(
        service.complete_amendment(AmendmentId(id), &body.actor),
        StatusCode::OK,
    )
}

async fn stage_progress<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorEnvelope<ProgressBody>>,
) -> Response {
    respond(
        service.set_stage_progress(
            StageId(id),
            body.body.progress,
            body.body.completed_tasks,
            body.body.note,
            &body.actor,
        ),
        StatusCode::OK,
    )
}

async fn complete_stage<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorOnly>,
) -> Response {
    respond(service.complete_stage(StageId(id), &body.actor), StatusCode::OK)
}

async fn assign_stage<S: EngagementStore + 'static, N: NotificationSink + 'static>(
    State(service): State<Service<S, N>>,
    Path(id): Path<u64>,
    axum::Json(body): axum::Json<ActorEnvelope<AssignBody>>,
) -> Response {
    respond(
        service.assign_stage(StageId(id), body.body.assignee, body.body.due_on, &body.actor),
        StatusCode::OK,
    )
}
