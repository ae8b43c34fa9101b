//! HTTP surface scenarios: the engagement router wiring, response
//! envelopes, and error-to-status mapping.

mod common;

use common::*;

use std::sync::Arc;

use atelier_ai::workflows::engagement::engagement_router;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn payload(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    serde_json::from_slice(&body).expect("json")
}

fn manager_actor() -> Value {
    json!({ "kind": "staff", "id": MANAGER_ID, "role": "project_manager" })
}

fn client_actor() -> Value {
    json!({ "kind": "client", "id": CLIENT_ID })
}

fn intake_body() -> Value {
    json!({
        "contact": {
            "name": "Dana Webb",
            "email": "dana@example.com",
            "phone": "555-0117"
        },
        "category": "renovation",
        "project_location": "412 Grand Ave",
        "details": "Full kitchen and dining renovation",
        "client_identity": CLIENT_ID
    })
}

#[tokio::test]
async fn submitting_a_request_returns_a_created_envelope() {
    let (service, _, _) = build_service();
    let router = engagement_router(service);

    let response = router
        .oneshot(post("/api/v1/requests", intake_body()))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = payload(response).await;
    assert_eq!(body.get("success"), Some(&json!(true)));
    assert_eq!(body.get("notifications_degraded"), Some(&json!(false)));
    assert_eq!(
        body.pointer("/data/status").and_then(Value::as_str),
        Some("pending")
    );
    assert!(body.pointer("/data/id").is_some());
}

#[tokio::test]
async fn malformed_intake_maps_to_unprocessable_entity() {
    let (service, _, _) = build_service();
    let router = engagement_router(service);

    let mut body = intake_body();
    body["contact"]["email"] = json!("not-an-address");
    let response = router
        .oneshot(post("/api/v1/requests", body))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = payload(response).await;
    assert_eq!(body.get("success"), Some(&json!(false)));
    assert!(body.get("error").and_then(Value::as_str).is_some());
}

#[tokio::test]
async fn review_rejects_client_actors_with_forbidden() {
    let (service, _, _) = build_service();
    let request = service.submit_request(intake()).expect("intake").data;
    let router = engagement_router(service);

    let response = router
        .oneshot(post(
            &format!("/api/v1/requests/{}/review", request.id.0),
            json!({ "actor": client_actor() }),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_proposals_map_to_not_found() {
    let (service, _, _) = build_service();
    let router = engagement_router(service);

    let response = router
        .oneshot(get("/api/v1/proposals/9999"))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = payload(response).await;
    assert_eq!(body.get("success"), Some(&json!(false)));
}

#[tokio::test]
async fn sending_an_empty_proposal_maps_to_conflict() {
    let (service, _, _) = build_service();
    let request = service.submit_request(intake()).expect("intake").data;
    service
        .review_request(request.id, &manager())
        .expect("review");
    let proposal = service
        .create_proposal(
            atelier_ai::workflows::engagement::ProposalDraft {
                request_id: request.id,
                title: "Grand Ave renovation".to_string(),
                tax_rate_bps: Some(800),
                client_identity: None,
            },
            &manager(),
        )
        .expect("draft")
        .data;
    let router = engagement_router(service);

    let response = router
        .oneshot(post(
            &format!("/api/v1/proposals/{}/send", proposal.id.0),
            json!({ "actor": manager_actor() }),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn signature_round_trip_over_http_generates_stages() {
    let (service, _, _) = build_service();
    let (_, proposal_id) = sent_proposal(&service);
    let router = engagement_router(service);

    let response = router
        .clone()
        .oneshot(post(
            &format!("/api/v1/proposals/{}/sign", proposal_id.0),
            json!({
                "actor": client_actor(),
                "party": "owner",
                "signature": { "signer_name": "Dana Webb", "payload": "sig:owner" }
            }),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::OK);
    let body = payload(response).await;
    assert_eq!(
        body.pointer("/data/proposal/status").and_then(Value::as_str),
        Some("sent")
    );

    let response = router
        .clone()
        .oneshot(post(
            &format!("/api/v1/proposals/{}/sign", proposal_id.0),
            json!({
                "actor": manager_actor(),
                "party": "architect",
                "signature": { "signer_name": "A. Mora", "payload": "sig:architect" }
            }),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::OK);
    let body = payload(response).await;
    assert_eq!(
        body.pointer("/data/proposal/status").and_then(Value::as_str),
        Some("accepted")
    );
    assert_eq!(
        body.pointer("/data/stages_created").and_then(Value::as_u64),
        Some(2)
    );

    let response = router
        .oneshot(get(&format!("/api/v1/proposals/{}/stages", proposal_id.0)))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::OK);
    let stages = payload(response).await;
    assert_eq!(stages.as_array().map(Vec::len), Some(2));
    assert_eq!(
        stages.pointer("/0/status").and_then(Value::as_str),
        Some("not_started")
    );
}

#[tokio::test]
async fn double_signing_a_slot_maps_to_conflict() {
    let (service, _, _) = build_service();
    let (_, proposal_id) = sent_proposal(&service);
    let router = engagement_router(service);

    let sign = || {
        post(
            &format!("/api/v1/proposals/{}/sign", proposal_id.0),
            json!({
                "actor": client_actor(),
                "party": "owner",
                "signature": { "signer_name": "Dana Webb", "payload": "sig:owner" }
            }),
        )
    };

    let response = router.clone().oneshot(sign()).await.expect("router dispatch");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router.oneshot(sign()).await.expect("router dispatch");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn amendment_flow_over_http() {
    let (service, _, _) = build_service();
    let (_, proposal_id) = accepted_proposal(&service);
    let router = engagement_router(service);

    let response = router
        .clone()
        .oneshot(post(
            &format!("/api/v1/proposals/{}/amendments", proposal_id.0),
            json!({ "actor": client_actor(), "details": "Move the stair" }),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = payload(response).await;
    let amendment_id = body
        .pointer("/data/id")
        .and_then(Value::as_u64)
        .expect("amendment id");

    let response = router
        .clone()
        .oneshot(post(
            &format!("/api/v1/amendments/{amendment_id}/review"),
            json!({ "actor": manager_actor(), "decision": "approve" }),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(post(
            &format!("/api/v1/amendments/{amendment_id}/proposal"),
            json!({ "actor": manager_actor(), "title": "Stair rework" }),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = payload(response).await;
    assert_eq!(
        body.pointer("/data/kind").and_then(Value::as_str),
        Some("amendment")
    );

    let response = router
        .oneshot(get(&format!("/api/v1/proposals/{}/tree", proposal_id.0)))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::OK);
    let tree = payload(response).await;
    assert_eq!(tree.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn request_listing_pages_through_the_query_string() {
    let (service, _, _) = build_service();
    for _ in 0..3 {
        service.submit_request(intake()).expect("intake");
    }
    let router = engagement_router(service);

    let response = router
        .oneshot(get("/api/v1/requests?page=1&limit=2"))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::OK);

    let body = payload(response).await;
    assert_eq!(body.get("total"), Some(&json!(3)));
    assert_eq!(
        body.get("items").and_then(Value::as_array).map(Vec::len),
        Some(2)
    );
}

#[tokio::test]
async fn degraded_delivery_is_flagged_in_the_envelope() {
    let sink = Arc::new(FailingSink);
    let (service, _) = build_service_with(sink);
    let (_, proposal_id) = accepted_proposal(&service);
    let router = engagement_router(service);

    let response = router
        .oneshot(post(
            &format!("/api/v1/proposals/{}/amendments", proposal_id.0),
            json!({ "actor": client_actor(), "details": "Move the stair" }),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = payload(response).await;
    assert_eq!(body.get("success"), Some(&json!(true)));
    assert_eq!(body.get("notifications_degraded"), Some(&json!(true)));
}
