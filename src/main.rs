use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use atelier_ai::config::AppConfig;
use atelier_ai::error::AppError;
use atelier_ai::telemetry;
use atelier_ai::workflows::engagement::{
    engagement_router, Actor, ActorId, ContactInfo, CreditValue, EngagementService,
    EngagementSettings, MemoryStore, Money, NewCredit, NewRequest, NewServiceLine,
    NotificationError, NotificationIntent, NotificationSink, ProposalDraft, ReviewDecision,
    ServiceCategory, SignatureInput, SignatureParty, StaffMember, StaffRole,
};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

/// Notification sink for the standalone binary: intents are logged, and a
/// real mailer/webhook adapter can replace this without touching the core.
struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, intent: NotificationIntent) -> Result<(), NotificationError> {
        info!(
            recipient = %intent.recipient,
            template = intent.template.label(),
            "notification queued"
        );
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "Atelier Engagement Orchestrator",
    about = "Run the client engagement lifecycle service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk a scripted engagement end to end and print the results
    Demo,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo => run_demo(),
    }
}

fn build_service(config: &AppConfig) -> Arc<EngagementService<MemoryStore, LogSink>> {
    let settings = EngagementSettings {
        proposal_number_prefix: config.workflow.proposal_number_prefix.clone(),
        default_tax_rate_bps: config.workflow.default_tax_rate_bps,
    };
    Arc::new(EngagementService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(LogSink),
        settings,
    ))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let service = build_service(&config);
    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(engagement_router(service))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "engagement orchestrator ready");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Scripted walkthrough: intake to accepted proposal, a stage completion,
/// and an amendment round-trip.
fn run_demo() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = build_service(&config);

    let manager = Actor::Staff {
        id: ActorId("staff-mora".to_string()),
        role: StaffRole::ProjectManager,
    };
    let client = Actor::Client {
        id: ActorId("client-webb".to_string()),
    };

    service
        .sync_staff(StaffMember {
            id: ActorId("staff-mora".to_string()),
            name: "A. Mora".to_string(),
            role: StaffRole::ProjectManager,
            active: true,
        })
        .map_err(AppError::from)?;

    let request = service
        .submit_request(NewRequest {
            contact: ContactInfo {
                name: "Dana Webb".to_string(),
                email: "dana@example.com".to_string(),
                phone: Some("555-0117".to_string()),
            },
            category: ServiceCategory::Renovation,
            project_location: "412 Grand Ave".to_string(),
            details: "Full kitchen and dining renovation".to_string(),
            client_identity: Some(ActorId("client-webb".to_string())),
        })?
        .data;
    println!("Intake request {} received ({})", request.id.0, request.status.label());

    service.review_request(request.id, &manager)?;

    let proposal = service
        .create_proposal(
            ProposalDraft {
                request_id: request.id,
                title: "Grand Ave renovation".to_string(),
                tax_rate_bps: Some(800),
                client_identity: None,
            },
            &manager,
        )?
        .data;

    service.add_service_line(
        proposal.id,
        NewServiceLine {
            name: "Schematic design".to_string(),
            unit_amount: Money(100_000),
            quantity: 1,
        },
        &manager,
    )?;
    service.add_service_line(
        proposal.id,
        NewServiceLine {
            name: "Construction documents".to_string(),
            unit_amount: Money(50_000),
            quantity: 1,
        },
        &manager,
    )?;
    service.add_credit(
        proposal.id,
        NewCredit {
            description: "Returning client".to_string(),
            value: CreditValue::PercentBps(1_000),
        },
        &manager,
    )?;

    let sent = service.send_proposal(proposal.id, &manager)?.data;
    println!("Proposal {} sent, total {}", sent.number, sent.total);

    service.mark_viewed(proposal.id, &client)?;
    service.sign_proposal(
        proposal.id,
        SignatureParty::Owner,
        SignatureInput {
            signer_name: "Dana Webb".to_string(),
            payload: "sig:owner".to_string(),
        },
        &client,
    )?;
    let signed = service
        .sign_proposal(
            proposal.id,
            SignatureParty::Architect,
            SignatureInput {
                signer_name: "A. Mora".to_string(),
                payload: "sig:architect".to_string(),
            },
            &manager,
        )?
        .data;
    println!(
        "Proposal {} accepted, {} stages generated",
        signed.proposal.number, signed.stages_created
    );

    let stages = service.stages_for(proposal.id)?;
    for stage in &stages {
        println!("- stage {} '{}' ({})", stage.order, stage.name, stage.status.label());
    }
    if let Some(first) = stages.first() {
        service.complete_stage(first.id, &manager)?;
        println!("Stage '{}' completed", first.name);
    }

    let amendment = service
        .create_amendment_request(proposal.id, "Add pantry built-ins".to_string(), &client)?
        .data;
    service.review_amendment(amendment.id, ReviewDecision::Approve, &manager)?;
    let child = service
        .create_proposal_from_amendment(amendment.id, "Pantry built-ins".to_string(), &manager)?
        .data;
    println!(
        "Amendment {} promoted to proposal {} ({:?})",
        amendment.id.0, child.number, child.kind
    );

    let tree = service.proposal_tree(proposal.id)?;
    println!("Proposal tree:");
    for node in tree {
        println!("- {} [{}]", node.number, node.status.label());
    }

    Ok(())
}
