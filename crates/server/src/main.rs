//! Relief Server
//!
//! CLI and Axum server around the relief request pipeline.
//! `ask` and `demo` run the coordinator in-process; `serve` exposes it as a
//! JSON API with a live pipeline event stream.

use anyhow::Context;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, Response, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json,
    },
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use futures::stream::{self, Stream};
use relief_core::models::Coordinates;
use relief_core::skills::{EvaluationResult, MapResource};
use relief_core::state::Session;
use relief_core::swarm::{
    PipelineEvent, EVALUATOR_AGENT, PLANNER_AGENT, WORKER_AGENT,
};
use relief_core::{Coordinator, ReliefConfig, SessionStore, StaticCatalog};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    net::TcpListener,
    sync::{broadcast, mpsc},
};
use tracing_subscriber::EnvFilter;
use utoipa::{OpenApi, ToSchema};

/// Inputs run by `relief demo`
const DEMO_INPUTS: [&str; 4] = [
    "I need shelter and food after the hurricane",
    "Where can I find medical help?",
    "How do I apply for government assistance?",
    "Emergency shelter needed now!",
];

/// How often the janitor sweeps idle sessions and stale cache entries
const JANITOR_INTERVAL: Duration = Duration::from_secs(300);

/// Application state
struct AppState {
    coordinator: Coordinator,
    event_tx: broadcast::Sender<PipelineEvent>,
}

type SharedState = Arc<AppState>;

// === API Types ===

#[derive(Deserialize, ToSchema)]
struct ReliefRequest {
    /// Free-text description of what the person needs
    text: String,
    /// Continue an earlier session
    session_id: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl ReliefRequest {
    fn coordinates(&self) -> Option<Coordinates> {
        coordinates(self.lat, self.lon)
    }
}

#[derive(Serialize, ToSchema)]
struct ReliefResponse {
    session_id: String,
    final_response: String,
    resource_count: usize,
    evaluation_confidence: f32,
    map_resources: Vec<MapPoint>,
}

#[derive(Serialize, ToSchema)]
struct MapPoint {
    domain: String,
    name: String,
    lat: f64,
    lon: f64,
}

impl From<MapResource> for MapPoint {
    fn from(resource: MapResource) -> Self {
        Self {
            domain: resource.domain.to_string(),
            name: resource.name,
            lat: resource.lat,
            lon: resource.lon,
        }
    }
}

impl From<EvaluationResult> for ReliefResponse {
    fn from(result: EvaluationResult) -> Self {
        Self {
            session_id: result.session_id,
            final_response: result.final_response,
            resource_count: result.resource_count,
            evaluation_confidence: result.evaluation_confidence,
            map_resources: result.map_resources.into_iter().map(MapPoint::from).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
struct SessionResponse {
    session_id: String,
    created_at: String,
    last_accessed: String,
    user_input: String,
    area: String,
    urgency: Option<String>,
    disaster_type: Option<String>,
    needs: Vec<String>,
    interactions: Vec<InteractionView>,
}

#[derive(Serialize, ToSchema)]
struct InteractionView {
    timestamp: String,
    agent: String,
    action: String,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.session_id,
            created_at: session.created_at.to_rfc3339(),
            last_accessed: session.last_accessed.to_rfc3339(),
            user_input: session.user_input,
            area: session.location.area,
            urgency: session.urgency.map(|u| u.to_string()),
            disaster_type: session.disaster_type.map(|d| d.to_string()),
            needs: session
                .needs
                .iter()
                .map(|n| n.as_str().to_string())
                .collect(),
            interactions: session
                .interactions
                .into_iter()
                .map(|r| InteractionView {
                    timestamp: r.timestamp.to_rfc3339(),
                    agent: r.agent,
                    action: r.action,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    sessions: usize,
    queued_messages: usize,
}

#[derive(Serialize, ToSchema)]
struct ApiError {
    error: String,
}

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: message.into(),
        }),
    )
}

fn coordinates(lat: Option<f64>, lon: Option<f64>) -> Option<Coordinates> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
        _ => None,
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Relief API",
        version = "1.0.0",
        description = "Disaster relief resource requests"
    ),
    paths(submit_request, get_session, health),
    components(schemas(
        ReliefRequest,
        ReliefResponse,
        MapPoint,
        SessionResponse,
        InteractionView,
        HealthResponse,
        ApiError
    )),
    tags((name = "relief", description = "Resource requests and sessions"))
)]
struct ApiDoc;

// === CLI ===

#[derive(Parser, Clone)]
#[command(author, version, about = "Relief - Disaster Resource Connector")]
struct Args {
    /// Override the confidence threshold
    #[arg(long, global = true)]
    threshold: Option<f32>,
    /// Override the number of items listed per section
    #[arg(long, global = true)]
    max_items: Option<usize>,
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Ask for resources once and print the answer
    Ask {
        /// What you need, in your own words
        text: String,
        #[arg(long)]
        lat: Option<f64>,
        #[arg(long)]
        lon: Option<f64>,
        /// Continue an earlier session
        #[arg(long)]
        session: Option<String>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the canonical demo requests
    Demo,
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

async fn load_config(args: &Args) -> anyhow::Result<ReliefConfig> {
    let mut config = ReliefConfig::load()
        .await
        .context("Failed to load relief config")?;
    if let Some(threshold) = args.threshold {
        config.confidence_threshold = threshold;
    }
    if let Some(max_items) = args.max_items {
        config.max_items_per_section = max_items;
    }
    Ok(config)
}

fn build_coordinator(config: ReliefConfig) -> Coordinator {
    Coordinator::new(
        config,
        Arc::new(SessionStore::new()),
        Arc::new(StaticCatalog::new()),
    )
}

// === API Handlers ===

/// Submit a relief request
#[utoipa::path(
    post,
    path = "/api/v1/request",
    tag = "relief",
    request_body = ReliefRequest,
    responses(
        (status = 200, description = "Composed answer", body = ReliefResponse),
        (status = 400, description = "Empty request text", body = ApiError)
    )
)]
async fn submit_request(
    State(state): State<SharedState>,
    Json(req): Json<ReliefRequest>,
) -> Result<Json<ReliefResponse>, (StatusCode, Json<ApiError>)> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Please describe what you need, for example \"I need shelter downtown\".",
        ));
    }

    let result = state
        .coordinator
        .handle_request(text, req.session_id.as_deref(), req.coordinates())
        .await;
    Ok(Json(result.into()))
}

/// Fetch a session by id
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    tag = "relief",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session state", body = SessionResponse),
        (status = 404, description = "Unknown or evicted session", body = ApiError)
    )
)]
async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, (StatusCode, Json<ApiError>)> {
    state
        .coordinator
        .store()
        .get(&id)
        .map(|session| Json(session.into()))
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Session {} not found", id)))
}

/// Liveness and queue depth
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "relief",
    responses((status = 200, description = "Server is up", body = HealthResponse))
)]
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: state.coordinator.store().len(),
        queued_messages: state.coordinator.bus().len(),
    })
}

/// Stream pipeline events as SSE
async fn events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        match tokio::time::timeout(Duration::from_secs(15), rx.recv()).await {
            Ok(Ok(event)) => {
                let json = serde_json::to_string(&event).unwrap_or_default();
                Some((Ok(Event::default().data(json)), rx))
            }
            // lagged subscribers skip ahead
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => {
                Some((Ok(Event::default().comment("lagged")), rx))
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => None,
            Err(_) => Some((Ok(Event::default().comment("heartbeat")), rx)),
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn serve_openapi() -> impl IntoResponse {
    let spec = ApiDoc::openapi().to_json().unwrap_or_default();
    Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(spec))
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/v1/request", post(submit_request))
        .route("/api/v1/sessions/:id", get(get_session))
        .route("/api/v1/health", get(health))
        .route("/api/v1/events", get(events))
        .route("/api/v1/openapi.json", get(serve_openapi))
        .with_state(state)
}

// === Commands ===

async fn run_ask(
    config: ReliefConfig,
    text: &str,
    coords: Option<Coordinates>,
    session: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    if text.trim().is_empty() {
        println!("Please describe what you need, for example \"I need shelter downtown\".");
        return Ok(());
    }

    let coordinator = build_coordinator(config);
    let result = coordinator.handle_request(text.trim(), session, coords).await;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize result")?
        );
    } else {
        println!("{}", result.final_response);
        println!("\n(session {})", result.session_id);
    }
    Ok(())
}

async fn run_demo(config: ReliefConfig) {
    println!("=== Disaster Resource Connector Demo ===");
    let coordinator = build_coordinator(config);
    for (i, input) in DEMO_INPUTS.iter().enumerate() {
        let result = coordinator.handle_request(input, None, None).await;
        println!("\n--- Test Case {} ---", i + 1);
        println!("Input: {}", input);
        println!("Output: {}", result.final_response);
        println!("{}", "-".repeat(50));
    }
}

async fn run_server(config: ReliefConfig, port: u16) -> anyhow::Result<()> {
    let (event_tx, _) = broadcast::channel::<PipelineEvent>(100);
    let (event_mpsc_tx, mut event_mpsc_rx) = mpsc::channel::<PipelineEvent>(100);

    // Bridge events to broadcast
    let broadcast_tx = event_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = event_mpsc_rx.recv().await {
            let _ = broadcast_tx.send(event);
        }
    });

    let coordinator = build_coordinator(config)
        .with_event_channel(event_mpsc_tx)
        .with_agent_loops(&[PLANNER_AGENT, WORKER_AGENT, EVALUATOR_AGENT]);
    let state: SharedState = Arc::new(AppState {
        coordinator,
        event_tx,
    });

    // Janitor
    let janitor_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(JANITOR_INTERVAL);
        loop {
            interval.tick().await;
            let (sessions, cached) = janitor_state.coordinator.sweep();
            if sessions + cached > 0 {
                tracing::info!(sessions, cached, "Janitor evicted idle state");
            }
        }
    });

    let app = router(state);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("🚀 Relief Server running at http://{}", addr);
    println!("   API v1 Routes:");
    println!("   Request:  POST /api/v1/request");
    println!("   Sessions: GET  /api/v1/sessions/:id");
    println!("   Health:   GET  /api/v1/health");
    println!("   Events:   GET  /api/v1/events (SSE)");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.log_json);
    let config = load_config(&args).await?;
    tracing::debug!(
        threshold = config.confidence_threshold,
        max_items = config.max_items_per_section,
        "Config loaded"
    );

    match args.command.clone() {
        Some(CliCommand::Ask {
            text,
            lat,
            lon,
            session,
            json,
        }) => run_ask(config, &text, coordinates(lat, lon), session.as_deref(), json).await,
        Some(CliCommand::Demo) => {
            run_demo(config).await;
            Ok(())
        }
        Some(CliCommand::Serve { port }) => run_server(config, port).await,
        None => run_server(config, 8080).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SharedState {
        let (event_tx, _) = broadcast::channel(16);
        Arc::new(AppState {
            coordinator: build_coordinator(ReliefConfig::default()),
            event_tx,
        })
    }

    fn request(text: &str) -> ReliefRequest {
        ReliefRequest {
            text: text.to_string(),
            session_id: None,
            lat: None,
            lon: None,
        }
    }

    #[tokio::test]
    async fn test_empty_request_rejected() {
        let err = submit_request(State(state()), Json(request("   ")))
            .await
            .err()
            .unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_request_then_session_lookup() {
        let state = state();
        let Json(answer) = submit_request(
            State(state.clone()),
            Json(request("Where can I find medical help?")),
        )
        .await
        .ok()
        .unwrap();
        assert!(answer.final_response.contains("Medical Resources:"));

        let Json(session) = get_session(State(state.clone()), Path(answer.session_id.clone()))
            .await
            .ok()
            .unwrap();
        assert_eq!(session.user_input, "Where can I find medical help?");
        assert_eq!(session.needs, vec!["medical"]);

        let missing = get_session(State(state), Path("nope".to_string())).await;
        assert_eq!(missing.err().unwrap().0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_reports_need_categories() {
        let state = state();
        let Json(answer) = submit_request(
            State(state.clone()),
            Json(request("How do I apply for government assistance?")),
        )
        .await
        .ok()
        .unwrap();

        let Json(session) = get_session(State(state), Path(answer.session_id))
            .await
            .ok()
            .unwrap();
        assert_eq!(session.needs, vec!["assistance"]);
    }

    #[test]
    fn test_coordinates_need_both_parts() {
        assert!(coordinates(Some(1.0), None).is_none());
        assert_eq!(
            coordinates(Some(1.0), Some(2.0)),
            Some(Coordinates::new(1.0, 2.0))
        );
    }

    #[test]
    fn test_openapi_lists_routes() {
        let spec = ApiDoc::openapi().to_json().unwrap();
        assert!(spec.contains("/api/v1/request"));
        assert!(spec.contains("/api/v1/sessions/{id}"));
    }
}
