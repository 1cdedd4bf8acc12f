//! REST API server for FileChain
//!
//! Exposes transaction submission, mining, chain listing, peer management
//! and consensus resolution over HTTP/JSON. Handlers share one [`Node`];
//! the ledger lock is never held across a peer call or a nonce search.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Request, State},
    http::{self, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

use crate::blockchain::{LedgerState, MineOutcome};
use crate::config::{Config, NetworkConfig};
use crate::error::ChainError;
use crate::miner::{mine_shared, MiningBound, SharedLedger};
use crate::network::{ChainSnapshot, NetworkNode, RELAY_HEADER};
use crate::node::NodeState;
use crate::sync::ChainResolver;
use crate::transaction::{TransactionRecord, TransactionSummary};

/// Shared handler state.
#[derive(Clone)]
pub struct Node {
    pub ledger: SharedLedger,
    pub network: Arc<NetworkNode>,
    pub resolver: ChainResolver,
    /// Lifecycle reported by `/health`; set by the orchestrator.
    pub state: Arc<RwLock<NodeState>>,
    mining_bound: MiningBound,
    mining_gate: Arc<Mutex<()>>,
    max_body_bytes: usize,
}

impl Node {
    /// Fresh ledger (genesis only) served over `network`.
    pub fn new(network: Arc<NetworkNode>, mining_bound: MiningBound) -> Self {
        let ledger: SharedLedger = Arc::new(RwLock::new(LedgerState::new()));
        let resolver = ChainResolver::new(ledger.clone(), network.clone());
        Self {
            ledger,
            network,
            resolver,
            state: Arc::new(RwLock::new(NodeState::Ready)),
            mining_bound,
            mining_gate: Arc::new(Mutex::new(())),
            max_body_bytes: NetworkConfig::default().max_body_bytes,
        }
    }

    /// Overrides the request body limit applied by the router.
    pub fn with_body_limit(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// HTTP-backed node with bootstrap peers from `config` registered.
    pub fn from_config(config: &Config) -> Result<Self, ChainError> {
        let network = Arc::new(NetworkNode::from_config(&config.network)?);
        Ok(Self::new(network, config.miner.bound()).with_body_limit(config.network.max_body_bytes))
    }

    pub fn mining_bound(&self) -> MiningBound {
        self.mining_bound
    }

    pub async fn set_state(&self, state: NodeState) {
        *self.state.write().await = state;
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    InvalidInput(String),
    PayloadTooLarge,
    MiningBoundExceeded,
    Conflict(String),
    InternalError(String),
}

impl ApiError {
    /// Client-facing text; internal detail is never included.
    fn message(&self) -> &str {
        match self {
            ApiError::InvalidInput(msg) | ApiError::Conflict(msg) => msg,
            ApiError::PayloadTooLarge => "Request body too large",
            ApiError::MiningBoundExceeded => "Proof-of-work not found within bound",
            ApiError::InternalError(_) => "Internal server error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::MiningBoundExceeded => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::InternalError(detail) = &self {
            error!(error = %detail, "internal error while handling request");
        }
        let body = ErrorResponse {
            error: self.message().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Validation(msg) | ChainError::InvalidPeer(msg) => {
                ApiError::InvalidInput(msg)
            }
            ChainError::MiningBoundExceeded { .. } => ApiError::MiningBoundExceeded,
            ChainError::StaleCandidate => {
                ApiError::Conflict(ChainError::StaleCandidate.to_string())
            }
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(reason = %rejection.body_text(), "rejected request body");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::InvalidInput("Request must be JSON".to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
struct TransactionAccepted {
    message: &'static str,
    block_index: u64,
    transaction: TransactionSummary,
}

#[derive(Serialize)]
struct PendingResponse {
    pending: Vec<TransactionSummary>,
    count: usize,
}

#[derive(Serialize)]
struct PeersResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    peers: Vec<String>,
}

#[derive(Serialize)]
struct ResolveResponse {
    message: &'static str,
    length: usize,
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status and duration for every request.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints.
pub fn build_api_router(node: Arc<Node>) -> Router {
    let body_limit = DefaultBodyLimit::max(node.max_body_bytes);

    // Browser front ends on other origins call the node directly.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        // Ledger endpoints
        .route("/new_transaction", post(new_transaction))
        .route("/mine", get(mine))
        .route("/chain", get(get_chain))
        .route("/pending_tx", get(get_pending))
        // Network endpoints
        .route("/register_peer", post(register_peer))
        .route("/peers", get(get_peers))
        .route("/resolve", get(resolve))
        // System endpoints
        .route("/health", get(health_check))
        .layer(body_limit)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(node)
        .layer(cors)
}

/// Serve the API on `addr` until `shutdown` resolves.
pub async fn run_api_server<F>(
    node: Arc<Node>,
    addr: SocketAddr,
    shutdown: F,
) -> Result<(), ChainError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(node, listener, shutdown).await
}

/// Serve the API on an already-bound listener.
pub async fn serve<F>(
    node: Arc<Node>,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> Result<(), ChainError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    let app = build_api_router(node.clone());

    node.set_state(NodeState::Ready).await;
    info!(%addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    node.set_state(NodeState::ShuttingDown).await;
    info!("API server stopped");
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn new_transaction(
    State(node): State<Arc<Node>>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<TransactionAccepted>), ApiError> {
    let relayed = headers.contains_key(RELAY_HEADER);
    let record = parse_submission(payload).map_err(|e| {
        warn!(error = %e.message(), relayed, "transaction rejected");
        e
    })?;
    let summary = record.summary();

    let block_index = node.ledger.write().await.submit(record.clone())?;
    info!(
        user = %summary.user,
        v_file = %summary.v_file,
        file_size = summary.file_size,
        block_index,
        relayed,
        "transaction accepted"
    );

    if !relayed && !node.network.directory().is_empty() {
        let network = node.network.clone();
        tokio::spawn(async move {
            let deliveries = network.broadcast_transaction(&record).await;
            let delivered = deliveries.iter().filter(|d| d.is_delivered()).count();
            debug!(delivered, peers = deliveries.len(), "transaction broadcast finished");
        });
    }

    Ok((
        StatusCode::CREATED,
        Json(TransactionAccepted {
            message: "Transaction added",
            block_index,
            transaction: summary,
        }),
    ))
}

fn parse_submission(
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<TransactionRecord, ApiError> {
    let Json(body) = payload?;
    Ok(TransactionRecord::from_json(&body)?)
}

async fn mine(State(node): State<Arc<Node>>) -> Result<Json<Value>, ApiError> {
    let outcome = mine_shared(&node.ledger, &node.mining_gate, &node.mining_bound).await?;

    let body = match outcome {
        MineOutcome::NoPending { pending_count } => json!({
            "message": "No transactions to mine",
            "pending_count": pending_count,
        }),
        MineOutcome::Mined(block) => {
            let transactions: Vec<TransactionSummary> =
                block.transactions.iter().map(TransactionSummary::from).collect();
            json!({
                "message": "New Block Forged",
                "index": block.index,
                "transactions": transactions,
                "previous_hash": block.previous_hash,
                "hash": block.hash,
                "nonce": block.nonce,
                "timestamp": block.timestamp,
            })
        }
    };
    Ok(Json(body))
}

async fn get_chain(State(node): State<Arc<Node>>) -> Json<ChainSnapshot> {
    let chain = node.ledger.read().await.chain().to_vec();
    Json(ChainSnapshot::new(chain))
}

async fn get_pending(State(node): State<Arc<Node>>) -> Json<PendingResponse> {
    let ledger = node.ledger.read().await;
    let pending: Vec<TransactionSummary> =
        ledger.pending().iter().map(TransactionSummary::from).collect();
    let count = pending.len();
    Json(PendingResponse { pending, count })
}

async fn register_peer(
    State(node): State<Arc<Node>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<PeersResponse>), ApiError> {
    let Json(body) = payload?;
    let peer = body.get("peer").and_then(Value::as_str).unwrap_or_default();
    let peers = node.network.register_peer(peer)?;
    info!(peer = %peer.trim(), peers = peers.len(), "peer registered");

    Ok((
        StatusCode::CREATED,
        Json(PeersResponse {
            message: Some("New peer added"),
            peers,
        }),
    ))
}

async fn get_peers(State(node): State<Arc<Node>>) -> Json<PeersResponse> {
    Json(PeersResponse {
        message: None,
        peers: node.network.list_peers(),
    })
}

async fn resolve(State(node): State<Arc<Node>>) -> Json<ResolveResponse> {
    let report = node.resolver.resolve().await;
    Json(ResolveResponse {
        message: report.outcome.message(),
        length: report.length,
    })
}

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let state = *node.state.read().await;
    let (chain_length, pending_count) = {
        let ledger = node.ledger.read().await;
        (ledger.len(), ledger.pending().len())
    };
    let (status, label) = match state {
        NodeState::Ready => (StatusCode::OK, "healthy"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    (
        status,
        Json(json!({
            "status": label,
            "node_state": format!("{:?}", state),
            "chain_length": chain_length,
            "pending_count": pending_count,
            "peer_count": node.network.directory().len(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ChainError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(status_of(ChainError::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(ChainError::InvalidPeer("peer is required".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ChainError::MiningBoundExceeded { attempts: 10 }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_of(ChainError::StaleCandidate), StatusCode::CONFLICT);
        assert_eq!(
            status_of(ChainError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_of(ChainError::MiningCancelled), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status_of(ChainError::InvalidBlock("index overflow".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_detail_is_not_leaked() {
        let err = ChainError::Internal("secret path /etc".into());
        let response = ApiError::from(err).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"error": "Internal server error"}));
    }

    #[tokio::test]
    async fn test_validation_message_is_verbatim() {
        let err = ChainError::validation("file_data must be valid hex string");
        let response = ApiError::from(err).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"error": "file_data must be valid hex string"}));
    }
}
