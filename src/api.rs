//! REST API for the HYBRID ledger core
//!
//! Thin HTTP collaborator over `LedgerCore`: transaction ingress, pool
//! introspection, block lookup and validation, and validator queries.

use axum::{
    extract::{Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hex::decode_to_slice;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use crate::blockchain::{Block, ChainStats, ProducerStats, TipState};
use crate::consensus::{RegistryStats, Validator, ValidatorStatus};
use crate::crypto::{address_to_hex, parse_address, Address, Sha256Hash};
use crate::error::{ChainError, RejectReason};
use crate::node::{LedgerCore, NodeState};
use crate::transaction::Transaction;

pub const DEFAULT_API_PORT: u16 = 3000;

#[derive(Debug)]
pub enum ApiError {
    Chain(ChainError),
    InvalidInput(String),
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Chain(e) => {
                let status = match &e {
                    ChainError::Admission(RejectReason::Duplicate(_))
                    | ChainError::Admission(RejectReason::NonceMismatch { .. })
                    | ChainError::GenesisAlreadySeeded => StatusCode::CONFLICT,
                    ChainError::ChainNotInitialized
                    | ChainError::Admission(RejectReason::PoolFull { .. }) => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    ChainError::Admission(_) | ChainError::Registry(_) => StatusCode::BAD_REQUEST,
                    ChainError::InvalidBlock(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::Chain(err)
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
pub struct SubmitResponse {
    pub hash: String,
}

#[derive(Serialize)]
pub struct BlockResponse {
    pub hash: String,
    pub height: u64,
    pub block: Block,
}

impl From<Block> for BlockResponse {
    fn from(block: Block) -> Self {
        Self {
            hash: block.hash_str(),
            height: block.height(),
            block,
        }
    }
}

#[derive(Serialize)]
pub struct ChainStatsResponse {
    pub tip: TipState,
    pub chain: ChainStats,
    pub producer: ProducerStats,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

#[derive(Serialize)]
pub struct AddressTransactionsResponse {
    pub address: String,
    pub expected_nonce: u64,
    pub transactions: Vec<Transaction>,
}

/// Validator rendered with decimal rates.
#[derive(Serialize)]
pub struct ValidatorView {
    pub address: String,
    pub moniker: String,
    pub status: ValidatorStatus,
    pub commission_rate: f64,
    pub max_commission_rate: f64,
    pub min_self_delegation: u64,
    pub self_delegation: u64,
    pub total_delegation: u64,
    pub jailed_until: Option<u64>,
    pub missed_blocks: u64,
    pub uptime: f64,
    pub license: Option<String>,
}

impl From<&Validator> for ValidatorView {
    fn from(v: &Validator) -> Self {
        Self {
            address: v.address_hex(),
            moniker: v.description.moniker.clone(),
            status: v.status,
            commission_rate: v.commission.rate.to_num(),
            max_commission_rate: v.commission.max_rate.to_num(),
            min_self_delegation: v.min_self_delegation,
            self_delegation: v.self_delegation,
            total_delegation: v.total_delegation,
            jailed_until: v.jailed_until,
            missed_blocks: v.missed_blocks,
            uptime: v.uptime.to_num(),
            license: v.license.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct ActiveSetResponse {
    pub count: usize,
    pub validators: Vec<ValidatorView>,
}

#[derive(Serialize)]
pub struct ValidatorsResponse {
    pub stats: RegistryStats,
    pub validators: Vec<ValidatorView>,
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Parses a 64-character hex string into a Sha256Hash ([u8; 32]).
fn parse_hash(hash_str: &str) -> Result<Sha256Hash, ApiError> {
    if hash_str.len() != 64 {
        return Err(ApiError::InvalidInput(
            "Hash must be a 64-character hex string".to_string(),
        ));
    }
    let mut hash_bytes = [0u8; 32];
    decode_to_slice(hash_str, &mut hash_bytes)
        .map_err(|e| ApiError::InvalidInput(format!("Invalid hex hash: {}", e)))?;
    Ok(hash_bytes)
}

fn parse_address_param(addr: &str) -> Result<Address, ApiError> {
    parse_address(addr).map_err(|e| ApiError::InvalidInput(e.to_string()))
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status, duration and node state for every request.
async fn logging_middleware(
    State(core): State<Arc<LedgerCore>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let node_state = core.state().await;
    info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        node_state = ?node_state,
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(core: Arc<LedgerCore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    let api_routes = Router::new()
        // Pool endpoints
        .route("/transactions", post(submit_transaction))
        .route("/transactions/:hash", get(get_transaction))
        .route("/mempool/stats", get(get_mempool_stats))
        .route("/addresses/:addr/transactions", get(get_address_transactions))
        // Chain endpoints
        .route("/blocks/latest", get(get_latest_block))
        .route("/blocks/height/:height", get(get_block_by_height))
        .route("/blocks/hash/:hash", get(get_block_by_hash))
        .route("/blocks/validate", post(validate_block))
        .route("/chain/stats", get(get_chain_stats))
        // Validator endpoints
        .route("/validators", get(get_validators))
        .route("/validators/active", get(get_active_set))
        .route("/validators/:addr", get(get_validator))
        // System endpoints
        .route("/health", get(health_check))
        .layer(middleware::from_fn_with_state(core.clone(), logging_middleware))
        .with_state(core);

    Router::new().nest("/api", api_routes).layer(cors)
}

/// Serve the API on `port` until `shutdown` resolves.
pub async fn run_api_server(
    core: Arc<LedgerCore>,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_api_router(core);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, "api.listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check(State(core): State<Arc<LedgerCore>>) -> impl IntoResponse {
    let state = core.state().await;
    let (status, label) = match state {
        NodeState::Ready => (StatusCode::OK, "healthy"),
        NodeState::Booting => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };
    (
        status,
        Json(serde_json::json!({
            "status": label,
            "node_state": state,
            "pending_transactions": core.stats().pending_count,
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

async fn get_mempool_stats(State(core): State<Arc<LedgerCore>>) -> impl IntoResponse {
    Json(core.stats())
}

async fn submit_transaction(
    State(core): State<Arc<LedgerCore>>,
    Json(tx): Json<Transaction>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let hash = core.submit(tx).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            hash: hex::encode(hash),
        }),
    ))
}

async fn get_transaction(
    State(core): State<Arc<LedgerCore>>,
    Path(hash_str): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    let hash = parse_hash(&hash_str)?;
    core.get_transaction(&hash)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Transaction {} not found", hash_str)))
}

async fn get_address_transactions(
    State(core): State<Arc<LedgerCore>>,
    Path(addr): Path<String>,
) -> Result<Json<AddressTransactionsResponse>, ApiError> {
    let address = parse_address_param(&addr)?;
    Ok(Json(AddressTransactionsResponse {
        address: address_to_hex(&address),
        expected_nonce: core.expected_nonce(&address).await,
        transactions: core.transactions_for_address(&address).await,
    }))
}

async fn get_latest_block(State(core): State<Arc<LedgerCore>>) -> Result<Json<BlockResponse>, ApiError> {
    core.get_latest_block()
        .await
        .map(|b| Json(b.into()))
        .ok_or(ApiError::Chain(ChainError::ChainNotInitialized))
}

async fn get_block_by_height(
    State(core): State<Arc<LedgerCore>>,
    Path(height): Path<u64>,
) -> Result<Json<BlockResponse>, ApiError> {
    core.get_block_by_height(height)
        .await
        .map(|b| Json(b.into()))
        .ok_or_else(|| ApiError::NotFound(format!("Block at height {} not found", height)))
}

async fn get_block_by_hash(
    State(core): State<Arc<LedgerCore>>,
    Path(hash_str): Path<String>,
) -> Result<Json<BlockResponse>, ApiError> {
    let hash = parse_hash(&hash_str)?;
    core.get_block_by_hash(&hash)
        .await
        .map(|b| Json(b.into()))
        .ok_or_else(|| ApiError::NotFound(format!("Block {} not found", hash_str)))
}

async fn validate_block(
    State(core): State<Arc<LedgerCore>>,
    Json(block): Json<Block>,
) -> impl IntoResponse {
    Json(ValidateResponse {
        valid: core.validate_block(&block).await,
    })
}

async fn get_chain_stats(State(core): State<Arc<LedgerCore>>) -> impl IntoResponse {
    Json(ChainStatsResponse {
        tip: core.tip_state().await,
        chain: core.chain_stats().await,
        producer: core.producer_stats().await,
    })
}

async fn get_validators(State(core): State<Arc<LedgerCore>>) -> impl IntoResponse {
    let validators = core
        .all_validators()
        .await
        .iter()
        .map(ValidatorView::from)
        .collect();
    Json(ValidatorsResponse {
        stats: core.registry_stats().await,
        validators,
    })
}

async fn get_active_set(State(core): State<Arc<LedgerCore>>) -> impl IntoResponse {
    let mut validators = Vec::new();
    for address in core.get_active_set().await {
        if let Some(v) = core.get_validator(&address).await {
            validators.push(ValidatorView::from(&v));
        }
    }
    Json(ActiveSetResponse {
        count: validators.len(),
        validators,
    })
}

async fn get_validator(
    State(core): State<Arc<LedgerCore>>,
    Path(addr): Path<String>,
) -> Result<Json<ValidatorView>, ApiError> {
    let address = parse_address_param(&addr)?;
    core.get_validator(&address)
        .await
        .map(|v| Json(ValidatorView::from(&v)))
        .ok_or_else(|| ApiError::NotFound(format!("Validator {} not found", addr)))
}
