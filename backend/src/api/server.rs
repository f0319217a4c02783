//! HTTP server for the payout API.
//!
//! # API Endpoints
//!
//! | Method             | Path                                                  | Description                     |
//! |--------------------|-------------------------------------------------------|---------------------------------|
//! | GET                | `/health`                                             | Health check                    |
//! | GET                | `/api/logs`                                           | SSE stream of pipeline logs     |
//! | GET                | `/api/networks`                                       | Supported networks              |
//! | GET, PUT, DELETE   | `/api/tenants/{tenant}/accounts/{account}/addresses/{chain}` | One registered address   |
//! | GET                | `/api/tenants/{tenant}/accounts/{account}/addresses`  | Every address of an account     |
//! | GET                | `/api/tenants/{tenant}/networks/{chain}/addresses`    | Registry of a network (`?format=csv`) |
//! | GET                | `/api/tenants/{tenant}/networks/{chain}/missing`      | Members without an address      |
//! | POST               | `/api/tenants/{tenant}/payouts`                       | Open a payout session           |
//! | POST               | `/api/payouts/{session}/batch`                        | Upload the list, get the batch  |
//! | POST               | `/api/tenants/{tenant}/disperse`                      | Compile a disperse list         |
//! | GET, POST          | `/rpc/{method}`                                       | `ping`, `getAddress`            |

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, log_success, LOG_BROADCASTER};
use super::rpc::{dispatch, RpcRequest};
use super::types::{
    AddressResponse, BatchQuery, BatchResponse, CreatePayoutRequest, DisperseBody, DisperseResponse,
    ExportQuery, MissingMember, SessionResponse, SetAddressRequest,
};
use crate::chain::{AnyTokenSource, TokenSource};
use crate::compile::{compile_batch, compile_disperse, BatchOutcome, BatchRequest, DisperseRequest};
use crate::config::Config;
use crate::error::{ConfigError, ServerError, ServerResult};
use crate::identity::{AnyDirectory, MemberDirectory};
use crate::ledger::{AddressRegistry, AnyStore};
use crate::models::{checksum_address, network_by_id, network_label, parse_address, AddressRecord, Donation, Network, NETWORKS};
use crate::parser::decode_bytes;
use crate::session::{PayoutSession, SessionStore};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AddressRegistry<AnyStore>>,
    pub directory: Arc<AnyDirectory>,
    pub tokens: Arc<AnyTokenSource>,
    pub sessions: Arc<SessionStore>,
    /// Destination of `?donation=` amounts.
    pub donation_address: Option<String>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            registry: Arc::new(AddressRegistry::new(config.open_store()?)),
            directory: Arc::new(config.open_directory()?),
            tokens: Arc::new(AnyTokenSource::Rpc(config.token_source())),
            sessions: Arc::new(SessionStore::new(config.session_ttl)),
            donation_address: config.donation_address.clone(),
        })
    }

    fn donation(&self, amount: Option<&str>) -> ServerResult<Option<Donation>> {
        let Some(amount) = amount.map(str::trim).filter(|a| !a.is_empty()) else {
            return Ok(None);
        };
        let address = self
            .donation_address
            .clone()
            .ok_or_else(|| ServerError::BadRequest("no donation address configured".into()))?;
        Ok(Some(Donation {
            address,
            amount: amount.to_string(),
        }))
    }
}

/// All routes, with CORS.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/logs", get(sse_logs))
        .route("/api/networks", get(networks))
        .route(
            "/api/tenants/{tenant}/accounts/{account}/addresses/{chain}",
            get(get_address).put(put_address).delete(delete_address),
        )
        .route("/api/tenants/{tenant}/accounts/{account}/addresses", get(account_addresses))
        .route("/api/tenants/{tenant}/networks/{chain}/addresses", get(network_addresses))
        .route("/api/tenants/{tenant}/networks/{chain}/missing", get(missing_members))
        .route("/api/tenants/{tenant}/payouts", post(create_payout))
        .route("/api/payouts/{session}/batch", post(upload_batch))
        .route("/api/tenants/{tenant}/disperse", post(disperse))
        .route("/rpc/{method}", get(rpc_get).post(rpc_post))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::from_config(&config)?;

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            let expired = sessions.purge_expired();
            if expired > 0 {
                log_info(format!("Expired {} payout session(s)", expired));
            }
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("🚀 Payout server running on http://localhost:{}", config.port);
    println!("   Store:     {}", state.registry.store().kind());
    println!("   POST /api/tenants/{{tenant}}/payouts - Open a payout session");
    println!("   POST /api/payouts/{{session}}/batch  - Upload recipients, get Safe batch");
    println!("   POST /api/tenants/{{tenant}}/disperse - Compile a disperse list");
    println!("   GET  /api/logs                      - SSE log stream");
    println!("   GET  /health                        - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "payout",
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.registry.store().kind(),
        "sessions": state.sessions.len(),
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn networks() -> Json<&'static [Network]> {
    Json(NETWORKS)
}

fn known_network(chain_id: u64) -> ServerResult<&'static Network> {
    network_by_id(chain_id).ok_or_else(|| ServerError::BadRequest(format!("unsupported chain id {}", chain_id)))
}

fn address_response(tenant: String, account: String, chain_id: u64, address: Option<String>) -> AddressResponse {
    AddressResponse {
        tenant_id: tenant,
        account_id: account,
        chain_id,
        network: network_label(chain_id),
        address,
    }
}

// =============================================================================
// Registry
// =============================================================================

async fn get_address(
    State(state): State<AppState>,
    Path((tenant, account, chain_id)): Path<(String, String, u64)>,
) -> ServerResult<Json<AddressResponse>> {
    let address = state.registry.get_address(&tenant, &account, chain_id).await?;
    Ok(Json(address_response(tenant, account, chain_id, address)))
}

async fn put_address(
    State(state): State<AppState>,
    Path((tenant, account, chain_id)): Path<(String, String, u64)>,
    Json(body): Json<SetAddressRequest>,
) -> ServerResult<Json<AddressResponse>> {
    let network = known_network(chain_id)?;
    let address = state
        .registry
        .set_address(&tenant, &account, chain_id, &body.address)
        .await?;
    log_success(format!("{} registered {} on {}", account, address, network.name));
    Ok(Json(address_response(tenant, account, chain_id, Some(address))))
}

async fn delete_address(
    State(state): State<AppState>,
    Path((tenant, account, chain_id)): Path<(String, String, u64)>,
) -> ServerResult<Json<Value>> {
    let removed = state.registry.remove_address(&tenant, &account, chain_id).await?;
    if removed {
        log_info(format!("{} removed address on {}", account, network_label(chain_id)));
    }
    Ok(Json(json!({ "removed": removed })))
}

async fn account_addresses(
    State(state): State<AppState>,
    Path((tenant, account)): Path<(String, String)>,
) -> ServerResult<Json<Vec<AddressRecord>>> {
    Ok(Json(state.registry.addresses_for_account(&tenant, &account).await?))
}

async fn network_addresses(
    State(state): State<AppState>,
    Path((tenant, chain_id)): Path<(String, u64)>,
    Query(query): Query<ExportQuery>,
) -> ServerResult<Response> {
    if query.format.as_deref() != Some("csv") {
        let records = state.registry.accounts_on_network(&tenant, chain_id).await?;
        return Ok(Json(records).into_response());
    }

    let members = state.directory.list_members(&tenant).await?;
    let csv = state.registry.export_csv(&tenant, Some(chain_id), &members).await?;
    let disposition = format!("attachment; filename=\"addresses-{}.csv\"", chain_id);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

async fn missing_members(
    State(state): State<AppState>,
    Path((tenant, chain_id)): Path<(String, u64)>,
) -> ServerResult<Json<Vec<MissingMember>>> {
    known_network(chain_id)?;
    let members = state.directory.list_members(&tenant).await?;
    let missing = state.registry.missing_accounts(&tenant, chain_id, &members).await?;
    Ok(Json(missing.into_iter().map(MissingMember::from).collect()))
}

// =============================================================================
// Payouts
// =============================================================================

async fn create_payout(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(body): Json<CreatePayoutRequest>,
) -> ServerResult<(StatusCode, Json<SessionResponse>)> {
    let network = known_network(body.chain_id)?;
    let contract = parse_address(&body.token_address)
        .map_err(|e| ServerError::BadRequest(format!("tokenAddress: {}", e)))?;
    let safe = parse_address(&body.safe_address)
        .map_err(|e| ServerError::BadRequest(format!("safeAddress: {}", e)))?;

    let token = state.tokens.fetch_token(body.chain_id, contract).await?;
    log_info(format!(
        "Payout of {} ({}) on {} from safe {}",
        token.name,
        token.symbol,
        network.name,
        checksum_address(&safe)
    ));

    let session = state
        .sessions
        .create(&tenant, body.chain_id, &checksum_address(&safe), token);
    let response = SessionResponse::new(&session, state.sessions.ttl().as_secs());
    Ok((StatusCode::CREATED, Json(response)))
}

/// Raw body, or the `file` field of a multipart form.
async fn read_upload(request: Request) -> ServerResult<Vec<u8>> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if !is_multipart {
        let bytes = axum::body::to_bytes(request.into_body(), MAX_UPLOAD_BYTES)
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
        return Ok(bytes.to_vec());
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            return Ok(bytes.to_vec());
        }
    }
    Err(ServerError::BadRequest("No file provided".into()))
}

async fn upload_batch(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<BatchQuery>,
    request: Request,
) -> ServerResult<Json<BatchResponse>> {
    // Claimed up front so concurrent uploads cannot both compile
    let claimed = state
        .sessions
        .claim(&session_id)
        .ok_or_else(|| ServerError::NotFound(format!("payout session '{}'", session_id)))?;

    match compile_upload(&state, &claimed.session, query, request).await {
        Ok(outcome) => Ok(Json(BatchResponse::new(outcome, &claimed.session.token))),
        Err(e) => {
            state.sessions.restore(claimed);
            Err(e)
        }
    }
}

async fn compile_upload(
    state: &AppState,
    session: &PayoutSession,
    query: BatchQuery,
    request: Request,
) -> ServerResult<BatchOutcome> {
    let bytes = read_upload(request).await?;
    log_info(format!("Upload for session {} ({} bytes)", session.id, bytes.len()));
    let text = decode_bytes(&bytes);

    let request = BatchRequest {
        tenant: session.tenant.clone(),
        chain_id: session.chain_id,
        token: Some(session.token.clone()),
        safe_address: session.safe_address.clone(),
        description: query.description.unwrap_or_default(),
        donation: state.donation(query.donation.as_deref())?,
        created_at: query.created_at,
    };
    Ok(compile_batch(state.registry.as_ref(), state.directory.as_ref(), &request, &text).await?)
}

async fn disperse(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(body): Json<DisperseBody>,
) -> ServerResult<Json<DisperseResponse>> {
    let request = DisperseRequest {
        tenant,
        chain_id: body.chain_id,
        donation: state.donation(body.donation.as_deref())?,
    };
    let outcome = compile_disperse(state.registry.as_ref(), state.directory.as_ref(), &request, &body.csv).await?;
    Ok(Json(DisperseResponse::from(outcome)))
}

// =============================================================================
// RPC
// =============================================================================

async fn run_rpc(state: &AppState, method: &str, params: Value) -> ServerResult<Json<Value>> {
    let request = RpcRequest::parse(method, params)?;
    let id = uuid::Uuid::new_v4().simple().to_string();
    log_info(format!("Rpc request {} {}", &id[..8], request.method()));
    Ok(Json(dispatch(state.registry.as_ref(), request).await?))
}

async fn rpc_get(
    State(state): State<AppState>,
    Path(method): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> ServerResult<Json<Value>> {
    let params: Map<String, Value> = query.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
    run_rpc(&state, &method, Value::Object(params)).await
}

async fn rpc_post(
    State(state): State<AppState>,
    Path(method): Path<String>,
    body: Bytes,
) -> ServerResult<Json<Value>> {
    let params = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|e| ServerError::BadRequest(format!("Invalid JSON: {}", e)))?
    };
    run_rpc(&state, &method, params).await
}
