//! REST API request and response bodies.
//!
//! All bodies are camelCase JSON. Failures are `{ "status": "error", "error": ... }`
//! with a status code derived from the [`ServerError`] variant.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::logs::log_error;
use crate::compile::{BatchDocument, BatchOutcome, DisperseOutcome};
use crate::error::{ChainError, PipelineError, RegistryError, ServerError, StoreError};
use crate::models::{checksum_address, network_label, Member, TokenDescriptor};
use crate::session::PayoutSession;

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAddressRequest {
    pub address: String,
}

/// Opens a payout session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayoutRequest {
    pub chain_id: u64,
    pub token_address: String,
    pub safe_address: String,
}

/// Query string of a batch upload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchQuery {
    #[serde(default)]
    pub description: Option<String>,
    /// Donation amount, sent to the configured donation address.
    #[serde(default)]
    pub donation: Option<String>,
    /// Fixed creation instant (ms).
    #[serde(default)]
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisperseBody {
    pub chain_id: u64,
    pub csv: String,
    #[serde(default)]
    pub donation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<String>,
}

// =============================================================================
// Responses
// =============================================================================

/// Token as shown to API clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenView {
    pub chain_id: u64,
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl From<&TokenDescriptor> for TokenView {
    fn from(token: &TokenDescriptor) -> Self {
        Self {
            chain_id: token.chain_id,
            address: checksum_address(&token.address),
            name: token.name.clone(),
            symbol: token.symbol.clone(),
            decimals: token.decimals,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub chain_id: u64,
    pub network: String,
    pub safe_address: String,
    pub token: TokenView,
    pub expires_in_secs: u64,
}

impl SessionResponse {
    pub fn new(session: &PayoutSession, expires_in_secs: u64) -> Self {
        Self {
            session_id: session.id.clone(),
            chain_id: session.chain_id,
            network: network_label(session.chain_id),
            safe_address: session.safe_address.clone(),
            token: TokenView::from(&session.token),
            expires_in_secs,
        }
    }
}

fn status_for(errors: &[String]) -> String {
    if errors.is_empty() { "ready" } else { "warning" }.to_string()
}

/// Compiled Safe batch plus row errors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub job_id: String,
    /// "ready" or "warning"
    pub status: String,
    pub file_name: String,
    pub batch: BatchDocument,
    pub transfers: usize,
    /// Exact total in the token's smallest unit
    pub total_amount: String,
    pub total_amount_formatted: String,
    pub token: TokenView,
    pub errors: Vec<String>,
}

impl BatchResponse {
    pub fn new(outcome: BatchOutcome, token: &TokenDescriptor) -> Self {
        let errors: Vec<String> = outcome.errors.iter().map(ToString::to_string).collect();
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: status_for(&errors),
            file_name: format!("payout-{}.json", outcome.document.created_at),
            transfers: outcome.document.transactions.len(),
            total_amount: outcome.total_amount.to_string(),
            total_amount_formatted: format!("{} {}", outcome.total_amount_formatted, token.symbol),
            token: TokenView::from(token),
            batch: outcome.document,
            errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisperseResponse {
    pub job_id: String,
    pub status: String,
    pub csv: String,
    pub transfers: usize,
    pub total_amount_formatted: String,
    pub errors: Vec<String>,
}

impl From<DisperseOutcome> for DisperseResponse {
    fn from(outcome: DisperseOutcome) -> Self {
        let errors: Vec<String> = outcome.errors.iter().map(ToString::to_string).collect();
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: status_for(&errors),
            csv: outcome.csv,
            transfers: outcome.transfers,
            total_amount_formatted: outcome.total_amount_formatted,
            errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressResponse {
    pub tenant_id: String,
    pub account_id: String,
    pub chain_id: u64,
    pub network: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingMember {
    pub account_id: String,
    pub display_name: String,
}

impl From<&Member> for MissingMember {
    fn from(member: &Member) -> Self {
        Self {
            account_id: member.account.id.clone(),
            display_name: member.display_name().to_string(),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Create an error body
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Directory(_) => StatusCode::BAD_GATEWAY,
            ServerError::Chain(e) => chain_status(e),
            ServerError::Registry(RegistryError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Registry(_) => StatusCode::BAD_REQUEST,
            ServerError::Pipeline(e) => match e {
                PipelineError::MissingParameter(_)
                | PipelineError::InvalidParameter { .. }
                | PipelineError::Csv(_) => StatusCode::BAD_REQUEST,
                PipelineError::Chain(e) => chain_status(e),
                PipelineError::Store(StoreError::Http(_)) => StatusCode::BAD_GATEWAY,
                PipelineError::Store(_) | PipelineError::Validation(_) | PipelineError::Json(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

fn chain_status(err: &ChainError) -> StatusCode {
    match err {
        ChainError::UnknownNetwork(_) | ChainError::Address(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        log_error(format!("{} {}", status.as_u16(), message));
        (status, Json(error_response(&message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AddressError;
    use crate::models::parse_address;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServerError::BadRequest("x".into()), 400),
            (ServerError::NotFound("session".into()), 404),
            (PipelineError::MissingParameter("token").into(), 400),
            (PipelineError::Store(StoreError::Backend("down".into())).into(), 500),
            (PipelineError::Chain(ChainError::Rpc("timeout".into())).into(), 502),
            (ChainError::UnknownNetwork(5).into(), 400),
            (RegistryError::Address(AddressError::Malformed("0x1".into())).into(), 400),
            (RegistryError::Store(StoreError::Backend("down".into())).into(), 500),
        ];
        for (err, code) in cases {
            assert_eq!(err.status_code().as_u16(), code, "{}", err);
        }
    }

    #[test]
    fn test_error_body() {
        let body = error_response("Missing required parameter: token");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "Missing required parameter: token");
    }

    #[test]
    fn test_token_view_is_checksummed() {
        let token = TokenDescriptor {
            chain_id: 1,
            address: parse_address("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48").unwrap(),
            name: "USD Coin".into(),
            symbol: "USDC".into(),
            decimals: 6,
        };
        let view = serde_json::to_value(TokenView::from(&token)).unwrap();
        assert_eq!(view["address"], "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
        assert_eq!(view["chainId"], 1);
    }
}
