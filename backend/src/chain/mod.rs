//! ERC20 token metadata.
//!
//! A [`TokenSource`] turns `(chain id, contract)` into a [`TokenDescriptor`].
//! [`RpcTokenSource`] asks the network through JSON-RPC `eth_call`;
//! [`StaticTokenSource`] answers from a fixed table.

use std::collections::HashMap;
use std::future::Future;

use alloy_primitives::{hex, Address, U256};
use serde::Deserialize;
use serde_json::json;

use crate::error::{ChainError, ChainResult};
use crate::models::{checksum_address, network_by_id, TokenDescriptor};

/// `name()`
const SELECTOR_NAME: &str = "0x06fdde03";
/// `symbol()`
const SELECTOR_SYMBOL: &str = "0x95d89b41";
/// `decimals()`
const SELECTOR_DECIMALS: &str = "0x313ce567";

/// Public endpoints used when no override is configured.
pub const DEFAULT_RPC_URLS: &[(u64, &str)] = &[
    (1, "https://cloudflare-eth.com"),
    (137, "https://polygon-rpc.com"),
    (42161, "https://arb1.arbitrum.io/rpc"),
    (10, "https://mainnet.optimism.io"),
    (8453, "https://mainnet.base.org"),
];

/// Read-only token metadata lookup.
pub trait TokenSource: Send + Sync {
    fn fetch_token(
        &self,
        chain_id: u64,
        contract: Address,
    ) -> impl Future<Output = ChainResult<TokenDescriptor>> + Send;
}

// =============================================================================
// JSON-RPC source
// =============================================================================

/// Token metadata over JSON-RPC
#[derive(Debug, Clone)]
pub struct RpcTokenSource {
    client: reqwest::Client,
    endpoints: HashMap<u64, String>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

impl Default for RpcTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcTokenSource {
    /// Source with the default public endpoints.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints: DEFAULT_RPC_URLS
                .iter()
                .map(|(id, url)| (*id, url.to_string()))
                .collect(),
        }
    }

    /// Replace the endpoint for one network.
    pub fn with_endpoint(mut self, chain_id: u64, url: impl Into<String>) -> Self {
        self.endpoints.insert(chain_id, url.into());
        self
    }

    pub fn endpoint(&self, chain_id: u64) -> Option<&str> {
        self.endpoints.get(&chain_id).map(String::as_str)
    }

    async fn eth_call(&self, url: &str, contract: &Address, data: &str) -> ChainResult<Vec<u8>> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{ "to": checksum_address(contract), "data": data }, "latest"],
        });

        let response: RpcResponse = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;

        if let Some(err) = response.error {
            return Err(ChainError::RpcError {
                code: err.code,
                message: err.message,
            });
        }
        let result = response
            .result
            .ok_or_else(|| ChainError::InvalidResponse("missing result".into()))?;
        hex::decode(&result).map_err(|e| ChainError::InvalidResponse(e.to_string()))
    }
}

impl TokenSource for RpcTokenSource {
    async fn fetch_token(&self, chain_id: u64, contract: Address) -> ChainResult<TokenDescriptor> {
        let url = self
            .endpoint(chain_id)
            .ok_or(ChainError::UnknownNetwork(chain_id))?;

        let name = decode_string(&self.eth_call(url, &contract, SELECTOR_NAME).await?)?;
        let symbol = decode_string(&self.eth_call(url, &contract, SELECTOR_SYMBOL).await?)?;
        let decimals = decode_u8(&self.eth_call(url, &contract, SELECTOR_DECIMALS).await?)?;

        Ok(TokenDescriptor {
            chain_id,
            address: contract,
            name,
            symbol,
            decimals,
        })
    }
}

// =============================================================================
// ABI decoding
// =============================================================================

fn invalid(message: &str) -> ChainError {
    ChainError::InvalidResponse(message.to_string())
}

fn word_at(data: &[u8], at: usize) -> ChainResult<U256> {
    let end = at.checked_add(32).ok_or_else(|| invalid("offset overflow"))?;
    let word = data.get(at..end).ok_or_else(|| invalid("truncated ABI word"))?;
    Ok(U256::from_be_slice(word))
}

fn word_as_usize(data: &[u8], at: usize) -> ChainResult<usize> {
    usize::try_from(word_at(data, at)?).map_err(|_| invalid("ABI offset too large"))
}

/// Decode an ABI `string` return value.
///
/// Some older tokens return `bytes32` instead; that is accepted too, with
/// trailing zero bytes removed.
pub fn decode_string(data: &[u8]) -> ChainResult<String> {
    if data.len() == 32 {
        let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
        return String::from_utf8(data[..end].to_vec()).map_err(|_| invalid("bytes32 is not UTF-8"));
    }

    let offset = word_as_usize(data, 0)?;
    let len = word_as_usize(data, offset)?;
    let start = offset + 32;
    let bytes = start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| invalid("truncated ABI string"))?;
    String::from_utf8(bytes.to_vec()).map_err(|_| invalid("string is not UTF-8"))
}

/// Decode an ABI `uint8` return value.
pub fn decode_u8(data: &[u8]) -> ChainResult<u8> {
    u8::try_from(word_at(data, 0)?).map_err(|_| invalid("decimals out of range"))
}

// =============================================================================
// Fixed source
// =============================================================================

/// Token metadata from a fixed table
#[derive(Debug, Clone, Default)]
pub struct StaticTokenSource {
    tokens: HashMap<(u64, Address), TokenDescriptor>,
}

impl StaticTokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: TokenDescriptor) -> Self {
        self.tokens.insert((token.chain_id, token.address), token);
        self
    }
}

impl TokenSource for StaticTokenSource {
    async fn fetch_token(&self, chain_id: u64, contract: Address) -> ChainResult<TokenDescriptor> {
        if network_by_id(chain_id).is_none() {
            return Err(ChainError::UnknownNetwork(chain_id));
        }
        self.tokens
            .get(&(chain_id, contract))
            .cloned()
            .ok_or_else(|| ChainError::InvalidResponse(format!("unknown token {}", checksum_address(&contract))))
    }
}

/// Source chosen at runtime.
#[derive(Debug)]
pub enum AnyTokenSource {
    Rpc(RpcTokenSource),
    Static(StaticTokenSource),
}

impl TokenSource for AnyTokenSource {
    async fn fetch_token(&self, chain_id: u64, contract: Address) -> ChainResult<TokenDescriptor> {
        match self {
            AnyTokenSource::Rpc(s) => s.fetch_token(chain_id, contract).await,
            AnyTokenSource::Static(s) => s.fetch_token(chain_id, contract).await,
        }
    }
}
