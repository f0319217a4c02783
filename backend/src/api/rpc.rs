//! Method-per-variant RPC surface (`GET|POST /rpc/{method}`).
//!
//! The method name from the path and the parameters (query string for GET,
//! JSON body for POST) are parsed into an [`RpcRequest`] before anything
//! runs; unknown methods and bad parameters are rejected up front.

use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::error::{ServerError, ServerResult};
use crate::ledger::{AddressRegistry, KvStore};

/// Parameters of `getAddress`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAddressParams {
    #[serde(alias = "discordId")]
    pub account_id: String,
    #[serde(deserialize_with = "chain_id_from_any")]
    pub chain_id: u64,
    #[serde(alias = "guildId")]
    pub tenant_id: String,
}

/// Query strings carry every value as text.
fn chain_id_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcRequest {
    Ping,
    GetAddress(GetAddressParams),
}

impl RpcRequest {
    pub fn parse(method: &str, params: Value) -> ServerResult<Self> {
        match method {
            "ping" => Ok(RpcRequest::Ping),
            "getAddress" => serde_json::from_value(params)
                .map(RpcRequest::GetAddress)
                .map_err(|e| ServerError::BadRequest(format!("getAddress: {}", e))),
            other => Err(ServerError::NotFound(format!("rpc method '{}'", other))),
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            RpcRequest::Ping => "ping",
            RpcRequest::GetAddress(_) => "getAddress",
        }
    }
}

/// Run a parsed request. The result is the bare JSON value.
pub async fn dispatch<S: KvStore>(registry: &AddressRegistry<S>, request: RpcRequest) -> ServerResult<Value> {
    match request {
        RpcRequest::Ping => Ok(json!("pong")),
        RpcRequest::GetAddress(p) => {
            let address = registry.get_address(&p.tenant_id, &p.account_id, p.chain_id).await?;
            Ok(json!(address))
        }
    }
}
