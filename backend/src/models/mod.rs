//! Domain models shared by the pipeline components.
//!
//! - [`Network`] - supported EVM networks
//! - [`TokenDescriptor`] - ERC20 metadata for one compilation run
//! - [`Account`] / [`Member`] - identities known to a member directory
//! - [`AddressRecord`] - one registry entry
//! - [`Donation`] - optional extra transfer appended to a payout

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::AddressError;

// =============================================================================
// Networks
// =============================================================================

/// An EVM network payouts can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub chain_id: u64,
    pub name: &'static str,
    pub currency: &'static str,
}

/// Networks offered to operators.
pub const NETWORKS: &[Network] = &[
    Network { chain_id: 1, name: "Ethereum Mainnet", currency: "ETH" },
    Network { chain_id: 137, name: "Polygon Mainnet", currency: "MATIC" },
    Network { chain_id: 42161, name: "Arbitrum One", currency: "ETH" },
    Network { chain_id: 10, name: "Optimism", currency: "ETH" },
    Network { chain_id: 8453, name: "Base Mainnet", currency: "ETH" },
];

/// Look up a supported network by chain id.
pub fn network_by_id(chain_id: u64) -> Option<&'static Network> {
    NETWORKS.iter().find(|n| n.chain_id == chain_id)
}

/// Human label for a chain id, e.g. `Optimism (10)`.
pub fn network_label(chain_id: u64) -> String {
    match network_by_id(chain_id) {
        Some(n) => format!("{} ({})", n.name, chain_id),
        None => format!("Unknown Network ({})", chain_id),
    }
}

// =============================================================================
// Addresses
// =============================================================================

/// Parse an EVM address.
///
/// Accepts `0x` followed by 40 hex digits. All-lowercase and all-uppercase
/// input is taken as-is; mixed case must carry a valid EIP-55 checksum.
pub fn parse_address(text: &str) -> Result<Address, AddressError> {
    let text = text.trim();
    let hex = text
        .strip_prefix("0x")
        .ok_or_else(|| AddressError::Malformed(text.to_string()))?;

    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AddressError::Malformed(text.to_string()));
    }

    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());

    if has_lower && has_upper {
        Address::parse_checksummed(text, None)
            .map_err(|_| AddressError::BadChecksum(text.to_string()))
    } else {
        Address::from_str(text).map_err(|_| AddressError::Malformed(text.to_string()))
    }
}

/// EIP-55 rendering of an address.
pub fn checksum_address(address: &Address) -> String {
    address.to_checksum(None)
}

// =============================================================================
// Token
// =============================================================================

/// ERC20 metadata, fixed for the duration of one compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDescriptor {
    pub chain_id: u64,
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

// =============================================================================
// Identities
// =============================================================================

/// A canonical account as known by the member directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Numeric account id (snowflake).
    pub id: String,
    /// Primary (unique) name.
    pub username: String,
    /// Legacy 4-digit tag, `"0"` for accounts without one.
    #[serde(default)]
    pub discriminator: Option<String>,
    /// Account-wide display name.
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

/// An account's membership in one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub account: Account,
    /// Tenant-local nickname.
    #[serde(default)]
    pub nickname: Option<String>,
}

impl Member {
    /// Name shown in the tenant: nickname, then global name, then username.
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .or(self.account.global_name.as_deref())
            .unwrap_or(&self.account.username)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// One registered address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    pub tenant_id: String,
    pub account_id: String,
    pub chain_id: u64,
    pub address: String,
}

// =============================================================================
// Donation
// =============================================================================

/// Extra transfer appended after all recipients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub address: String,
    pub amount: String,
}
