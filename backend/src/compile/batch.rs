//! Safe transaction-builder batch document.
//!
//! One ERC20 `transfer(to, value)` call per recipient, values string-encoded
//! in the token's smallest unit. The checksum is computed last, over the
//! finished document, and written into `meta.checksum`.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::checksum::compute_checksum;
use crate::error::{AmountError, PipelineResult};
use crate::models::checksum_address;

/// Batch format version understood by the transaction builder.
pub const FORMAT_VERSION: &str = "1.0";

/// Transaction builder version the batch claims to come from.
pub const TX_BUILDER_VERSION: &str = "1.18.0";

/// Display title. Not covered by the checksum.
pub const BATCH_NAME: &str = "Transactions Batch";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDocument {
    pub version: String,
    pub chain_id: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    pub meta: BatchMeta,
    pub transactions: Vec<BatchTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMeta {
    pub name: String,
    pub description: String,
    pub tx_builder_version: String,
    pub created_from_safe_address: String,
    pub created_from_owner_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTransaction {
    /// Token contract.
    pub to: String,
    /// Native value, always `"0"` for token transfers.
    pub value: String,
    pub data: Option<String>,
    pub contract_method: ContractMethod,
    pub contract_inputs_values: TransferInputs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMethod {
    pub inputs: Vec<MethodInput>,
    pub name: String,
    pub payable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodInput {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub internal_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInputs {
    pub to: String,
    pub value: String,
}

impl MethodInput {
    fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            internal_type: kind.to_string(),
        }
    }
}

impl ContractMethod {
    /// `transfer(address to, uint256 value)`
    pub fn erc20_transfer() -> Self {
        Self {
            inputs: vec![MethodInput::new("to", "address"), MethodInput::new("value", "uint256")],
            name: "transfer".to_string(),
            payable: false,
        }
    }
}

impl BatchTransaction {
    pub fn erc20_transfer(token: &Address, to: &Address, value: U256) -> Self {
        Self {
            to: checksum_address(token),
            value: "0".to_string(),
            data: None,
            contract_method: ContractMethod::erc20_transfer(),
            contract_inputs_values: TransferInputs {
                to: checksum_address(to),
                value: value.to_string(),
            },
        }
    }
}

/// Accumulates transfers and produces a stamped [`BatchDocument`].
///
/// # Example
/// ```ignore
/// let mut builder = BatchBuilder::new(1, usdc, safe).created_at(1750255509666);
/// builder.push_transfer(&recipient, U256::from(1_000_000u64))?;
/// let document = builder.build()?;
/// ```
#[derive(Debug, Clone)]
pub struct BatchBuilder {
    chain_id: u64,
    token: Address,
    safe_address: Address,
    description: String,
    created_at: Option<i64>,
    transactions: Vec<BatchTransaction>,
    total: U256,
}

impl BatchBuilder {
    pub fn new(chain_id: u64, token: Address, safe_address: Address) -> Self {
        Self {
            chain_id,
            token,
            safe_address,
            description: String::new(),
            created_at: None,
            transactions: Vec::new(),
            total: U256::ZERO,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Fix the creation instant instead of reading the clock at build time.
    pub fn created_at(mut self, millis: i64) -> Self {
        self.created_at = Some(millis);
        self
    }

    /// Append one transfer. The running total is exact; on overflow
    /// nothing is appended.
    pub fn push_transfer(&mut self, to: &Address, value: U256) -> Result<(), AmountError> {
        self.total = self.total.checked_add(value).ok_or(AmountError::Overflow)?;
        self.transactions
            .push(BatchTransaction::erc20_transfer(&self.token, to, value));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Sum of all transfer values, in the token's smallest unit.
    pub fn total(&self) -> U256 {
        self.total
    }

    /// Finish the document and stamp its checksum.
    pub fn build(self) -> PipelineResult<BatchDocument> {
        let created_at = self
            .created_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

        let mut document = BatchDocument {
            version: FORMAT_VERSION.to_string(),
            chain_id: self.chain_id.to_string(),
            created_at,
            meta: BatchMeta {
                name: BATCH_NAME.to_string(),
                description: self.description,
                tx_builder_version: TX_BUILDER_VERSION.to_string(),
                created_from_safe_address: checksum_address(&self.safe_address),
                created_from_owner_address: String::new(),
                checksum: None,
            },
            transactions: self.transactions,
        };

        let checksum = compute_checksum(&serde_json::to_value(&document)?);
        document.meta.checksum = Some(checksum);
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::checksum::{verify_checksum, ChecksumStatus};
    use crate::models::parse_address;

    const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
    const SAFE: &str = "0x7eC991e1648B7F1d5fa91ae3688C9f36a5CA6C8B";
    const RECIPIENT: &str = "0x116Da30d890533516f2683731F9Bd167807448b8";

    fn builder() -> BatchBuilder {
        BatchBuilder::new(1, parse_address(USDC).unwrap(), parse_address(SAFE).unwrap())
            .created_at(1750255509666)
    }

    #[test]
    fn test_golden_batch() {
        let mut builder = builder();
        builder
            .push_transfer(&parse_address(RECIPIENT).unwrap(), U256::from(1_000_000u64))
            .unwrap();
        let document = builder.build().unwrap();

        assert_eq!(
            document.meta.checksum.as_deref(),
            Some("0xf1966baf2cdc7c68774e5be291e81549cc7438efbceccaad0003bb12f8d30baf")
        );
        assert_eq!(document.chain_id, "1");
        assert_eq!(document.transactions[0].to, USDC);
        assert_eq!(document.transactions[0].contract_inputs_values.to, RECIPIENT);
    }

    #[test]
    fn test_serialized_shape() {
        let mut builder = builder().description("June");
        builder
            .push_transfer(&parse_address(RECIPIENT).unwrap(), U256::from(5u64))
            .unwrap();
        let value = serde_json::to_value(builder.build().unwrap()).unwrap();

        assert_eq!(value["createdAt"], 1750255509666i64);
        assert_eq!(value["meta"]["txBuilderVersion"], "1.18.0");
        assert_eq!(value["meta"]["createdFromOwnerAddress"], "");
        assert!(value["transactions"][0]["data"].is_null());
        assert_eq!(value["transactions"][0]["contractMethod"]["inputs"][1]["type"], "uint256");
        assert_eq!(value["transactions"][0]["contractMethod"]["inputs"][1]["internalType"], "uint256");
        assert_eq!(verify_checksum(&value), ChecksumStatus::Valid);
    }

    #[test]
    fn test_total_is_exact() {
        let mut builder = builder();
        let to = parse_address(RECIPIENT).unwrap();
        let big = U256::from(u128::MAX);
        builder.push_transfer(&to, big).unwrap();
        builder.push_transfer(&to, U256::from(1u64)).unwrap();
        assert_eq!(builder.total(), big + U256::from(1u64));
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn test_total_overflow_rejected() {
        let mut builder = builder();
        let to = parse_address(RECIPIENT).unwrap();
        builder.push_transfer(&to, U256::MAX).unwrap();
        assert_eq!(builder.push_transfer(&to, U256::from(1u64)), Err(AmountError::Overflow));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_empty_batch_still_stamped() {
        let document = builder().build().unwrap();
        assert!(document.transactions.is_empty());
        assert!(document.meta.checksum.is_some());
    }
}
