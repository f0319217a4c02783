//! JSON Schema validation for compiled batches.
//!
//! The Safe transaction-builder batch schema is embedded at compile time
//! from `schemas/safe-batch.json` and checked with JSON Schema Draft 7.
//!
//! # Example
//!
//! ```rust,ignore
//! use payout::validation::validate_batch;
//!
//! let document = serde_json::to_value(&outcome.document)?;
//! if let Err(errors) = validate_batch(&document) {
//!     for e in errors {
//!         eprintln!("{}", e);
//!     }
//! }
//! ```

use serde_json::Value;

const SAFE_BATCH_SCHEMA: &str = include_str!("../../schemas/safe-batch.json");

/// Validate a JSON value against a schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with one message per violation
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn batch_schema() -> Result<Value, Vec<String>> {
    serde_json::from_str(SAFE_BATCH_SCHEMA).map_err(|e| vec![format!("Invalid embedded schema: {}", e)])
}

/// Validate against the Safe batch schema.
pub fn validate_batch(document: &Value) -> Result<(), Vec<String>> {
    validate(&batch_schema()?, document)
}

/// Quick check against the Safe batch schema.
pub fn is_valid_batch(document: &Value) -> bool {
    match batch_schema() {
        Ok(schema) => jsonschema::draft7::is_valid(&schema, document),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch() -> Value {
        json!({
            "version": "1.0",
            "chainId": "137",
            "createdAt": 1750255509666u64,
            "meta": {
                "name": "Transactions Batch",
                "description": "",
                "txBuilderVersion": "1.18.0",
                "createdFromSafeAddress": "0x7eC991e1648B7F1d5fa91ae3688C9f36a5CA6C8B",
                "createdFromOwnerAddress": "",
                "checksum": "0xf1966baf2cdc7c68774e5be291e81549cc7438efbceccaad0003bb12f8d30baf"
            },
            "transactions": [{
                "to": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
                "value": "0",
                "data": null,
                "contractMethod": {
                    "inputs": [
                        { "name": "to", "type": "address", "internalType": "address" },
                        { "name": "value", "type": "uint256", "internalType": "uint256" }
                    ],
                    "name": "transfer",
                    "payable": false
                },
                "contractInputsValues": {
                    "to": "0x116Da30d890533516f2683731F9Bd167807448b8",
                    "value": "1000000"
                }
            }]
        })
    }

    #[test]
    fn test_valid_batch() {
        assert!(is_valid_batch(&batch()));
        assert!(validate_batch(&batch()).is_ok());
    }

    #[test]
    fn test_empty_transactions_allowed() {
        let mut doc = batch();
        doc["transactions"] = json!([]);
        assert!(is_valid_batch(&doc));
    }

    #[test]
    fn test_invalid_transfer_value() {
        let mut doc = batch();
        doc["transactions"][0]["contractInputsValues"]["value"] = json!("1.5");
        let errors = validate_batch(&doc).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("\"1.5\""));
    }

    #[test]
    fn test_missing_meta_fields() {
        let mut doc = batch();
        doc["meta"] = json!({ "name": "x" });
        let errors = validate_batch(&doc).unwrap_err();
        assert!(!errors.is_empty());
        assert!(!is_valid_batch(&doc));
    }

    #[test]
    fn test_chain_id_must_be_string() {
        let mut doc = batch();
        doc["chainId"] = json!(137);
        assert!(!is_valid_batch(&doc));
    }
}
