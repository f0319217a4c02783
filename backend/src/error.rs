//! Error types for the payout compilation pipeline.
//!
//! Errors are layered bottom-up, mirroring the pipeline components:
//!
//! - [`KeyError`] - composite key codec
//! - [`StoreError`] - key-value backends behind the ledger
//! - [`AddressError`] - on-chain address parsing
//! - [`RegistryError`] - address registry operations
//! - [`DirectoryError`] - member directory lookups
//! - [`ChainError`] - token metadata source
//! - [`AmountError`] - decimal amount normalization
//! - [`ConfigError`] - environment configuration
//! - [`PipelineError`] - structural, compilation-aborting failures
//! - [`ServerError`] - HTTP surface
//!
//! Row-level failures are not errors in this sense: they are collected as
//! [`crate::compile::RowError`] values next to the compiled document.

use thiserror::Error;

// =============================================================================
// Composite Key Errors
// =============================================================================

/// Errors while encoding a composite ledger key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// A key needs at least one part.
    #[error("Composite key has no parts")]
    NoParts,

    /// Part at the given position is empty.
    #[error("Key part {0} is empty")]
    EmptyPart(usize),

    /// Part contains the reserved delimiter and would not decode back.
    #[error("Key part '{part}' contains reserved delimiter '{delimiter}'")]
    ReservedDelimiter { part: String, delimiter: char },
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors from a key-value backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure (file backend).
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot or response could not be (de)serialized.
    #[error("Store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Network failure talking to a remote backend.
    #[error("Store request failed: {0}")]
    Http(String),

    /// Backend answered with an error.
    #[error("Store backend error: {0}")]
    Backend(String),

    /// Key could not be built.
    #[error("Store key error: {0}")]
    Key(#[from] KeyError),
}

// =============================================================================
// Address Errors
// =============================================================================

/// Errors while parsing an on-chain address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Not `0x` followed by 40 hex digits.
    #[error("Invalid address '{0}'")]
    Malformed(String),

    /// Mixed-case input whose EIP-55 checksum does not match.
    #[error("Invalid address checksum '{0}'")]
    BadChecksum(String),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the address registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Address rejected before storing.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Identifier could not be used as a key part.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RegistryError> for StoreError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Store(e) => e,
            RegistryError::Key(e) => StoreError::Key(e),
            RegistryError::Address(e) => StoreError::Backend(e.to_string()),
        }
    }
}

// =============================================================================
// Directory Errors
// =============================================================================

/// Errors from a member directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Network failure.
    #[error("Directory request failed: {0}")]
    Http(String),

    /// Directory answered with a non-success status.
    #[error("Directory API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape.
    #[error("Invalid directory response: {0}")]
    InvalidResponse(String),

    /// Member file could not be read.
    #[error("Directory IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Member file is not valid JSON.
    #[error("Directory JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Chain Errors
// =============================================================================

/// Errors while fetching token metadata from a network.
#[derive(Debug, Error)]
pub enum ChainError {
    /// No RPC endpoint known for the network.
    #[error("Unknown network {0}")]
    UnknownNetwork(u64),

    /// Network failure.
    #[error("RPC request failed: {0}")]
    Rpc(String),

    /// Node returned a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    /// Result could not be ABI-decoded.
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    /// Token contract address is invalid.
    #[error(transparent)]
    Address(#[from] AddressError),
}

// =============================================================================
// Amount Errors
// =============================================================================

/// Errors while normalizing a decimal amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// Nothing to parse.
    #[error("amount is empty")]
    Empty,

    /// Signed amounts are never valid payouts.
    #[error("amount is negative")]
    Negative,

    /// Anything other than digits and a single decimal point.
    #[error("'{0}' is not a decimal number")]
    NotANumber(String),

    /// Value does not fit in 256 bits.
    #[error("amount overflows uint256")]
    Overflow,
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable has a value that cannot be used.
    #[error("Invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },

    /// A variable needed by the selected backend is absent.
    #[error("Missing {0}")]
    Missing(&'static str),

    /// Selected store backend could not be opened.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Member file could not be loaded.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Structural failures that abort a whole compilation.
///
/// Row-level problems never surface here; see [`crate::compile::RowError`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required top-level parameter is absent.
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// A top-level parameter is present but unusable.
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },

    /// Ledger backend failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Token metadata could not be fetched.
    #[error("Network error: {0}")]
    Chain(#[from] ChainError),

    /// Input bytes could not be decoded.
    #[error("CSV error: {0}")]
    Csv(#[from] crate::parser::CsvError),

    /// Compiled document failed schema validation.
    #[error("Batch validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Document could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RegistryError> for PipelineError {
    fn from(err: RegistryError) -> Self {
        PipelineError::Store(err.into())
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Compilation aborted.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Registry operation failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Directory lookup failed.
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Token lookup failed.
    #[error("Network error: {0}")]
    Chain(#[from] ChainError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Unknown resource.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for ledger backends.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for directory lookups.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Result type for token metadata lookups.
pub type ChainResult<T> = Result<T, ChainError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // KeyError -> StoreError -> PipelineError
        let store_err: StoreError = KeyError::EmptyPart(1).into();
        let pipeline_err: PipelineError = store_err.into();
        assert!(pipeline_err.to_string().contains("part 1 is empty"));

        // RegistryError -> PipelineError keeps the backend message
        let registry_err = RegistryError::Store(StoreError::Backend("down".into()));
        let pipeline_err: PipelineError = registry_err.into();
        assert!(matches!(pipeline_err, PipelineError::Store(StoreError::Backend(_))));
        assert!(pipeline_err.to_string().contains("down"));
    }

    #[test]
    fn test_validation_error_format() {
        let err = PipelineError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Batch validation failed: a; b");
    }

    #[test]
    fn test_reserved_delimiter_message() {
        let err = KeyError::ReservedDelimiter {
            part: "a!b".into(),
            delimiter: '!',
        };
        assert!(err.to_string().contains("'a!b'"));
    }
}
