//! Payout compilation.
//!
//! - [`pipeline`] - row-by-row resolution and the two entry points
//! - [`batch`] - Safe transaction batch document
//! - [`checksum`] - canonical serialization and Keccak-256 checksum
//! - [`disperse`] - flat address/amount list
//!
//! A bad row never aborts a compilation: it becomes a [`RowError`] and the
//! row is left out of the output.

pub mod batch;
pub mod checksum;
pub mod disperse;
pub mod pipeline;

use thiserror::Error;

use crate::error::AmountError;

pub use batch::{BatchBuilder, BatchDocument};
pub use checksum::{canonicalize, compute_checksum, verify_checksum, ChecksumStatus};
pub use disperse::{DisperseBuilder, TOTAL_UNAVAILABLE};
pub use pipeline::{compile_batch, compile_disperse, BatchOutcome, BatchRequest, DisperseOutcome, DisperseRequest};

/// Why a single row was left out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowErrorKind {
    /// Line could not be split into identity and amount.
    #[error("{0}")]
    Malformed(String),

    #[error("Could not find user \"{token}\"")]
    UnresolvedIdentity { token: String },

    #[error("{display_name} ({account_id}) has no address registered on {network}")]
    MissingAddress {
        display_name: String,
        account_id: String,
        network: String,
    },

    /// The registry holds something that is not an address.
    #[error("{display_name} ({account_id}) has an invalid registered address \"{address}\"")]
    InvalidStoredAddress {
        display_name: String,
        account_id: String,
        address: String,
    },

    #[error("Error parsing amount \"{amount}\": {reason}")]
    InvalidAmount { amount: String, reason: AmountError },
}

/// A row-level failure, reported with its 1-indexed input line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Line {line}: {kind}")]
pub struct RowError {
    pub line: usize,
    pub kind: RowErrorKind,
}

impl RowError {
    pub fn new(line: usize, kind: RowErrorKind) -> Self {
        Self { line, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_error_messages() {
        let err = RowError::new(3, RowErrorKind::UnresolvedIdentity { token: "bob".into() });
        assert_eq!(err.to_string(), "Line 3: Could not find user \"bob\"");

        let err = RowError::new(
            7,
            RowErrorKind::InvalidAmount {
                amount: "1,5".into(),
                reason: AmountError::NotANumber("1,5".into()),
            },
        );
        assert_eq!(
            err.to_string(),
            "Line 7: Error parsing amount \"1,5\": '1,5' is not a decimal number"
        );

        let err = RowError::new(
            2,
            RowErrorKind::MissingAddress {
                display_name: "Ally".into(),
                account_id: "743854752713932923".into(),
                network: "Optimism (10)".into(),
            },
        );
        assert_eq!(
            err.to_string(),
            "Line 2: Ally (743854752713932923) has no address registered on Optimism (10)"
        );
    }
}
