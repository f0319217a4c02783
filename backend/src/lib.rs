//! # Payout - community payout lists to verifiable multisig batches
//!
//! Payout turns a free-form list of recipients and amounts into either a
//! checksum-stamped Safe transaction-builder batch of ERC20 transfers, or a
//! flat `address,amount` list for disperse tools.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌────────────┐
//! │ CSV text  │──▶│  Parser  │──▶│ Identity │──▶│ Registry │──▶│  Compiler  │
//! │ (any enc) │   │  (rows)  │   │ resolver │   │ (ledger) │   │ + checksum │
//! └───────────┘   └──────────┘   └──────────┘   └──────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use payout::{compile_batch, AddressRegistry, BatchRequest, MemoryStore, StaticDirectory};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = AddressRegistry::new(MemoryStore::new());
//!     let directory = StaticDirectory::new();
//!     let outcome = compile_batch(&registry, &directory, &request, "alice,12.5").await.unwrap();
//!     println!("{} transfers", outcome.document.transactions.len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Layered error types
//! - [`models`] - Networks, addresses, tokens, members
//! - [`amount`] - Decimal-exact amount normalization
//! - [`ledger`] - Composite-key store and address registry
//! - [`identity`] - Member directories and identity resolution
//! - [`parser`] - Payout list decoding and row splitting
//! - [`compile`] - Batch and disperse compilation, canonical checksum
//! - [`chain`] - ERC20 metadata over JSON-RPC
//! - [`validation`] - Safe batch schema validation
//! - [`session`] - Payout sessions with expiry
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;
pub mod amount;

// Storage
pub mod ledger;

// Identities
pub mod identity;

// Parsing
pub mod parser;

// Compilation
pub mod compile;

// Token metadata
pub mod chain;

// Validation
pub mod validation;

// Sessions
pub mod session;

// Configuration
pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AddressError, AmountError, ChainError, ConfigError, DirectoryError, KeyError, PipelineError,
    RegistryError, ServerError, StoreError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    checksum_address, network_by_id, network_label, parse_address, Account, AddressRecord, Donation,
    Member, Network, TokenDescriptor, NETWORKS,
};

// =============================================================================
// Re-exports - Amounts
// =============================================================================

pub use amount::{format_units, normalize, DecimalAmount, DecimalSum};

// =============================================================================
// Re-exports - Ledger
// =============================================================================

pub use ledger::{
    decode_key, encode_key, AddressRegistry, AnyStore, FileStore, KvStore, MemoryStore, RemoteStore,
};

// =============================================================================
// Re-exports - Identity
// =============================================================================

pub use identity::{resolve_identity, AnyDirectory, DiscordDirectory, MemberDirectory, StaticDirectory};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{decode_bytes, read_payout_file, split_rows, CsvError, PayoutRow};

// =============================================================================
// Re-exports - Compilation
// =============================================================================

pub use compile::{
    canonicalize, compile_batch, compile_disperse, compute_checksum, verify_checksum, BatchBuilder,
    BatchDocument, BatchOutcome, BatchRequest, ChecksumStatus, DisperseBuilder, DisperseOutcome,
    DisperseRequest, RowError, RowErrorKind,
};

// =============================================================================
// Re-exports - Chain, validation, sessions, config
// =============================================================================

pub use chain::{AnyTokenSource, RpcTokenSource, StaticTokenSource, TokenSource};
pub use config::{Config, StoreKind};
pub use session::{ClaimedSession, PayoutSession, SessionStore};
pub use validation::{is_valid_batch, validate, validate_batch};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
