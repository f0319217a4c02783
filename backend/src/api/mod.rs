//! HTTP API module.
//!
//! REST endpoints for the address registry and payout compilation, the SSE
//! log stream, and the small `/rpc` surface.

pub mod logs;
pub mod rpc;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server, AppState};
pub use types::*;
