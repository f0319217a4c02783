//! Identity resolution.
//!
//! Turns a free-form recipient token (numeric id, `name#1234` tag, `@handle`
//! or display name) into a canonical [`Account`] of one tenant. Lookups go
//! through a [`MemberDirectory`]; two directories are provided:
//!
//! - [`StaticDirectory`] - fixed member list (JSON file or built in code)
//! - [`DiscordDirectory`] - Discord REST API with a bot token

pub mod discord;
pub mod resolver;
pub mod static_dir;

use std::future::Future;

use crate::error::DirectoryResult;
use crate::models::Member;

pub use discord::DiscordDirectory;
pub use resolver::{resolve_identity, MEMBER_SEARCH_LIMIT};
pub use static_dir::StaticDirectory;

/// Read access to the members of a tenant.
///
/// All lookups are tenant-scoped.
pub trait MemberDirectory: Send + Sync {
    /// Member with exactly this account id, if it belongs to the tenant.
    fn fetch_member(
        &self,
        tenant: &str,
        account_id: &str,
    ) -> impl Future<Output = DirectoryResult<Option<Member>>> + Send;

    /// Members whose username or nickname starts with `query` (case-insensitive).
    fn search_members(
        &self,
        tenant: &str,
        query: &str,
        limit: usize,
    ) -> impl Future<Output = DirectoryResult<Vec<Member>>> + Send;

    /// Every member of the tenant.
    fn list_members(&self, tenant: &str) -> impl Future<Output = DirectoryResult<Vec<Member>>> + Send;
}

/// Directory chosen at runtime from configuration.
#[derive(Debug)]
pub enum AnyDirectory {
    Static(StaticDirectory),
    Discord(DiscordDirectory),
}

impl MemberDirectory for AnyDirectory {
    async fn fetch_member(&self, tenant: &str, account_id: &str) -> DirectoryResult<Option<Member>> {
        match self {
            AnyDirectory::Static(d) => d.fetch_member(tenant, account_id).await,
            AnyDirectory::Discord(d) => d.fetch_member(tenant, account_id).await,
        }
    }

    async fn search_members(&self, tenant: &str, query: &str, limit: usize) -> DirectoryResult<Vec<Member>> {
        match self {
            AnyDirectory::Static(d) => d.search_members(tenant, query, limit).await,
            AnyDirectory::Discord(d) => d.search_members(tenant, query, limit).await,
        }
    }

    async fn list_members(&self, tenant: &str) -> DirectoryResult<Vec<Member>> {
        match self {
            AnyDirectory::Static(d) => d.list_members(tenant).await,
            AnyDirectory::Discord(d) => d.list_members(tenant).await,
        }
    }
}
