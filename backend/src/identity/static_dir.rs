//! Fixed member directory.
//!
//! Loaded from a JSON file mapping tenant ids to member lists:
//!
//! ```json
//! { "1035162791302139935": [
//!     { "account": { "id": "743854752713932923", "username": "alice" }, "nickname": "Al" }
//! ] }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::MemberDirectory;
use crate::error::DirectoryResult;
use crate::models::Member;

/// In-memory member directory
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    tenants: HashMap<String, Vec<Member>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load members from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> DirectoryResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let tenants: HashMap<String, Vec<Member>> = serde_json::from_str(&content)?;
        Ok(Self { tenants })
    }

    /// Add a member to a tenant.
    pub fn with_member(mut self, tenant: &str, member: Member) -> Self {
        self.tenants.entry(tenant.to_string()).or_default().push(member);
        self
    }

    fn members(&self, tenant: &str) -> &[Member] {
        self.tenants.get(tenant).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl MemberDirectory for StaticDirectory {
    async fn fetch_member(&self, tenant: &str, account_id: &str) -> DirectoryResult<Option<Member>> {
        Ok(self
            .members(tenant)
            .iter()
            .find(|m| m.account.id == account_id)
            .cloned())
    }

    async fn search_members(&self, tenant: &str, query: &str, limit: usize) -> DirectoryResult<Vec<Member>> {
        let query = query.to_lowercase();
        let starts = |s: &str| s.to_lowercase().starts_with(&query);

        Ok(self
            .members(tenant)
            .iter()
            .filter(|m| {
                starts(&m.account.username)
                    || m.nickname.as_deref().is_some_and(starts)
                    || m.account.global_name.as_deref().is_some_and(starts)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_members(&self, tenant: &str) -> DirectoryResult<Vec<Member>> {
        Ok(self.members(tenant).to_vec())
    }
}
