//! Recipient token resolution.
//!
//! Strategies run in a fixed order and the first match wins:
//!
//! 1. numeric id (15-21 digits) - direct member lookup
//! 2. `name#1234` - exact (username, discriminator) pair
//! 3. `@name` or `name` longer than 2 chars - exact username
//! 4. exact display name or nickname
//!
//! A directory failure inside one strategy counts as "no match" for that
//! strategy only; resolution moves on to the next one.

use once_cell::sync::Lazy;
use regex::Regex;

use super::MemberDirectory;
use crate::api::logs::log_warning;
use crate::error::DirectoryResult;
use crate::models::Member;

/// Candidates fetched per directory search.
pub const MEMBER_SEARCH_LIMIT: usize = 10;

static ACCOUNT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{15,21}$").expect("valid account id pattern"));
static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)#(\d{4})$").expect("valid tag pattern"));

/// Swallow a directory failure, logging it as a warning.
fn no_match_on_error<T>(strategy: &str, token: &str, result: DirectoryResult<Option<T>>) -> Option<T> {
    match result {
        Ok(found) => found,
        Err(e) => {
            log_warning(format!("{} lookup for \"{}\" failed: {}", strategy, token, e));
            None
        }
    }
}

async fn search_exact<D, F>(
    directory: &D,
    tenant: &str,
    query: &str,
    matches: F,
) -> DirectoryResult<Option<Member>>
where
    D: MemberDirectory,
    F: Fn(&Member) -> bool,
{
    let members = directory
        .search_members(tenant, query, MEMBER_SEARCH_LIMIT)
        .await?;
    Ok(members.into_iter().find(|m| matches(m)))
}

/// Resolve a recipient token to a member of `tenant`.
///
/// Returns `None` once every strategy has been exhausted.
pub async fn resolve_identity<D: MemberDirectory>(
    directory: &D,
    tenant: &str,
    token: &str,
) -> Option<Member> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    if ACCOUNT_ID.is_match(token) {
        let found = directory.fetch_member(tenant, token).await;
        if let Some(member) = no_match_on_error("Id", token, found) {
            return Some(member);
        }
    }

    if let Some(caps) = TAG.captures(token) {
        let username = &caps[1];
        let discriminator = &caps[2];
        let found = search_exact(directory, tenant, username, |m| {
            m.account.username == username
                && m.account.discriminator.as_deref() == Some(discriminator)
        })
        .await;
        if let Some(member) = no_match_on_error("Tag", token, found) {
            return Some(member);
        }
    }

    let username = token.strip_prefix('@').unwrap_or(token);
    if username.chars().count() > 2 {
        let found = search_exact(directory, tenant, username, |m| m.account.username == username).await;
        if let Some(member) = no_match_on_error("Username", token, found) {
            return Some(member);
        }
    }

    let found = search_exact(directory, tenant, token, |m| {
        m.display_name() == token || m.nickname.as_deref() == Some(token)
    })
    .await;
    no_match_on_error("Display name", token, found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DirectoryError;
    use crate::identity::StaticDirectory;
    use crate::models::Account;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TENANT: &str = "guild";

    fn member(id: &str, username: &str, discriminator: Option<&str>, nickname: Option<&str>) -> Member {
        Member {
            account: Account {
                id: id.into(),
                username: username.into(),
                discriminator: discriminator.map(String::from),
                global_name: None,
                bot: false,
            },
            nickname: nickname.map(String::from),
        }
    }

    fn directory() -> StaticDirectory {
        StaticDirectory::new()
            .with_member(TENANT, member("743854752713932923", "alice", Some("0"), Some("Ally")))
            .with_member(TENANT, member("573155442226757653", "bob", Some("4821"), None))
            .with_member(TENANT, member("198443430102302720", "carol", None, Some("123456789012345678")))
            .with_member(TENANT, member("111111111111111111", "al", None, None))
    }

    async fn resolve(token: &str) -> Option<String> {
        resolve_identity(&directory(), TENANT, token).await.map(|m| m.account.id)
    }

    #[tokio::test]
    async fn test_resolve_by_id() {
        assert_eq!(resolve("573155442226757653").await.as_deref(), Some("573155442226757653"));
    }

    #[tokio::test]
    async fn test_resolve_by_tag() {
        assert_eq!(resolve("bob#4821").await.as_deref(), Some("573155442226757653"));
        assert_eq!(resolve("bob#0000").await, None);
    }

    #[tokio::test]
    async fn test_resolve_by_username() {
        assert_eq!(resolve("@alice").await.as_deref(), Some("743854752713932923"));
        assert_eq!(resolve("alice").await.as_deref(), Some("743854752713932923"));
    }

    #[tokio::test]
    async fn test_short_token_uses_display_name() {
        // "al" is too short for the username strategy; the display-name one matches.
        assert_eq!(resolve("al").await.as_deref(), Some("111111111111111111"));
    }

    #[tokio::test]
    async fn test_resolve_by_nickname() {
        assert_eq!(resolve("Ally").await.as_deref(), Some("743854752713932923"));
    }

    #[tokio::test]
    async fn test_numeric_id_wins_over_display_name() {
        // carol's nickname looks like an account id; the id strategy runs first.
        let dir = directory().with_member(TENANT, member("123456789012345678", "dave", None, None));
        let found = resolve_identity(&dir, TENANT, "123456789012345678").await.unwrap();
        assert_eq!(found.account.username, "dave");
    }

    #[tokio::test]
    async fn test_unknown_id_falls_through() {
        // No account with this id; carol's nickname matches in the last strategy.
        assert_eq!(resolve("123456789012345678").await.as_deref(), Some("198443430102302720"));
    }

    #[tokio::test]
    async fn test_other_tenant_not_visible() {
        let found = resolve_identity(&directory(), "elsewhere", "alice").await;
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_unresolvable() {
        assert_eq!(resolve("nobody-here").await, None);
        assert_eq!(resolve("   ").await, None);
    }

    /// Fails every call until `fail_calls` are used up.
    struct Flaky {
        inner: StaticDirectory,
        fail_calls: AtomicUsize,
    }

    impl Flaky {
        fn trip(&self) -> Result<(), DirectoryError> {
            let left = self.fail_calls.load(Ordering::SeqCst);
            if left > 0 {
                self.fail_calls.store(left - 1, Ordering::SeqCst);
                return Err(DirectoryError::Http("timeout".into()));
            }
            Ok(())
        }
    }

    impl MemberDirectory for Flaky {
        async fn fetch_member(&self, tenant: &str, id: &str) -> DirectoryResult<Option<Member>> {
            self.trip()?;
            self.inner.fetch_member(tenant, id).await
        }

        async fn search_members(&self, tenant: &str, query: &str, limit: usize) -> DirectoryResult<Vec<Member>> {
            self.trip()?;
            self.inner.search_members(tenant, query, limit).await
        }

        async fn list_members(&self, tenant: &str) -> DirectoryResult<Vec<Member>> {
            self.inner.list_members(tenant).await
        }
    }

    #[tokio::test]
    async fn test_failing_strategy_falls_through() {
        // Username search fails once; the display-name search still finds alice.
        let dir = Flaky {
            inner: directory(),
            fail_calls: AtomicUsize::new(1),
        };
        let found = resolve_identity(&dir, TENANT, "Ally").await.unwrap();
        assert_eq!(found.account.id, "743854752713932923");
    }
}
