//! Discord-backed member directory (REST API v10, bot token).

use serde::Deserialize;

use super::MemberDirectory;
use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{Account, Member};

/// Default API root.
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Page size for member listing (API maximum).
const LIST_PAGE_SIZE: usize = 1000;

/// Discord guild member lookups
#[derive(Debug, Clone)]
pub struct DiscordDirectory {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
    #[serde(default)]
    discriminator: Option<String>,
    #[serde(default)]
    global_name: Option<String>,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct ApiMember {
    user: ApiUser,
    #[serde(default)]
    nick: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl From<ApiMember> for Member {
    fn from(m: ApiMember) -> Self {
        Member {
            account: Account {
                id: m.user.id,
                username: m.user.username,
                discriminator: m.user.discriminator,
                global_name: m.user.global_name,
                bot: m.user.bot,
            },
            nickname: m.nick,
        }
    }
}

impl DiscordDirectory {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DISCORD_API_BASE)
    }

    /// Point the client at another API root.
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// GET a path; `Ok(None)` on 404.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> DirectoryResult<Option<T>> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bot {}", self.token))
            .query(query)
            .send()
            .await
            .map_err(|e| DirectoryError::Http(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| DirectoryError::Http(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(DirectoryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))
    }
}

impl MemberDirectory for DiscordDirectory {
    async fn fetch_member(&self, tenant: &str, account_id: &str) -> DirectoryResult<Option<Member>> {
        let path = format!("/guilds/{}/members/{}", tenant, account_id);
        let member: Option<ApiMember> = self.get_json(&path, &[]).await?;
        Ok(member.map(Member::from))
    }

    async fn search_members(&self, tenant: &str, query: &str, limit: usize) -> DirectoryResult<Vec<Member>> {
        let path = format!("/guilds/{}/members/search", tenant);
        let params = [("query", query.to_string()), ("limit", limit.to_string())];
        let members: Option<Vec<ApiMember>> = self.get_json(&path, &params).await?;
        Ok(members.unwrap_or_default().into_iter().map(Member::from).collect())
    }

    async fn list_members(&self, tenant: &str) -> DirectoryResult<Vec<Member>> {
        let path = format!("/guilds/{}/members", tenant);
        let mut members = Vec::new();
        let mut after = "0".to_string();

        loop {
            let params = [("limit", LIST_PAGE_SIZE.to_string()), ("after", after.clone())];
            let page: Vec<ApiMember> = self.get_json(&path, &params).await?.unwrap_or_default();
            let full_page = page.len() == LIST_PAGE_SIZE;

            if let Some(last) = page.last() {
                after = last.user.id.clone();
            }
            members.extend(page.into_iter().map(Member::from));

            if !full_page {
                break;
            }
        }

        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        routing::get,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bot token")
    }

    async fn spawn_mock() -> String {
        let app = Router::new()
            .route(
                "/guilds/{guild}/members/search",
                get(|headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                    if !authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "401: Unauthorized" })));
                    }
                    let found = if q.get("query").map(String::as_str) == Some("ali") {
                        json!([{ "user": { "id": "1", "username": "alice", "discriminator": "0" }, "nick": "Al" }])
                    } else {
                        json!([])
                    };
                    (StatusCode::OK, Json(found))
                }),
            )
            .route(
                "/guilds/{guild}/members/{id}",
                get(|Path((_guild, id)): Path<(String, String)>| async move {
                    if id == "1" {
                        (StatusCode::OK, Json(json!({ "user": { "id": "1", "username": "alice" } })))
                    } else {
                        (StatusCode::NOT_FOUND, Json(json!({ "message": "Unknown Member", "code": 10007 })))
                    }
                }),
            )
            .route(
                "/guilds/{guild}/members",
                get(|| async {
                    Json(json!([
                        { "user": { "id": "1", "username": "alice" } },
                        { "user": { "id": "2", "username": "robot", "bot": true } }
                    ]))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_member_payload_conversion() {
        let payload: Value = json!({
            "user": { "id": "743854752713932923", "username": "alice", "global_name": "Alice", "discriminator": "0" },
            "nick": null,
            "roles": []
        });
        let member: Member = serde_json::from_value::<ApiMember>(payload).unwrap().into();
        assert_eq!(member.account.id, "743854752713932923");
        assert_eq!(member.display_name(), "Alice");
        assert!(!member.account.bot);
    }

    #[tokio::test]
    async fn test_fetch_member_404_is_none() {
        let base = spawn_mock().await;
        let dir = DiscordDirectory::with_base_url("token", base);
        assert_eq!(dir.fetch_member("g", "1").await.unwrap().unwrap().account.username, "alice");
        assert!(dir.fetch_member("g", "999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_and_list() {
        let base = spawn_mock().await;
        let dir = DiscordDirectory::with_base_url("token", base);

        let found = dir.search_members("g", "ali", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].nickname.as_deref(), Some("Al"));

        let all = dir.list_members("g").await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[1].account.bot);
    }

    #[tokio::test]
    async fn test_api_error_message() {
        let base = spawn_mock().await;
        let dir = DiscordDirectory::with_base_url("wrong", base);
        let err = dir.search_members("g", "ali", 10).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Api { status: 401, ref message } if message == "401: Unauthorized"));
    }
}
