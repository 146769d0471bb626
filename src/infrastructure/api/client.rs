//! HTTP client for the chat service REST API.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::entities::{
    Channel, ChannelId, ChannelUnread, Member, MemberKey, Message, MessageId, Server, ServerId,
    User, UserId,
};
use crate::domain::errors::ApiError;
use crate::domain::ports::{ApiPort, MessageQuery, UserSettings};

const DEFAULT_API_BASE: &str = "https://api.revolt.chat";
const SESSION_HEADER: &str = "x-session-token";
const USER_AGENT: &str = concat!("rivulet/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "type")]
    kind: String,
}

/// REST adapter over `reqwest`.
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Creates a client against the default API base.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, ApiError> {
        Self::with_base_url(DEFAULT_API_BASE)
    }

    /// Creates a client against a custom API base.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::unexpected(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.read().as_deref() {
            Some(token) => request.header(SESSION_HEADER, token),
            None => request,
        }
    }

    async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            warn!(error = %e, "request failed");
            if e.is_timeout() {
                ApiError::network("request timed out")
            } else if e.is_connect() {
                ApiError::network("failed to connect to API")
            } else {
                ApiError::network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::handle_error_response(status, response).await);
        }

        response.json().await.map_err(|e| {
            warn!(error = %e, "failed to parse response body");
            ApiError::decode(e.to_string())
        })
    }

    async fn execute_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::handle_error_response(status, response).await)
        }
    }

    async fn handle_error_response(status: StatusCode, response: reqwest::Response) -> ApiError {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let kind = match response.json::<ErrorResponse>().await {
            Ok(error) => error.kind,
            Err(_) => format!("HTTP {status}"),
        };

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::forbidden(kind),
            StatusCode::NOT_FOUND => ApiError::NotFound,
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited {
                retry_after_ms: retry_after.map_or(5000, |s| s * 1000),
            },
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                ApiError::network("API is temporarily unavailable")
            }
            _ => ApiError::unexpected(format!("unexpected response: {status} - {kind}")),
        }
    }
}

#[async_trait]
impl ApiPort for ApiClient {
    fn set_token(&self, token: Option<&str>) {
        *self.token.write() = token.map(ToOwned::to_owned);
    }

    async fn fetch_user(&self, id: &UserId) -> Result<User, ApiError> {
        debug!(user = %id, "fetching user");
        self.execute(self.client.get(self.url(&format!("/users/{id}"))))
            .await
    }

    async fn fetch_channel(&self, id: &ChannelId) -> Result<Channel, ApiError> {
        debug!(channel = %id, "fetching channel");
        self.execute(self.client.get(self.url(&format!("/channels/{id}"))))
            .await
    }

    async fn fetch_server(&self, id: &ServerId) -> Result<Server, ApiError> {
        debug!(server = %id, "fetching server");
        self.execute(self.client.get(self.url(&format!("/servers/{id}"))))
            .await
    }

    async fn fetch_member(&self, key: &MemberKey) -> Result<Member, ApiError> {
        debug!(server = %key.server, user = %key.user, "fetching member");
        self.execute(
            self.client
                .get(self.url(&format!("/servers/{}/members/{}", key.server, key.user))),
        )
        .await
    }

    async fn query_messages(
        &self,
        channel: &ChannelId,
        query: MessageQuery,
    ) -> Result<Vec<Message>, ApiError> {
        let mut request = self
            .client
            .get(self.url(&format!("/channels/{channel}/messages")));

        if let Some(limit) = query.limit {
            request = request.query(&[("limit", limit.to_string())]);
        }
        if let Some(before) = &query.before {
            request = request.query(&[("before", before.as_str())]);
        }
        if let Some(after) = &query.after {
            request = request.query(&[("after", after.as_str())]);
        }

        self.execute(request).await
    }

    async fn fetch_unreads(&self) -> Result<Vec<ChannelUnread>, ApiError> {
        debug!("fetching unreads");
        self.execute(self.client.get(self.url("/sync/unreads"))).await
    }

    async fn send_message(&self, channel: &ChannelId, content: &str) -> Result<Message, ApiError> {
        self.execute(
            self.client
                .post(self.url(&format!("/channels/{channel}/messages")))
                .json(&json!({ "content": content })),
        )
        .await
    }

    async fn edit_message(
        &self,
        channel: &ChannelId,
        id: &MessageId,
        content: &str,
    ) -> Result<Message, ApiError> {
        self.execute(
            self.client
                .patch(self.url(&format!("/channels/{channel}/messages/{id}")))
                .json(&json!({ "content": content })),
        )
        .await
    }

    async fn delete_message(&self, channel: &ChannelId, id: &MessageId) -> Result<(), ApiError> {
        self.execute_empty(
            self.client
                .delete(self.url(&format!("/channels/{channel}/messages/{id}"))),
        )
        .await
    }

    async fn fetch_settings(&self, keys: &[&str]) -> Result<UserSettings, ApiError> {
        self.execute(
            self.client
                .post(self.url("/sync/settings/fetch"))
                .json(&json!({ "keys": keys })),
        )
        .await
    }

    async fn set_settings(&self, settings: &UserSettings) -> Result<(), ApiError> {
        let body: std::collections::HashMap<&str, &str> = settings
            .iter()
            .map(|(key, (_, value))| (key.as_str(), value.as_str()))
            .collect();

        let mut request = self.client.post(self.url("/sync/settings/set")).json(&body);
        // The server resolves write conflicts per key against this revision.
        if let Some(revision) = newest_revision(settings) {
            request = request.query(&[("timestamp", revision.to_string())]);
        }

        self.execute_empty(request).await
    }
}

fn newest_revision(settings: &UserSettings) -> Option<i64> {
    settings.values().map(|(revision, _)| *revision).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = ApiClient::with_base_url("https://api.example.test/").unwrap();
        assert_eq!(client.url("/users/01A"), "https://api.example.test/users/01A");
    }

    #[test]
    fn settings_writes_carry_the_newest_revision() {
        let mut settings = UserSettings::new();
        assert_eq!(newest_revision(&settings), None);

        settings.insert("ordering".to_owned(), (170, "{}".to_owned()));
        settings.insert("notifications".to_owned(), (420, "{}".to_owned()));
        assert_eq!(newest_revision(&settings), Some(420));
    }

    #[test]
    fn token_replacement_is_visible() {
        let client = ApiClient::new().unwrap();
        assert!(client.token.read().is_none());

        client.set_token(Some("secret"));
        assert_eq!(client.token.read().as_deref(), Some("secret"));

        client.set_token(None);
        assert!(client.token.read().is_none());
    }
}
