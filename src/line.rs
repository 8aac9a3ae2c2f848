use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LineConfig;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct GroupSummary {
    pub group_id: String,
    pub group_name: String,
    #[serde(default)]
    pub picture_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct MemberProfile {
    pub display_name: String,
    pub user_id: String,
    #[serde(default)]
    pub picture_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "text")]
pub struct TextMessage {
    pub text: String,
}

impl TextMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Deserialize)]
struct MemberCount {
    count: u64,
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: &'a [TextMessage],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: &'a [TextMessage],
}

/// The subset of the LINE Messaging API the relay talks to.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    async fn get_group_summary(&self, group_id: &str) -> Result<GroupSummary>;

    async fn get_group_member_count(&self, group_id: &str) -> Result<u64>;

    async fn get_group_member_profile(&self, group_id: &str, user_id: &str)
        -> Result<MemberProfile>;

    async fn push_message(&self, to: &str, messages: &[TextMessage]) -> Result<()>;

    async fn reply_message(&self, reply_token: &str, messages: &[TextMessage]) -> Result<()>;
}

pub struct LineClient {
    client: reqwest::Client,
    config: LineConfig,
}

impl LineClient {
    pub fn new(config: LineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .with_context(|| format!("Failed to send request to LINE: {path}"))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("LINE API error ({}) on {}: {}", status, path, error_body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse LINE response: {path}"))
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to LINE: {path}"))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("LINE API error ({}) on {}: {}", status, path, error_body);
        }

        Ok(())
    }
}

#[async_trait]
impl MessagingApi for LineClient {
    async fn get_group_summary(&self, group_id: &str) -> Result<GroupSummary> {
        self.get_json(&format!("/v2/bot/group/{group_id}/summary"))
            .await
    }

    async fn get_group_member_count(&self, group_id: &str) -> Result<u64> {
        let count: MemberCount = self
            .get_json(&format!("/v2/bot/group/{group_id}/members/count"))
            .await?;
        Ok(count.count)
    }

    async fn get_group_member_profile(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> Result<MemberProfile> {
        self.get_json(&format!("/v2/bot/group/{group_id}/member/{user_id}"))
            .await
    }

    async fn push_message(&self, to: &str, messages: &[TextMessage]) -> Result<()> {
        self.post_json("/v2/bot/message/push", &PushRequest { to, messages })
            .await
    }

    async fn reply_message(&self, reply_token: &str, messages: &[TextMessage]) -> Result<()> {
        self.post_json(
            "/v2/bot/message/reply",
            &ReplyRequest {
                reply_token,
                messages,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> LineClient {
        LineClient::new(LineConfig {
            access_token: "test-token".to_string(),
            channel_secret: "secret".to_string(),
            api_base_url: server.base_url(),
        })
    }

    #[test]
    fn test_text_message_wire_format() {
        let value = serde_json::to_value(TextMessage::new("hi")).unwrap();
        assert_eq!(value, json!({"type": "text", "text": "hi"}));
    }

    #[tokio::test]
    async fn test_group_summary_and_count() {
        let server = MockServer::start_async().await;
        let summary = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v2/bot/group/Cabc/summary")
                    .header("authorization", "Bearer test-token");
                then.status(200).json_body(json!({
                    "groupId": "Cabc",
                    "groupName": "Ops",
                    "pictureUrl": "https://example.com/p.png"
                }));
            })
            .await;
        let count = server
            .mock_async(|when, then| {
                when.method(GET).path("/v2/bot/group/Cabc/members/count");
                then.status(200).json_body(json!({"count": 42}));
            })
            .await;

        let client = client_for(&server);
        let group = client.get_group_summary("Cabc").await.unwrap();
        assert_eq!(group.group_name, "Ops");
        assert_eq!(group.picture_url.as_deref(), Some("https://example.com/p.png"));
        assert_eq!(client.get_group_member_count("Cabc").await.unwrap(), 42);

        summary.assert_async().await;
        count.assert_async().await;
    }

    #[tokio::test]
    async fn test_member_profile() {
        let server = MockServer::start_async().await;
        let profile = server
            .mock_async(|when, then| {
                when.method(GET).path("/v2/bot/group/Cabc/member/Uxyz");
                then.status(200).json_body(json!({
                    "displayName": "Alice",
                    "userId": "Uxyz"
                }));
            })
            .await;

        let member = client_for(&server)
            .get_group_member_profile("Cabc", "Uxyz")
            .await
            .unwrap();
        assert_eq!(member.display_name, "Alice");
        assert_eq!(member.picture_url, None);
        profile.assert_async().await;
    }

    #[tokio::test]
    async fn test_push_and_reply_bodies() {
        let server = MockServer::start_async().await;
        let push = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v2/bot/message/push")
                    .header("authorization", "Bearer test-token")
                    .json_body(json!({
                        "to": "Ctarget",
                        "messages": [{"type": "text", "text": "forwarded"}]
                    }));
                then.status(200).json_body(json!({}));
            })
            .await;
        let reply = server
            .mock_async(|when, then| {
                when.method(POST).path("/v2/bot/message/reply").json_body(json!({
                    "replyToken": "token-1",
                    "messages": [{"type": "text", "text": "done"}]
                }));
                then.status(200).json_body(json!({}));
            })
            .await;

        let client = client_for(&server);
        client
            .push_message("Ctarget", &[TextMessage::new("forwarded")])
            .await
            .unwrap();
        client
            .reply_message("token-1", &[TextMessage::new("done")])
            .await
            .unwrap();

        push.assert_async().await;
        reply.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_carries_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v2/bot/group/Cgone/summary");
                then.status(404).body(r#"{"message":"Not found"}"#);
            })
            .await;

        let err = client_for(&server)
            .get_group_summary("Cgone")
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("404"));
        assert!(err.contains("Not found"));
    }
}
