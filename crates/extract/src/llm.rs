use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("agent service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("agent run {run_id} ended with status '{status}'")]
    RunFailed { run_id: String, status: String },

    #[error("agent run {run_id} still pending after {polls} polls")]
    Timeout { run_id: String, polls: usize },

    #[error("agent returned no assistant message")]
    EmptyResponse,

    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Authentication and request-shape failures will not fix themselves
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => true,
        }
    }
}

/// The hosted language-model agent, as seen by the extraction and analysis
/// steps: one prompt in, one text reply out.
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn complete(&self, instructions: &str, prompt: &str) -> Result<String, AgentError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundryConfig {
    pub endpoint: String,
    pub model_deployment: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_version: String,
    pub agent_name: String,
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub max_polls: usize,
}

impl FoundryConfig {
    pub fn new(endpoint: impl Into<String>, model_deployment: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model_deployment: model_deployment.into(),
            api_key: None,
            api_version: "2025-05-01".to_string(),
            agent_name: "Environment Segregation Analyst".to_string(),
            request_timeout_secs: 120,
            poll_interval_ms: 2000,
            max_polls: 30,
        }
    }
}

#[derive(Deserialize)]
struct IdObject {
    id: String,
}

#[derive(Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct RunObject {
    id: String,
    status: String,
}

#[derive(Deserialize)]
struct ThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    text: Option<TextContent>,
}

#[derive(Deserialize)]
struct TextContent {
    value: String,
}

/// Client for a hosted agents project (threads / messages / runs REST API)
pub struct FoundryAgentClient {
    config: FoundryConfig,
    client: reqwest::Client,
    retry: RetryPolicy,
    agent_id: OnceCell<String>,
}

impl FoundryAgentClient {
    pub fn new(config: FoundryConfig, retry: RetryPolicy) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            retry,
            agent_id: OnceCell::new(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path);
        let builder = self
            .client
            .request(method, url)
            .query(&[("api-version", self.config.api_version.as_str())]);

        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<T, AgentError> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<T>().await?)
    }

    /// Reuse the first agent in the project, or create one for our model
    async fn agent_id(&self) -> Result<&str, AgentError> {
        let id = self
            .agent_id
            .get_or_try_init(|| async {
                let agents: ListResponse<IdObject> = self.send(self.request(Method::GET, "assistants")).await?;

                if let Some(agent) = agents.data.into_iter().next() {
                    info!(agent_id = %agent.id, "Using existing agent");
                    return Ok(agent.id);
                }

                let created: IdObject = self
                    .send(self.request(Method::POST, "assistants").json(&json!({
                        "model": self.config.model_deployment,
                        "name": self.config.agent_name,
                        "instructions": "You analyse IT environment registers and answer only in the requested format.",
                    })))
                    .await?;
                info!(agent_id = %created.id, "Created agent");
                Ok::<String, AgentError>(created.id)
            })
            .await?;

        Ok(id.as_str())
    }

    async fn run_once(&self, instructions: &str, prompt: &str) -> Result<String, AgentError> {
        let thread: IdObject = self
            .send(self.request(Method::POST, "threads").json(&json!({})))
            .await?;
        debug!(thread_id = %thread.id, "Created thread");

        let _: IdObject = self
            .send(
                self.request(Method::POST, &format!("threads/{}/messages", thread.id))
                    .json(&json!({
                        "role": "user",
                        "content": format!("{}\n\n{}", instructions, prompt),
                    })),
            )
            .await?;

        let agent_id = self.agent_id().await?;
        let run: RunObject = self
            .send(
                self.request(Method::POST, &format!("threads/{}/runs", thread.id))
                    .json(&json!({ "assistant_id": agent_id })),
            )
            .await?;
        debug!(run_id = %run.id, "Created run");

        self.wait_for_run(&thread.id, &run.id).await
    }

    async fn wait_for_run(&self, thread_id: &str, run_id: &str) -> Result<String, AgentError> {
        let interval = Duration::from_millis(self.config.poll_interval_ms);

        for _ in 0..self.config.max_polls {
            let run: RunObject = self
                .send(self.request(Method::GET, &format!("threads/{}/runs/{}", thread_id, run_id)))
                .await?;

            match run.status.as_str() {
                "completed" => return self.latest_reply(thread_id).await,
                "failed" | "cancelled" | "expired" => {
                    return Err(AgentError::RunFailed {
                        run_id: run.id,
                        status: run.status,
                    });
                }
                status => debug!(run_id, status, "Run still in progress"),
            }

            tokio::time::sleep(interval).await;
        }

        Err(AgentError::Timeout {
            run_id: run_id.to_string(),
            polls: self.config.max_polls,
        })
    }

    async fn latest_reply(&self, thread_id: &str) -> Result<String, AgentError> {
        let messages: ListResponse<ThreadMessage> = self
            .send(
                self.request(Method::GET, &format!("threads/{}/messages", thread_id))
                    .query(&[("order", "desc")]),
            )
            .await?;

        let reply = messages
            .data
            .into_iter()
            .find(|m| m.role == "assistant")
            .ok_or(AgentError::EmptyResponse)?;

        let text: Vec<String> = reply
            .content
            .into_iter()
            .filter_map(|c| c.text.map(|t| t.value))
            .collect();

        if text.is_empty() {
            return Err(AgentError::EmptyResponse);
        }
        Ok(text.join("\n"))
    }
}

#[async_trait]
impl AgentClient for FoundryAgentClient {
    async fn complete(&self, instructions: &str, prompt: &str) -> Result<String, AgentError> {
        self.retry
            .retry_if("agent_run", || self.run_once(instructions, prompt), AgentError::is_retryable)
            .await
    }

    fn name(&self) -> &str {
        &self.config.agent_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let auth = AgentError::Status { status: 401, body: String::new() };
        let throttled = AgentError::Status { status: 429, body: String::new() };
        let outage = AgentError::Status { status: 503, body: String::new() };

        assert!(!auth.is_retryable());
        assert!(throttled.is_retryable());
        assert!(outage.is_retryable());
        assert!(AgentError::EmptyResponse.is_retryable());
    }

    #[test]
    fn test_message_list_decoding() {
        let body = r#"{
            "object": "list",
            "data": [
                {"id": "m2", "role": "assistant", "content": [{"type": "text", "text": {"value": "[{\"a\": 1}]", "annotations": []}}]},
                {"id": "m1", "role": "user", "content": [{"type": "text", "text": {"value": "prompt"}}]}
            ]
        }"#;
        let list: ListResponse<ThreadMessage> = serde_json::from_str(body).unwrap();
        let reply = list.data.into_iter().find(|m| m.role == "assistant").unwrap();
        assert_eq!(reply.content[0].text.as_ref().unwrap().value, "[{\"a\": 1}]");
    }

    #[test]
    fn test_config_does_not_serialize_key() {
        let mut config = FoundryConfig::new("https://example.services.ai.azure.com/api/projects/p", "gpt-4o");
        config.api_key = Some("secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
