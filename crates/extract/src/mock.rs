use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::llm::{AgentClient, AgentError};

type Responder = Box<dyn Fn(&str) -> Result<String, AgentError> + Send + Sync>;

/// Scripted stand-in for the agent service.
///
/// Queued replies are served first, in order; once the queue is empty the
/// responder (if any) answers based on the prompt text.
pub struct MockAgentClient {
    name: String,
    queue: Mutex<VecDeque<Result<String, AgentError>>>,
    responder: Option<Responder>,
    prompts: Mutex<Vec<String>>,
}

impl MockAgentClient {
    pub fn new() -> Self {
        Self {
            name: "MockAgent".to_string(),
            queue: Mutex::new(VecDeque::new()),
            responder: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, AgentError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        lock(&self.queue).push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, error: AgentError) {
        lock(&self.queue).push_back(Err(error));
    }

    /// Every prompt received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.prompts).len()
    }
}

impl Default for MockAgentClient {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl AgentClient for MockAgentClient {
    async fn complete(&self, _instructions: &str, prompt: &str) -> Result<String, AgentError> {
        lock(&self.prompts).push(prompt.to_string());

        if let Some(reply) = lock(&self.queue).pop_front() {
            return reply;
        }

        match &self.responder {
            Some(responder) => responder(prompt),
            None => Err(AgentError::Other("MockAgentClient: no more replies queued".to_string())),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_then_responder() {
        let mock = MockAgentClient::with_responder(|prompt| Ok(format!("echo: {}", prompt)));
        mock.push_reply("first");
        mock.push_error(AgentError::EmptyResponse);

        assert_eq!(mock.complete("", "a").await.unwrap(), "first");
        assert!(mock.complete("", "b").await.is_err());
        assert_eq!(mock.complete("", "c").await.unwrap(), "echo: c");
        assert_eq!(mock.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_exhausted_queue_errors() {
        let mock = MockAgentClient::new();
        assert!(mock.complete("", "x").await.is_err());
        assert_eq!(mock.call_count(), 1);
    }
}
