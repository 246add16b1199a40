//! LLM Backend trait and implementations.
//!
//! This module defines the abstraction every completion provider implements
//! and a scripted mock used throughout the workspace's tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, CompletionResponse};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on transient errors (network failures, rate limits).
/// Non-retryable errors are returned immediately. A rate limit that names a
/// `Retry-After` waits that long instead of the current backoff.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() || attempt >= max_retries {
                    return Err(e);
                }

                let wait = e.retry_after().unwrap_or(backoff);
                attempt += 1;
                tracing::warn!(
                    backend = backend_name,
                    attempt,
                    max_retries,
                    backoff_ms = wait.as_millis() as u64,
                    error = %e,
                    "Request failed, retrying"
                );
                tokio::time::sleep(wait).await;
                backoff *= 2;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for LLM completion providers.
///
/// The orchestrator treats a backend as a pure prompt→text function: no
/// streaming, no native tool calling. Everything structured is negotiated in
/// the prompt and recovered from the returned text.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Execute a completion request and return the full response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the name of this backend.
    fn name(&self) -> &str;
}

/// A backend that can be shared across tasks.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// A scripted reply for [`MockBackend`].
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return this text.
    Text(String),
    /// Fail with a backend error carrying this message.
    Error(String),
    /// Wait before returning the text (for cancellation tests).
    Delayed(Duration, String),
}

impl MockResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }
}

/// A mock backend for testing purposes.
///
/// Returns pre-configured responses in order, useful for deterministic
/// testing of the stage loop and the generation strategies. Every request is
/// recorded so tests can assert prompts and token budgets.
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    responses: Mutex<Vec<MockResponse>>,
    fallback: Option<MockResponse>,
    request_log: Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    /// Create a new mock backend with the given responses.
    ///
    /// Responses are returned in order. If more requests are made than
    /// responses available, an error is returned.
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            name: "mock".to_string(),
            responses: Mutex::new(responses),
            fallback: None,
            request_log: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock backend from plain text replies.
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| MockResponse::Text(t.into())).collect())
    }

    /// Create a mock backend that answers every request with the same text.
    pub fn repeating(text: impl Into<String>) -> Self {
        Self::new(Vec::new()).with_fallback(text)
    }

    /// Reply with `text` once the scripted responses run out.
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(MockResponse::Text(text.into()));
        self
    }

    /// Get all requests that were made to this backend.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.request_log).clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        lock(&self.request_log).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        lock(&self.request_log).push(request);

        let next = {
            let mut responses = lock(&self.responses);
            if responses.is_empty() {
                self.fallback.clone()
            } else {
                Some(responses.remove(0))
            }
        };

        match next {
            Some(MockResponse::Text(text)) => Ok(CompletionResponse::new(text)),
            Some(MockResponse::Error(message)) => Err(LlmError::Backend(message)),
            Some(MockResponse::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(CompletionResponse::new(text))
            }
            None => Err(LlmError::Backend(
                "MockBackend: no more responses available".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_mock_backend_in_order() {
        let backend = MockBackend::with_texts(["First", "Second"]);

        let r1 = backend
            .complete(CompletionRequest::new("m", "1", 100))
            .await
            .unwrap();
        let r2 = backend
            .complete(CompletionRequest::new("m", "2", 200))
            .await
            .unwrap();

        assert_eq!(r1.text, "First");
        assert_eq!(r2.text, "Second");
        assert_eq!(backend.request_count(), 2);
        assert_eq!(backend.requests()[1].max_output_tokens(), 200);
    }

    #[tokio::test]
    async fn test_mock_backend_exhausted() {
        let backend = MockBackend::new(vec![]);
        let result = backend.complete(CompletionRequest::new("m", "hi", 10)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_backend_scripted_error() {
        let backend = MockBackend::new(vec![MockResponse::error("boom"), MockResponse::text("ok")]);

        let first = backend.complete(CompletionRequest::new("m", "a", 10)).await;
        assert!(matches!(first, Err(LlmError::Backend(msg)) if msg == "boom"));

        let second = backend.complete(CompletionRequest::new("m", "b", 10)).await;
        assert_eq!(second.unwrap().text, "ok");
    }

    #[tokio::test]
    async fn test_mock_backend_repeating() {
        let backend = MockBackend::repeating("again");
        for _ in 0..3 {
            let r = backend.complete(CompletionRequest::new("m", "x", 10)).await;
            assert_eq!(r.unwrap().text, "again");
        }
        assert_eq!(backend.request_count(), 3);
    }

    #[tokio::test]
    async fn test_with_retry_recovers_from_network_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry(3, Duration::from_millis(1), "test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LlmError::Network("flaky".to_string()))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_fatal_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = with_retry(3, Duration::from_millis(1), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Auth("nope".to_string()))
        })
        .await;

        assert!(matches!(result, Err(LlmError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_after_max() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = with_retry(2, Duration::from_millis(1), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Network("down".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
