use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Config, Credential};
use crate::conversation::Role;

pub const DEFAULT_ENDPOINT: &str =
    "https://router.huggingface.co/fireworks-ai/inference/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "accounts/fireworks/models/deepseek-r1-0528";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a completion call produced no reply.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompletionFailure {
    #[error("API token not provided")]
    MissingCredential,

    #[error("Request failed: {0}")]
    TransportFailure(String),

    #[error("API Error: {status} - {body}")]
    ApiError { status: u16, body: String },

    #[error("Unexpected response format: {0}")]
    MalformedResponse(String),
}

/// Failure to obtain any HTTP response at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("{0}")]
    Network(String),
}

impl From<TransportError> for CompletionFailure {
    fn from(err: TransportError) -> Self {
        CompletionFailure::TransportFailure(err.to_string())
    }
}

/// Message in conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Request to send to LLM
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }
}

/// JSON body posted to the chat-completion endpoint.
#[derive(Debug, Serialize)]
struct CompletionPayload<'a> {
    messages: &'a [ChatMessage],
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Raw HTTP response handed back by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Sends one JSON POST and returns whatever came back.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        bearer: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<HttpReply, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        bearer: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<HttpReply, TransportError> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Network(e.to_string())
            }
        };

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(map_err)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_err)?;
        Ok(HttpReply { status, body })
    }
}

/// Client for a single hosted chat-completion endpoint.
pub struct CompletionClient {
    transport: Box<dyn Transport>,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl CompletionClient {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(config: &Config, transport: Box<dyn Transport>) -> Self {
        Self::new(transport)
            .with_endpoint(config.endpoint.clone())
            .with_model(config.model.clone())
            .with_timeout(Duration::from_secs(config.timeout_secs))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `request` once and extract the first choice's text.
    ///
    /// No retries. Without a credential the transport is never touched.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        credential: Option<&Credential>,
    ) -> Result<String, CompletionFailure> {
        let credential = credential.ok_or(CompletionFailure::MissingCredential)?;
        let model = request.model.as_deref().unwrap_or(&self.model);

        let payload = serde_json::to_value(CompletionPayload {
            messages: &request.messages,
            model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        })
        .map_err(|e| CompletionFailure::TransportFailure(format!("could not encode request: {e}")))?;

        debug!(
            "Sending chat request to {} with model {} ({} messages)",
            self.endpoint,
            model,
            request.messages.len()
        );

        let send = self
            .transport
            .post_json(&self.endpoint, credential.expose(), &payload, self.timeout);
        let reply = match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result?,
            Err(_) => return Err(TransportError::Timeout(self.timeout).into()),
        };

        if reply.status != 200 {
            warn!("Chat endpoint returned HTTP {}", reply.status);
            return Err(CompletionFailure::ApiError {
                status: reply.status,
                body: reply.body,
            });
        }

        extract_reply(&reply.body).inspect_err(|e| {
            warn!("{}", e);
            debug!("Raw response body: {}", reply.body);
        })
    }
}

/// Pull `choices[0].message.content` out of a response body.
fn extract_reply(body: &str) -> Result<String, CompletionFailure> {
    let parsed: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| CompletionFailure::MalformedResponse(format!("invalid JSON body: {e}")))?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionFailure::MalformedResponse("no choices in response".into()))?;

    choice
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| CompletionFailure::MalformedResponse("first choice has no message content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned transport that records what it was asked to send.
    struct FakeTransport {
        calls: Arc<AtomicUsize>,
        last_body: Arc<Mutex<Option<serde_json::Value>>>,
        reply: Result<HttpReply, TransportError>,
        delay: Option<Duration>,
    }

    impl FakeTransport {
        fn replying(status: u16, body: &str) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                last_body: Arc::new(Mutex::new(None)),
                reply: Ok(HttpReply {
                    status,
                    body: body.to_string(),
                }),
                delay: None,
            }
        }

        fn failing(err: TransportError) -> Self {
            Self {
                reply: Err(err),
                ..Self::replying(200, "")
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn post_json(
            &self,
            _url: &str,
            _bearer: &str,
            body: &serde_json::Value,
            _timeout: Duration,
        ) -> Result<HttpReply, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_body.lock().unwrap() = Some(body.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.clone()
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new(vec![
            ChatMessage {
                role: Role::System,
                content: "sys".into(),
            },
            ChatMessage {
                role: Role::User,
                content: "What crops suit monsoon season?".into(),
            },
        ])
    }

    fn token() -> Credential {
        Credential::new("hf_test").unwrap()
    }

    #[tokio::test]
    async fn missing_credential_skips_transport() {
        let transport = FakeTransport::replying(200, r#"{"choices":[]}"#);
        let calls = transport.calls.clone();
        let client = CompletionClient::new(Box::new(transport));

        let result = client.complete(&request(), None).await;

        assert_eq!(result, Err(CompletionFailure::MissingCredential));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_returns_first_choice_content() {
        let transport =
            FakeTransport::replying(200, r#"{"choices":[{"message":{"content":"X"}}]}"#);
        let client = CompletionClient::new(Box::new(transport));

        let reply = client.complete(&request(), Some(&token())).await;
        assert_eq!(reply, Ok("X".to_string()));
    }

    #[tokio::test]
    async fn payload_carries_messages_and_sampling_parameters() {
        let transport =
            FakeTransport::replying(200, r#"{"choices":[{"message":{"content":"ok"}}]}"#);
        let last_body = transport.last_body.clone();
        let client = CompletionClient::new(Box::new(transport)).with_model("test-model");

        client.complete(&request(), Some(&token())).await.unwrap();

        let body = last_body.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "What crops suit monsoon season?");
        assert!(body["messages"][1].get("timestamp").is_none());
    }

    #[test]
    fn wire_body_has_exact_sampling_values() {
        let wire = serde_json::to_string(&CompletionPayload {
            messages: &[],
            model: "m",
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        })
        .unwrap();
        assert!(wire.contains(r#""temperature":0.7"#), "{wire}");
        assert!(wire.contains(r#""max_tokens":1000"#), "{wire}");
    }

    #[tokio::test]
    async fn request_model_overrides_client_default() {
        let transport =
            FakeTransport::replying(200, r#"{"choices":[{"message":{"content":"ok"}}]}"#);
        let last_body = transport.last_body.clone();
        let client = CompletionClient::new(Box::new(transport));

        let req = request().with_model("other").with_max_tokens(50).with_temperature(0.1);
        client.complete(&req, Some(&token())).await.unwrap();

        let body = last_body.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "other");
        assert_eq!(body["max_tokens"], 50);
    }

    #[tokio::test]
    async fn non_200_is_api_error() {
        let transport = FakeTransport::replying(500, "upstream exploded");
        let client = CompletionClient::new(Box::new(transport));

        let result = client.complete(&request(), Some(&token())).await;
        assert_eq!(
            result,
            Err(CompletionFailure::ApiError {
                status: 500,
                body: "upstream exploded".into()
            })
        );
    }

    #[tokio::test]
    async fn transport_timeout_is_transport_failure() {
        let transport = FakeTransport::failing(TransportError::Timeout(DEFAULT_TIMEOUT));
        let client = CompletionClient::new(Box::new(transport));

        let result = client.complete(&request(), Some(&token())).await;
        assert!(matches!(result, Err(CompletionFailure::TransportFailure(_))));
    }

    #[tokio::test]
    async fn slow_transport_is_cut_off_at_timeout() {
        let mut transport =
            FakeTransport::replying(200, r#"{"choices":[{"message":{"content":"late"}}]}"#);
        transport.delay = Some(Duration::from_secs(5));
        let client =
            CompletionClient::new(Box::new(transport)).with_timeout(Duration::from_millis(50));

        let result = client.complete(&request(), Some(&token())).await;
        match result {
            Err(CompletionFailure::TransportFailure(detail)) => {
                assert!(detail.contains("timed out"), "{detail}")
            }
            other => panic!("expected transport failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_is_malformed() {
        let transport = FakeTransport::replying(200, r#"{"choices": []}"#);
        let client = CompletionClient::new(Box::new(transport));

        let result = client.complete(&request(), Some(&token())).await;
        assert!(matches!(result, Err(CompletionFailure::MalformedResponse(_))));
    }

    #[test]
    fn extract_reply_rejects_missing_fields() {
        for body in [
            "not json",
            "{}",
            r#"{"choices":[{}]}"#,
            r#"{"choices":[{"message":{}}]}"#,
            r#"{"choices":[{"message":{"content":null}}]}"#,
        ] {
            assert!(
                matches!(extract_reply(body), Err(CompletionFailure::MalformedResponse(_))),
                "{body}"
            );
        }
    }

    #[test]
    fn extract_reply_uses_only_first_choice() {
        let body = r#"{"choices":[{"message":{"content":"first"}},{"message":{"content":"second"}}]}"#;
        assert_eq!(extract_reply(body), Ok("first".to_string()));
    }
}
