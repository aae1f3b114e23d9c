//! Wikichat - streaming chat completions from a wiki-hosted LLM service
//!
//! Builds validated completion requests, sends them to the wiki's REST API
//! and, for streaming requests, reassembles `data:` frames from the response
//! body as they arrive, handing each decoded event to a callback. Calls can
//! be cancelled mid-flight with a [`CancellationToken`].
//!
//! ```no_run
//! use wikichat::{ChatClient, ChatMessage, CancellationToken, CompletionRequest};
//!
//! # async fn run() -> wikichat::error::Result<()> {
//! let client = ChatClient::new()?;
//! let request = CompletionRequest::create("AI.Models.Default", 0.5, vec![ChatMessage::user("hi")], true)?;
//! let cancel = CancellationToken::new();
//!
//! client
//!     .complete(&request, |event| print!("{}", event.content().unwrap_or_default()), &cancel)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;

pub use api::{
    ChatMessage, CompletionRequest, CompletionResponse, DeltaEvent, ModelDescriptor,
    PromptTemplate, Role, StreamAccumulator, StreamSummary, Usage,
};
pub use client::Framing;
pub use config::{ClientConfig, ConfigLoader};
pub use error::{ChatError, Result, ValidationError};
pub use tokio_util::sync::CancellationToken;

use api::ModelList;
use client::stream::until_cancelled;
use client::{dispatch_events, FrameDecoder, HttpClient};

/// Result of a completed call
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    /// Non-streaming call: the single response body
    Complete(CompletionResponse),

    /// Streaming call: bounded summary of what was dispatched
    Streamed(StreamSummary),
}

impl CompletionOutcome {
    /// Usage totals, when the server reported them
    pub fn usage(&self) -> Option<Usage> {
        match self {
            CompletionOutcome::Complete(response) => response.usage,
            CompletionOutcome::Streamed(summary) => summary.usage,
        }
    }
}

/// The main chat client.
///
/// Holds no per-call state, so one client can serve any number of
/// concurrent calls, each with its own decoder and cancellation token.
#[derive(Debug, Clone)]
pub struct ChatClient {
    /// Client configuration
    config: ClientConfig,

    /// HTTP client
    http_client: HttpClient,
}

impl ChatClient {
    /// Create a new client with configuration from the default locations
    pub fn new() -> Result<Self> {
        Self::from_config(ConfigLoader::new()?.into_config()?)
    }

    /// Create a client with a custom config path
    pub fn with_config_path(path: &str) -> Result<Self> {
        Self::from_config(ConfigLoader::from_path(path)?.into_config()?)
    }

    /// Create a client from a config object
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        // Fail on a malformed base URL now rather than on the first call
        config.completions_url()?;

        let api_key = config.effective_api_key();
        let http_client = HttpClient::new(
            api_key.as_deref(),
            &config.headers,
            config.connect_timeout(),
        )?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build a request from the configured model, temperature and stream flag
    pub fn new_request(&self, messages: Vec<ChatMessage>) -> Result<CompletionRequest> {
        let model = self.config.model.clone().unwrap_or_default();
        Ok(CompletionRequest::create(
            model,
            self.config.temperature,
            messages,
            self.config.stream,
        )?)
    }

    /// Send a completion request.
    ///
    /// For a non-streaming request `on_event` is never called and the
    /// response body is returned. For a streaming request every decoded
    /// event is passed to `on_event` in stream order and a summary is
    /// returned once the body ends.
    ///
    /// Fails with [`ChatError::Aborted`] when `cancel` fires before the call
    /// finishes; events already delivered are not retracted.
    #[tracing::instrument(skip_all, fields(model = request.model(), stream = request.stream()))]
    pub async fn complete<F>(
        &self,
        request: &CompletionRequest,
        on_event: F,
        cancel: &CancellationToken,
    ) -> Result<CompletionOutcome>
    where
        F: FnMut(DeltaEvent),
    {
        let payload = request.serialize()?;
        let url = self.config.completions_url()?;

        if !payload.stream {
            let response = until_cancelled(cancel, self.http_client.post_json(url, &payload)).await?;
            return Ok(CompletionOutcome::Complete(response));
        }

        let body = until_cancelled(cancel, self.http_client.post_stream(url, &payload)).await?;
        let decoder =
            FrameDecoder::new(self.config.framing).with_max_frame_bytes(self.config.max_frame_bytes);
        let summary = dispatch_events(body, decoder, on_event, cancel).await?;

        Ok(CompletionOutcome::Streamed(summary))
    }

    /// List the chat models available on the wiki
    pub async fn models(&self) -> Result<Vec<ModelDescriptor>> {
        let list: ModelList = self.http_client.get_json(self.config.models_url()?).await?;
        Ok(list.data)
    }

    /// List the stored prompt templates
    pub async fn prompts(&self) -> Result<Vec<PromptTemplate>> {
        self.http_client.get_json(self.config.prompts_url()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use std::io::Write;

    const COMPLETIONS: &str = r"^/xwiki/rest/wikis/xwiki/aiLLM/v1/chat/completions";

    fn client_for(server: &mockito::ServerGuard, api_key: Option<&str>) -> ChatClient {
        ChatClient::from_config(ClientConfig {
            base_url: format!("{}/xwiki", server.url()),
            api_key: api_key.map(str::to_string),
            api_key_env: None,
            api_base_env: None,
            model: Some("m1".to_string()),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    fn hi(stream: bool) -> CompletionRequest {
        CompletionRequest::create("m1", 0.5, vec![ChatMessage::user("hi")], stream).unwrap()
    }

    #[tokio::test]
    async fn test_streaming_scenario() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Regex(COMPLETIONS.to_string()))
            .match_query(Matcher::UrlEncoded("media".into(), "json".into()))
            .match_body(Matcher::Json(json!({
                "model": "m1",
                "temperature": 0.5,
                "messages": [{"role": "user", "content": "hi"}],
                "stream": true
            })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\
                 data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            )
            .create_async()
            .await;

        let client = client_for(&server, None);
        let mut fragments = Vec::new();
        let outcome = client
            .complete(
                &hi(true),
                |event| fragments.push(event.content().unwrap_or_default().to_string()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(fragments, vec!["Hel", "lo"]);
        match outcome {
            CompletionOutcome::Streamed(summary) => assert_eq!(summary.events, 2),
            other => panic!("expected a streamed outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_streaming_chunked_body_with_usage() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Regex(COMPLETIONS.to_string()))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_chunked_body(|w| {
                w.write_all(b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"con")?;
                w.write_all(b"tent\":\"Hi \"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"there\"},")?;
                w.write_all(b"\"finish_reason\":\"stop\"}]}\n\n")?;
                w.write_all(b"data: {\"choices\":[],\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":2,\"total_tokens\":6}}\n\n")?;
                w.write_all(b"data: [DONE]\n\n")
            })
            .create_async()
            .await;

        let client = client_for(&server, None);
        let mut acc = StreamAccumulator::new();
        let outcome = client
            .complete(&hi(true), |event| acc.process(&event), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(acc.content, "Hi there");
        assert_eq!(acc.finish_reason.as_deref(), Some("stop"));
        assert_eq!(outcome.usage().map(|u| u.total_tokens), Some(6));
    }

    #[tokio::test]
    async fn test_streaming_request_answered_with_plain_json() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Regex(COMPLETIONS.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "object": "chat.completion",
                    "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server, None);
        let mut acc = StreamAccumulator::new();
        let outcome = client
            .complete(&hi(true), |event| acc.process(&event), &CancellationToken::new())
            .await
            .unwrap();

        match outcome {
            CompletionOutcome::Streamed(summary) => assert_eq!(summary.events, 1),
            other => panic!("expected a streamed outcome, got {other:?}"),
        }
        assert_eq!(acc.content, "hi");
    }

    #[tokio::test]
    async fn test_non_streaming_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Regex(COMPLETIONS.to_string()))
            .match_header("authorization", "Bearer secret")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({"stream": false})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{"message": {"role": "assistant", "content": "Hello!"}}],
                    "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server, Some("secret"));
        let mut calls = 0;
        let outcome = client
            .complete(&hi(false), |_| calls += 1, &CancellationToken::new())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(calls, 0);
        match outcome {
            CompletionOutcome::Complete(response) => {
                assert_eq!(response.content(), Some("Hello!"));
                assert_eq!(response.usage.map(|u| u.total_tokens), Some(5));
            }
            other => panic!("expected a complete outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_status_is_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Regex(COMPLETIONS.to_string()))
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = client_for(&server, None);
        for stream in [true, false] {
            let mut calls = 0;
            let err = client
                .complete(&hi(stream), |_| calls += 1, &CancellationToken::new())
                .await
                .unwrap_err();

            assert!(err.is_transport());
            assert!(!err.is_abort());
            assert_eq!(calls, 0);
            match err {
                ChatError::Status { status, body } => {
                    assert_eq!(status.as_u16(), 500);
                    assert_eq!(body, "boom");
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_malformed_response_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Regex(COMPLETIONS.to_string()))
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client
            .complete(&hi(false), |_| {}, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_parse());
    }

    #[tokio::test]
    async fn test_cancelled_before_send_never_hits_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .complete(&hi(true), |_| {}, &cancel)
            .await
            .unwrap_err();

        assert!(err.is_abort());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_default_request_is_rejected_locally() {
        let server = mockito::Server::new_async().await;
        let client = ChatClient::from_config(ClientConfig {
            base_url: server.url(),
            model: None,
            api_key_env: None,
            api_base_env: None,
            ..ClientConfig::default()
        })
        .unwrap();

        let err = client.new_request(vec![ChatMessage::user("hi")]).unwrap_err();
        assert!(matches!(
            err,
            ChatError::Validation(ValidationError::EmptyModel)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_independent() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Regex(COMPLETIONS.to_string()))
            .with_status(200)
            .with_body(
                "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n\
                 data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
            )
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let (request_a, request_b) = (hi(true), hi(true));
        let (cancel_a, cancel_b) = (CancellationToken::new(), CancellationToken::new());
        let (mut seen_a, mut seen_b) = (String::new(), String::new());

        let (a, b) = tokio::join!(
            client.complete(
                &request_a,
                |e| seen_a.push_str(e.content().unwrap_or_default()),
                &cancel_a
            ),
            client.complete(
                &request_b,
                |e| seen_b.push_str(e.content().unwrap_or_default()),
                &cancel_b
            ),
        );

        a.unwrap();
        b.unwrap();
        assert_eq!(seen_a, "ab");
        assert_eq!(seen_b, "ab");
    }

    #[tokio::test]
    async fn test_models_and_prompts() {
        let mut server = mockito::Server::new_async().await;
        let _models = server
            .mock("GET", Matcher::Regex(r"^/xwiki/rest/wikis/xwiki/aiLLM/v1/models".to_string()))
            .with_status(200)
            .with_body(
                json!({
                    "object": "list",
                    "data": [{"id": "m1", "name": "Model One", "contextLength": 4096, "canStream": true}]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _prompts = server
            .mock("GET", Matcher::Regex(r"^/xwiki/rest/wikis/xwiki/aiLLM/v1/prompts".to_string()))
            .with_status(200)
            .with_body(json!([{"name": "default", "prompt": "Be brief."}]).to_string())
            .create_async()
            .await;

        let client = client_for(&server, None);

        let models = client.models().await.unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, "m1");
        assert!(models[0].can_stream);

        let prompts = client.prompts().await.unwrap();
        assert_eq!(prompts[0].name, "default");
        assert_eq!(prompts[0].prompt.as_deref(), Some("Be brief."));
    }
}
