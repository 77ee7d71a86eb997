//! Streaming client for OpenAI-compatible `/chat/completions` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, instrument};

use manualchat_shared::{ContextMessage, ManualChatError, Result, UpstreamConfig};

use crate::sse::{LineBuffer, SseEvent, parse_line};
use crate::{CompletionService, FragmentStream};

/// User-Agent string for upstream requests.
const USER_AGENT: &str = concat!("manualchat/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an error body copied into an error message.
const ERROR_BODY_LIMIT: usize = 512;

/// Client for any API that speaks the OpenAI streaming chat format.
///
/// Built once at startup and shared by every request.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    open_timeout: Duration,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &UpstreamConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ManualChatError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            temperature: config.temperature,
            open_timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionService for OpenAiCompatibleClient {
    #[instrument(skip_all, fields(model = %self.model, messages = messages.len()))]
    async fn stream_completion(&self, messages: &[ContextMessage]) -> Result<FragmentStream> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "stream": true,
            "messages": messages,
        });

        let request = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send();

        // Bounds time-to-headers only; the body may stream for longer.
        let resp = tokio::time::timeout(self.open_timeout, request)
            .await
            .map_err(|_| {
                ManualChatError::Network(format!(
                    "upstream did not respond within {}s",
                    self.open_timeout.as_secs()
                ))
            })?
            .map_err(|e| ManualChatError::Network(format!("upstream request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(ManualChatError::Upstream(format!("HTTP {status}: {snippet}")));
        }

        debug!(status = %resp.status(), "upstream stream opened");

        let mut body = resp.bytes_stream();
        let stream = async_stream::try_stream! {
            let mut lines = LineBuffer::default();
            let mut done = false;

            while !done {
                let Some(chunk) = body.next().await else {
                    break;
                };
                let chunk = chunk.map_err(|e| {
                    ManualChatError::Network(format!("upstream stream read failed: {e}"))
                })?;

                for line in lines.push(&chunk) {
                    match parse_line(&line)? {
                        SseEvent::Fragment(text) => {
                            yield text;
                        }
                        SseEvent::Done => {
                            done = true;
                            break;
                        }
                        SseEvent::Skip => {}
                    }
                }
            }

            if !done {
                if let Some(line) = lines.finish() {
                    if let SseEvent::Fragment(text) = parse_line(&line)? {
                        yield text;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse_body(fragments: &[&str]) -> String {
        let mut body = String::from(
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        );
        for f in fragments {
            body.push_str(&format!(
                "data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":{}}}}}]}}\n\n",
                serde_json::to_string(f).unwrap()
            ));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    fn client_for(server: &MockServer) -> OpenAiCompatibleClient {
        let config = UpstreamConfig {
            base_url: format!("{}/v1/", server.uri()),
            model: "test-model".into(),
            timeout_secs: 5,
            ..UpstreamConfig::default()
        };
        OpenAiCompatibleClient::new(&config, "test-key").unwrap()
    }

    fn sse_response(body: String) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/event-stream")
            .set_body_string(body)
    }

    #[tokio::test]
    async fn streams_fragments_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "test-model", "stream": true})))
            .respond_with(sse_response(sse_body(&["A", "B", "C"])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let stream = client
            .stream_completion(&[ContextMessage::system("sys"), ContextMessage::user("hi")])
            .await
            .unwrap();
        let fragments: Vec<String> = stream.try_collect().await.unwrap();
        assert_eq!(fragments, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn stops_at_done() {
        let server = MockServer::start().await;
        let mut body = sse_body(&["only"]);
        body.push_str("data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n");
        Mock::given(method("POST"))
            .respond_with(sse_response(body))
            .mount(&server)
            .await;

        let fragments: Vec<String> = client_for(&server)
            .stream_completion(&[ContextMessage::user("hi")])
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(fragments, vec!["only"]);
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .stream_completion(&[ContextMessage::user("hi")])
            .await;
        match result {
            Err(ManualChatError::Upstream(msg)) => assert!(msg.contains("overloaded")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[tokio::test]
    async fn error_chunk_fails_mid_stream() {
        let server = MockServer::start().await;
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n\
                    data: {\"error\":{\"message\":\"model crashed\"}}\n\n";
        Mock::given(method("POST"))
            .respond_with(sse_response(body.to_string()))
            .mount(&server)
            .await;

        let mut stream = client_for(&server)
            .stream_completion(&[ContextMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "A");
        assert!(stream.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn unreachable_upstream_is_network_error() {
        let config = UpstreamConfig {
            base_url: "http://127.0.0.1:1".into(),
            timeout_secs: 2,
            ..UpstreamConfig::default()
        };
        let client = OpenAiCompatibleClient::new(&config, "k").unwrap();
        let result = client.stream_completion(&[ContextMessage::user("hi")]).await;
        assert!(matches!(result, Err(ManualChatError::Network(_))));
    }
}
