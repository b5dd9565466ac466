use futures_util::StreamExt;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use deskdemo_core::{ChatRequest, StreamFrame};

use crate::decoder::SseDecoder;
use crate::error::ClientError;
use crate::session::ChatSession;

/// HTTP client for the chat relay.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    base_url: String,
}

impl ChatClient {
    /// Create a client for the server at `base_url` (e.g. `http://localhost:3000`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a message and stream the answer into `session`.
    ///
    /// `observer` is called after the placeholder is added, after every
    /// applied event and once more when the response is finished. Transport
    /// and HTTP failures leave the generic error message in the session and
    /// are also returned.
    pub async fn send<F>(
        &self,
        session: &mut ChatSession,
        text: &str,
        mut observer: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(&ChatSession),
    {
        let request = session.submit(text)?;
        session.begin_response();
        observer(&*session);

        let result = self.stream_response(session, &request, &mut observer).await;
        if let Err(e) = &result {
            warn!(error = %e, "chat request failed");
            session.fail();
        }

        session.finish();
        observer(&*session);
        result
    }

    async fn stream_response<F>(
        &self,
        session: &mut ChatSession,
        request: &ChatRequest,
        observer: &mut F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(&ChatSession),
    {
        let url = format!("{}/api/chat", self.base_url);
        let response = self.http.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body.get("error")?.as_str().map(str::to_string))
                .unwrap_or_else(|| status.to_string());
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        info!(url = %url, "streaming chat response");

        let mut decoder = SseDecoder::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            for frame in decoder.push(&chunk?) {
                match frame {
                    StreamFrame::Event(event) => {
                        session.apply(&event);
                        observer(&*session);
                    }
                    StreamFrame::End => {
                        debug!("chat response complete");
                        return Ok(());
                    }
                }
            }
        }

        if let Some(StreamFrame::Event(event)) = decoder.finish() {
            session.apply(&event);
            observer(&*session);
        }
        debug!("chat response ended without sentinel");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::GENERIC_ERROR_MESSAGE;
    use deskdemo_core::Role;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/event-stream")
            .set_body_string(body)
    }

    fn contents(session: &ChatSession) -> Vec<(Role, String)> {
        session
            .messages()
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_send_streams_answer() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({
                "messages": [{"role": "user", "content": "Hi"}]
            })))
            .respond_with(sse(concat!(
                "data: {\"type\":\"tool_start\",\"tool\":\"WebSearch\"}\n\n",
                "data: {\"type\":\"text_delta\",\"text\":\"Hello\"}\n\n",
                "data: {\"type\":\"text_delta\",\"text\":\" there\"}\n\n",
                "data: {\"type\":\"done\"}\n\n",
                "data: [DONE]\n\n",
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ChatClient::new(format!("{}/", mock_server.uri()));
        let mut session = ChatSession::new();
        let mut saw_tool = false;
        let mut calls = 0;

        client
            .send(&mut session, "Hi", |s| {
                calls += 1;
                saw_tool |= s.tool_status().is_some();
            })
            .await
            .unwrap();

        assert!(saw_tool);
        // placeholder, four events, finish
        assert_eq!(calls, 6);
        assert_eq!(
            contents(&session),
            vec![
                (Role::User, "Hi".to_string()),
                (Role::Assistant, "Hello there".to_string())
            ]
        );
        assert!(!session.is_in_flight());
    }

    #[tokio::test]
    async fn test_no_text_removes_placeholder() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(sse("data: {\"type\":\"done\"}\n\ndata: [DONE]\n\n"))
            .mount(&mock_server)
            .await;

        let client = ChatClient::new(mock_server.uri());
        let mut session = ChatSession::new();
        client.send(&mut session, "Hi", |_| {}).await.unwrap();

        assert_eq!(contents(&session), vec![(Role::User, "Hi".to_string())]);
    }

    #[tokio::test]
    async fn test_in_band_error_shows_generic_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(sse(concat!(
                "data: {\"type\":\"text_delta\",\"text\":\"Part\"}\n\n",
                "data: {\"type\":\"error\",\"error\":\"process error\"}\n\n",
                "data: [DONE]\n\n",
            )))
            .mount(&mock_server)
            .await;

        let client = ChatClient::new(mock_server.uri());
        let mut session = ChatSession::new();
        client.send(&mut session, "Hi", |_| {}).await.unwrap();

        assert_eq!(session.messages()[1].content, GENERIC_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"error": "messages array is required"})),
            )
            .mount(&mock_server)
            .await;

        let client = ChatClient::new(mock_server.uri());
        let mut session = ChatSession::new();
        let err = client.send(&mut session, "Hi", |_| {}).await.unwrap_err();

        match err {
            ClientError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "messages array is required");
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert_eq!(session.messages()[1].content, GENERIC_ERROR_MESSAGE);
        assert!(!session.is_in_flight());

        // The session accepts the next message after a failure.
        assert!(session.submit("again").is_ok());
    }

    #[tokio::test]
    async fn test_busy_session_rejected_without_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(sse("data: [DONE]\n\n"))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = ChatClient::new(mock_server.uri());
        let mut session = ChatSession::new();
        session.submit("first").unwrap();

        let err = client.send(&mut session, "second", |_| {}).await.unwrap_err();
        assert!(matches!(err, ClientError::Busy));
    }
}
