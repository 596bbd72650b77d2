//! HTTP transports: the bundled backend server and OpenAI-compatible hosts.

use tracing::debug;

use super::sse::{format_api_error, SseDeltaSource};
use super::{TransportError, ValueStream};
use crate::api::{BackendChatRequest, ChatMessage, ChatRequest, LlmProvider};
use crate::utils::url::construct_api_url;

/// Endpoint of the backend server when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000/chat/";

/// Adds provider-specific authentication headers.
///
/// Anthropic uses `x-api-key` with a pinned `anthropic-version`; every other
/// host takes a bearer token.
pub fn add_auth_headers(
    request: reqwest::RequestBuilder,
    provider_name: &str,
    api_key: &str,
) -> reqwest::RequestBuilder {
    if provider_name.eq_ignore_ascii_case("anthropic") {
        return request
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01");
    }
    request.header("Authorization", format!("Bearer {api_key}"))
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(TransportError::Status {
        status: status.as_u16(),
        body: format_api_error(&error_text),
    })
}

/// Posts the conversation to the backend server and returns its raw body,
/// which streams the reply as UTF-8 bytes.
pub async fn post_backend(
    client: &reqwest::Client,
    server_url: &str,
    provider: &LlmProvider,
    messages: Vec<ChatMessage>,
) -> Result<ValueStream, TransportError> {
    debug!(url = server_url, model = %provider.model, "Posting chat to backend");
    let request = BackendChatRequest {
        messages,
        llm: provider,
    };
    let response = client
        .post(server_url)
        .header("Content-Type", "application/json")
        .json(&request)
        .send()
        .await?;
    Ok(ValueStream::from_response(ensure_success(response).await?))
}

/// Opens a streaming `chat/completions` request against an
/// OpenAI-compatible host.
pub async fn post_chat_completions(
    client: &reqwest::Client,
    base_url: &str,
    provider_name: &str,
    api_key: Option<&str>,
    model: &str,
    messages: Vec<ChatMessage>,
) -> Result<SseDeltaSource, TransportError> {
    let chat_url = construct_api_url(base_url, "chat/completions");
    debug!(url = %chat_url, model, "Opening completion stream");

    let request = ChatRequest {
        model: model.to_string(),
        messages,
        stream: true,
    };
    let mut http_request = client
        .post(chat_url)
        .header("Content-Type", "application/json");
    if let Some(api_key) = api_key {
        http_request = add_auth_headers(http_request, provider_name, api_key);
    }

    let response = http_request.json(&request).send().await?;
    Ok(SseDeltaSource::from_response(ensure_success(response).await?))
}
