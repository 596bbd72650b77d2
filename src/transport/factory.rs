use tracing::debug;

use super::engine::{EngineHandle, RetryPolicy};
use super::http::{post_backend, post_chat_completions, DEFAULT_SERVER_URL};
use super::{TokenSource, TransportAdapter, TransportError};
use crate::api::{messages_from_tokens, ChatMessage, LlmProvider, Token, ROLE_SYSTEM};

/// Provider name routed to the in-process engine.
pub const LOCAL_ENGINE_PROVIDER: &str = "webllm";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportKind {
    /// Raw byte stream from the backend server.
    Backend,
    /// Direct SSE request to an OpenAI-compatible host.
    OpenAiCompatible { base_url: String },
    /// The injected [`EngineHandle`].
    LocalEngine,
}

impl TransportKind {
    pub fn for_provider(provider: &LlmProvider) -> Self {
        if provider.provider == LOCAL_ENGINE_PROVIDER {
            return TransportKind::LocalEngine;
        }
        match provider.api_base.as_deref().map(str::trim) {
            Some(base) if !base.is_empty() => TransportKind::OpenAiCompatible {
                base_url: base.to_string(),
            },
            _ => TransportKind::Backend,
        }
    }
}

/// Opens the right transport for a provider record.
#[derive(Clone, Debug)]
pub struct TransportFactory {
    client: reqwest::Client,
    server_url: String,
    engine: Option<EngineHandle>,
    retry: RetryPolicy,
}

impl Default for TransportFactory {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), DEFAULT_SERVER_URL)
    }
}

impl TransportFactory {
    pub fn new(client: reqwest::Client, server_url: impl Into<String>) -> Self {
        Self {
            client,
            server_url: server_url.into(),
            engine: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_engine(mut self, engine: EngineHandle) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub async fn open(
        &self,
        provider: &LlmProvider,
        history: &[Token],
    ) -> Result<TransportAdapter<Box<dyn TokenSource>>, TransportError> {
        let kind = TransportKind::for_provider(provider);
        debug!(model = %provider.model, ?kind, "Opening transport");

        let source: Box<dyn TokenSource> = match kind {
            TransportKind::Backend => Box::new(
                post_backend(
                    &self.client,
                    &self.server_url,
                    provider,
                    messages_from_tokens(history),
                )
                .await?,
            ),
            TransportKind::OpenAiCompatible { base_url } => {
                let api_key = resolve_api_key(provider)?;
                Box::new(
                    post_chat_completions(
                        &self.client,
                        &base_url,
                        &provider.provider,
                        api_key.as_deref(),
                        &provider.model,
                        with_system_message(provider, history),
                    )
                    .await?,
                )
            }
            TransportKind::LocalEngine => {
                let engine =
                    self.engine
                        .as_ref()
                        .ok_or_else(|| TransportError::EngineUnavailable {
                            provider: provider.provider.clone(),
                        })?;
                Box::new(
                    engine
                        .open_stream(
                            &provider.model,
                            &with_system_message(provider, history),
                            self.retry,
                        )
                        .await?,
                )
            }
        };
        Ok(TransportAdapter::new(source))
    }
}

/// Local hosts may run without a key; hosted ones may not.
fn resolve_api_key(provider: &LlmProvider) -> Result<Option<String>, TransportError> {
    if provider.api_key_name.is_empty() {
        return Ok(None);
    }
    match std::env::var(&provider.api_key_name) {
        Ok(key) if !key.trim().is_empty() => Ok(Some(key.trim().to_string())),
        _ if provider.is_local() => Ok(None),
        _ => Err(TransportError::MissingApiKey {
            env_var: provider.api_key_name.clone(),
        }),
    }
}

/// Conversation messages led by the provider's system message, unless the
/// history already opens with one.
pub fn with_system_message(provider: &LlmProvider, history: &[Token]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    let has_system = history
        .first()
        .is_some_and(|token| token.role == ROLE_SYSTEM);
    if !has_system && !provider.system_message.trim().is_empty() {
        messages.push(ChatMessage::new(ROLE_SYSTEM, provider.system_message.clone()));
    }
    messages.extend(messages_from_tokens(history));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::engine::tests::ScriptedEngine;
    use crate::transport::ReadResult;

    fn provider(name: &str, api_base: Option<&str>) -> LlmProvider {
        LlmProvider {
            model: "model-x".into(),
            provider: name.into(),
            title: "Model X".into(),
            icon: String::new(),
            subtitle: String::new(),
            system_message: "You are helpful.".into(),
            api_key_name: "CHATPANE_TEST_UNSET_KEY".into(),
            api_base: api_base.map(str::to_string),
            local: None,
        }
    }

    #[test]
    fn selects_transport_by_provider_record() {
        assert_eq!(
            TransportKind::for_provider(&provider("webllm", Some("http://ignored"))),
            TransportKind::LocalEngine
        );
        assert_eq!(
            TransportKind::for_provider(&provider("ollama", Some("http://localhost:11434/v1"))),
            TransportKind::OpenAiCompatible {
                base_url: "http://localhost:11434/v1".into()
            }
        );
        assert_eq!(
            TransportKind::for_provider(&provider("openai", Some("  "))),
            TransportKind::Backend
        );
        assert_eq!(
            TransportKind::for_provider(&provider("openai", None)),
            TransportKind::Backend
        );
    }

    #[test]
    fn system_message_leads_unless_present() {
        let llm = provider("openai", None);
        let user = Token {
            role: "user".into(),
            content: "hi".into(),
            llm_info: llm.clone(),
        };
        let messages = with_system_message(&llm, std::slice::from_ref(&user));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ROLE_SYSTEM);

        let system = Token {
            role: ROLE_SYSTEM.into(),
            content: "custom".into(),
            llm_info: llm.clone(),
        };
        let messages = with_system_message(&llm, &[system, user]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "custom");
    }

    #[test]
    fn hosted_providers_need_a_key_local_ones_do_not() {
        let hosted = provider("groq", Some("https://api.groq.com/openai/v1"));
        assert!(matches!(
            resolve_api_key(&hosted),
            Err(TransportError::MissingApiKey { .. })
        ));

        let mut local = hosted.clone();
        local.local = Some(true);
        assert_eq!(resolve_api_key(&local).unwrap(), None);
    }

    #[tokio::test]
    async fn engine_provider_without_engine_fails() {
        let factory = TransportFactory::default();
        let err = match factory.open(&provider("webllm", None), &[]).await {
            Err(err) => err,
            Ok(_) => panic!("expected failure"),
        };
        assert!(matches!(err, TransportError::EngineUnavailable { .. }));
    }

    #[tokio::test]
    async fn engine_provider_streams_through_adapter() {
        let factory = TransportFactory::default()
            .with_engine(EngineHandle::new(ScriptedEngine::new(vec!["a", "b"])));
        let mut adapter = factory.open(&provider("webllm", None), &[]).await.unwrap();
        assert_eq!(adapter.read().await.unwrap(), ReadResult::value(Some("a".into())));
        assert_eq!(adapter.read().await.unwrap(), ReadResult::value(Some("b".into())));
        assert_eq!(adapter.read().await.unwrap(), ReadResult::done());
    }
}
