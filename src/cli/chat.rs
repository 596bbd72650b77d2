//! `chat` command: one prompt, one streamed reply.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::api::{Token, ROLE_ASSISTANT, ROLE_USER};
use crate::core::config::Config;
use crate::core::history::{store_token_history, ChatHistory};
use crate::core::providers::ProviderTable;
use crate::render::{ContainerHandle, StreamRenderer};
use crate::transport::{print_response, TransportFactory};
use crate::utils::syntax::SyntectHighlighter;

pub async fn run_chat(
    config: &Config,
    model: Option<&str>,
    history_path: Option<&Path>,
    prompt: Vec<String>,
) -> Result<String, Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        return Err("Usage: chatpane chat <prompt>".into());
    }

    let table = ProviderTable::from_config(config);
    let provider = table.resolve(model, config)?.clone();
    info!(model = %provider.model, provider = %provider.provider, "Starting chat");

    let mut tokens = vec![Token {
        role: ROLE_USER.to_string(),
        content: prompt,
        llm_info: provider.clone(),
    }];

    let factory = TransportFactory::new(reqwest::Client::new(), config.server_url())
        .with_retry(config.retry_policy());
    let mut adapter = factory.open(&provider, &tokens).await?;

    let mut container = ContainerHandle::new("chat-reply");
    let mut renderer = StreamRenderer::new(
        container.clone(),
        Arc::new(SyntectHighlighter::new()),
        config.renderer_options(),
    );
    let reply = print_response(
        &mut adapter,
        &mut renderer,
        &mut container,
        &config.driver_options(),
    )
    .await?;

    if let Some(path) = history_path {
        tokens.push(Token {
            role: ROLE_ASSISTANT.to_string(),
            content: reply,
            llm_info: provider.clone(),
        });
        let mut history = ChatHistory::load(path)?;
        store_token_history(&tokens, &mut history, &provider);
        history.save(path)?;
    }

    Ok(container.inner_html())
}
