//! `provider add` / `provider remove` for custom providers in the config file.

use std::error::Error;

use crate::api::LlmProvider;
use crate::core::config::Config;
use crate::utils::url::is_http_url;

/// Stores `provider`, replacing any custom provider with the same model.
pub fn add_provider(config: &mut Config, provider: LlmProvider) -> Result<String, Box<dyn Error>> {
    if provider.model.trim().is_empty() {
        return Err("Model name cannot be empty".into());
    }
    if let Some(api_base) = provider.api_base.as_deref() {
        if !is_http_url(api_base) {
            return Err(format!(
                "Invalid api base: {api_base} (expected an http:// or https:// URL)"
            )
            .into());
        }
    }

    let verb = if config.get_custom_provider(&provider.model).is_some() {
        "Updated"
    } else {
        "Added"
    };
    let message = format!("✅ {verb} provider {} ({})", provider.model, provider.provider);
    config.add_custom_provider(provider);
    Ok(message)
}

pub fn remove_provider(config: &mut Config, model: &str) -> Result<String, Box<dyn Error>> {
    let Some(existing) = config.get_custom_provider(model) else {
        return Err(format!(
            "Provider '{model}' is not a custom provider. Use 'chatpane providers' to see configured providers."
        )
        .into());
    };
    let message = format!("✅ Removed provider {}", existing.model);
    config.remove_custom_provider(model);
    Ok(message)
}
