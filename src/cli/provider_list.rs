use crate::core::config::Config;
use crate::core::providers::ProviderTable;
use crate::transport::TransportKind;

/// Markdown table of every provider, default model marked with `*`.
pub fn provider_table(config: &Config) -> String {
    let table = ProviderTable::from_config(config);
    let default_model = table
        .resolve(None, config)
        .ok()
        .map(|provider| provider.model.clone());

    let mut content = String::from("| Model | Provider | Title | Transport | Key |\n");
    content.push_str("|---|---|---|---|---|\n");

    for provider in table.providers() {
        let model = if default_model
            .as_deref()
            .is_some_and(|d| d.eq_ignore_ascii_case(&provider.model))
        {
            format!("{}*", provider.model)
        } else {
            provider.model.clone()
        };
        let transport = match TransportKind::for_provider(provider) {
            TransportKind::Backend => "backend".to_string(),
            TransportKind::OpenAiCompatible { base_url } => base_url,
            TransportKind::LocalEngine => "local engine".to_string(),
        };
        let key = if provider.api_key_name.is_empty() {
            "-"
        } else {
            provider.api_key_name.as_str()
        };
        content.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            model, provider.provider, provider.title, transport, key
        ));
    }

    content.push_str("\n\\* = default model");
    content
}

pub fn list_providers(config: &Config) {
    println!("Available Providers:\n");
    println!("{}", provider_table(config));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_the_default_model() {
        let config = Config {
            default_model: Some("gpt-4o".to_string()),
            ..Default::default()
        };
        let table = provider_table(&config);
        assert!(table.contains("| gpt-4o* | openai |"));
        assert!(table.contains("| gpt-4o-mini | openai |"));
        assert!(table.contains("| codestral:22b | ollama | ollama - codestral:22b | backend | OLLAMA_API |"));
    }
}
