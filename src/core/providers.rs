//! Provider table: built-in providers shipped with the binary, merged with
//! the user's configured ones.

use serde::Deserialize;
use std::fmt;
use std::sync::OnceLock;
use tracing::warn;

use crate::api::LlmProvider;
use crate::core::config::Config;

#[derive(Debug, Deserialize)]
struct BuiltinProvidersConfig {
    providers: Vec<LlmProvider>,
}

/// Built-in providers from the embedded table.
pub fn load_builtin_providers() -> &'static [LlmProvider] {
    const CONFIG_CONTENT: &str = include_str!("../builtin_providers.toml");
    static PROVIDERS: OnceLock<Vec<LlmProvider>> = OnceLock::new();

    PROVIDERS.get_or_init(|| match toml::from_str::<BuiltinProvidersConfig>(CONFIG_CONTENT) {
        Ok(config) => config.providers,
        Err(err) => {
            warn!(error = %err, "Failed to parse builtin_providers.toml");
            Vec::new()
        }
    })
}

/// Find a built-in provider by model (case-insensitive)
pub fn find_builtin_provider(model: &str) -> Option<&'static LlmProvider> {
    load_builtin_providers()
        .iter()
        .find(|p| p.model.eq_ignore_ascii_case(model))
}

#[derive(Clone, Debug, Default)]
pub struct ProviderTable {
    providers: Vec<LlmProvider>,
}

impl ProviderTable {
    /// Built-ins first; a configured provider with the same model replaces
    /// the built-in entry in place.
    pub fn from_config(config: &Config) -> Self {
        let mut providers = load_builtin_providers().to_vec();
        for custom in &config.custom_providers {
            match providers
                .iter_mut()
                .find(|p| p.model.eq_ignore_ascii_case(&custom.model))
            {
                Some(existing) => *existing = custom.clone(),
                None => providers.push(custom.clone()),
            }
        }
        Self { providers }
    }

    pub fn providers(&self) -> &[LlmProvider] {
        &self.providers
    }

    pub fn find(&self, model: &str) -> Option<&LlmProvider> {
        self.providers
            .iter()
            .find(|p| p.model.eq_ignore_ascii_case(model))
    }

    /// The requested model, else the configured default, else the first
    /// provider in the table.
    pub fn resolve(
        &self,
        requested: Option<&str>,
        config: &Config,
    ) -> Result<&LlmProvider, UnknownModelError> {
        if let Some(model) = requested.or(config.default_model.as_deref()) {
            return self.find(model).ok_or_else(|| UnknownModelError {
                model: model.to_string(),
            });
        }
        self.providers.first().ok_or_else(|| UnknownModelError {
            model: String::new(),
        })
    }
}

#[derive(Debug)]
pub struct UnknownModelError {
    model: String,
}

impl fmt::Display for UnknownModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.model.is_empty() {
            write!(f, "No providers are configured")
        } else {
            write!(
                f,
                "Unknown model '{}'. Run 'chatpane providers' to list available models.",
                self.model
            )
        }
    }
}

impl std::error::Error for UnknownModelError {}
