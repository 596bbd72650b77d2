use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::LlmProvider;
use crate::render::{CodeBlockStyle, RendererOptions};
use crate::transport::http::DEFAULT_SERVER_URL;
use crate::transport::{DriverOptions, RetryPolicy};

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Backend chat endpoint (defaults to the local server)
    pub server_url: Option<String>,
    /// Model used by `chat` when none is given on the command line
    pub default_model: Option<String>,
    /// Show the blinking cursor while a reply streams in
    pub cursor: Option<bool>,
    /// "inline" or "component"
    pub code_style: Option<String>,
    pub blink_interval_ms: Option<u64>,
    pub scroll_throttle_ms: Option<u64>,
    pub engine_max_attempts: Option<u32>,
    #[serde(default)]
    pub custom_providers: Vec<LlmProvider>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    pub fn server_url(&self) -> &str {
        self.server_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn code_block_style(&self) -> CodeBlockStyle {
        self.code_style
            .as_deref()
            .and_then(CodeBlockStyle::parse)
            .unwrap_or_default()
    }

    pub fn renderer_options(&self) -> RendererOptions {
        let mut options = RendererOptions::default().with_code_style(self.code_block_style());
        if !self.cursor.unwrap_or(true) {
            options = options.without_cursor();
        }
        if let Some(ms) = self.blink_interval_ms {
            options = options.with_blink_interval(Duration::from_millis(ms));
        }
        options
    }

    pub fn driver_options(&self) -> DriverOptions {
        let mut options = DriverOptions::default();
        if let Some(ms) = self.scroll_throttle_ms {
            options.scroll_throttle = Duration::from_millis(ms);
        }
        options
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.engine_max_attempts
            .map(|max_attempts| RetryPolicy { max_attempts })
            .unwrap_or_default()
    }

    /// Adds a provider, replacing any existing one for the same model.
    pub fn add_custom_provider(&mut self, provider: LlmProvider) {
        self.remove_custom_provider(&provider.model);
        self.custom_providers.push(provider);
    }

    pub fn remove_custom_provider(&mut self, model: &str) -> bool {
        let before = self.custom_providers.len();
        self.custom_providers
            .retain(|p| !p.model.eq_ignore_ascii_case(model));
        self.custom_providers.len() != before
    }

    pub fn get_custom_provider(&self, model: &str) -> Option<&LlmProvider> {
        self.custom_providers
            .iter()
            .find(|p| p.model.eq_ignore_ascii_case(model))
    }
}
