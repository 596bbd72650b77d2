//! Chat history: finished conversations kept as a JSON list.

use std::error::Error;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::api::{LlmProvider, Token};
use crate::core::config::path_display;
use crate::render::dom::collect_text;
use crate::render::sanitize::sanitize_fragment;
use crate::render::{render_markdown_to_html, PlainHighlighter};

/// Characters of the last message used to build an item's title.
pub const TITLE_PREFIX_CHARS: usize = 30;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryItem {
    /// Milliseconds since the Unix epoch at creation.
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub text: String,
    pub token_history: Vec<Token>,
    pub llm_provider: LlmProvider,
}

/// Receives finished conversations.
pub trait HistorySink {
    fn add_item(&mut self, item: ChatHistoryItem);
}

#[derive(Debug)]
pub enum HistoryError {
    Io { path: PathBuf, source: std::io::Error },
    Json(serde_json::Error),
    NotAnArray,
    InvalidItem { index: usize },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::Io { path, source } => {
                write!(f, "Failed to access history at {}: {}", path_display(path), source)
            }
            HistoryError::Json(source) => write!(f, "Invalid file format: {source}"),
            HistoryError::NotAnArray => {
                write!(f, "Invalid file format: Imported data is not an array")
            }
            HistoryError::InvalidItem { index } => {
                write!(f, "Invalid file format: Invalid item at index {index}")
            }
        }
    }
}

impl Error for HistoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HistoryError::Io { source, .. } => Some(source),
            HistoryError::Json(source) => Some(source),
            HistoryError::NotAnArray | HistoryError::InvalidItem { .. } => None,
        }
    }
}

/// In-memory history list, newest last.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatHistory {
    items: Vec<ChatHistoryItem>,
}

impl HistorySink for ChatHistory {
    fn add_item(&mut self, item: ChatHistoryItem) {
        self.items.push(item);
    }
}

impl ChatHistory {
    pub fn items(&self) -> &[ChatHistoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn export_json(&self) -> Result<String, HistoryError> {
        serde_json::to_string_pretty(&self.items).map_err(HistoryError::Json)
    }

    /// Replaces the list with `json`. Nothing changes unless every item is
    /// valid.
    pub fn import_json(&mut self, json: &str) -> Result<(), HistoryError> {
        let value: Value = serde_json::from_str(json).map_err(HistoryError::Json)?;
        let Value::Array(entries) = value else {
            return Err(HistoryError::NotAnArray);
        };

        let mut items = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            if !is_valid_item(&entry) {
                return Err(HistoryError::InvalidItem { index });
            }
            let item = serde_json::from_value(entry)
                .map_err(|_| HistoryError::InvalidItem { index })?;
            items.push(item);
        }
        debug!(items = items.len(), "Imported chat history");
        self.items = items;
        Ok(())
    }

    /// Loads a history file; a missing file is an empty history.
    pub fn load(path: &Path) -> Result<Self, HistoryError> {
        let mut history = Self::default();
        if !path.exists() {
            return Ok(history);
        }
        let contents = fs::read_to_string(path).map_err(|source| HistoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        history.import_json(&contents)?;
        Ok(history)
    }

    pub fn save(&self, path: &Path) -> Result<(), HistoryError> {
        let io_err = |source| HistoryError::Io {
            path: path.to_path_buf(),
            source,
        };
        let contents = self.export_json()?;
        let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(io_err)?;
        temp_file.write_all(contents.as_bytes()).map_err(io_err)?;
        temp_file.as_file_mut().sync_all().map_err(io_err)?;
        temp_file.persist(path).map_err(|err| io_err(err.error))?;
        Ok(())
    }
}

fn is_valid_item(item: &Value) -> bool {
    item.get("id").is_some_and(Value::is_number)
        && item.get("text").is_some_and(Value::is_string)
        && item
            .get("tokenHistory")
            .and_then(Value::as_array)
            .is_some_and(|tokens| tokens.iter().all(is_valid_token))
        && item.get("llmProvider").is_some_and(is_valid_provider)
}

fn is_valid_token(token: &Value) -> bool {
    token.get("role").is_some_and(Value::is_string)
        && token.get("content").is_some_and(Value::is_string)
        && token.get("llmInfo").is_some_and(is_valid_provider)
}

fn is_valid_provider(provider: &Value) -> bool {
    [
        "model",
        "provider",
        "title",
        "icon",
        "subtitle",
        "systemMessage",
        "apiKeyName",
    ]
    .iter()
    .all(|field| provider.get(field).is_some_and(Value::is_string))
}

/// Plain-text title for a message: its first characters rendered as
/// markdown with the markup stripped.
pub fn derive_title(content: &str) -> String {
    let prefix: String = content.chars().take(TITLE_PREFIX_CHARS).collect();
    let html = render_markdown_to_html(&prefix, Arc::new(PlainHighlighter));
    let mut title = String::new();
    collect_text(&sanitize_fragment(&html), &mut title);
    title.trim().to_string()
}

/// Files the conversation into `sink`, titled after its last message.
/// Returns false when there is nothing to store.
pub fn store_token_history(
    tokens: &[Token],
    sink: &mut dyn HistorySink,
    provider: &LlmProvider,
) -> bool {
    let Some(last) = tokens.last() else {
        return false;
    };
    let now = Utc::now();
    sink.add_item(ChatHistoryItem {
        id: now.timestamp_millis(),
        created_at: Some(now),
        text: derive_title(&last.content),
        token_history: tokens.to_vec(),
        llm_provider: provider.clone(),
    });
    true
}
