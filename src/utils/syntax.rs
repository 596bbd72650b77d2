use crate::render::markdown::{escape_html, Highlighter};
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, OnceLock, PoisonError};
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

// Simple FIFO cache (bounded) for highlighted blocks
// key = (lang_norm, hash)

const DEFAULT_CACHE_CAPACITY: usize = 64;

fn hash_code(lang: &str, code: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    lang.hash(&mut hasher);
    code.hash(&mut hasher);
    hasher.finish()
}

struct SimpleCache {
    map: HashMap<(String, u64), String>,
    order: VecDeque<(String, u64)>,
    cap: usize,
}

impl SimpleCache {
    fn new(cap: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            cap,
        }
    }
    fn get(&self, k: &(String, u64)) -> Option<String> {
        self.map.get(k).cloned()
    }
    fn put(&mut self, k: (String, u64), v: String) {
        if !self.map.contains_key(&k) {
            self.order.push_back(k.clone());
        }
        self.map.insert(k, v);
        while self.map.len() > self.cap {
            if let Some(old) = self.order.pop_front() {
                self.map.remove(&old);
            } else {
                break;
            }
        }
    }
    fn len(&self) -> usize {
        self.map.len()
    }
}

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

pub(crate) fn normalize_lang_hint(s: &str) -> String {
    let t = s.trim().to_ascii_lowercase();
    match t.as_str() {
        "py" | "python" => "python".into(),
        "bash" | "sh" | "zsh" | "shell" => "bash".into(),
        "js" | "javascript" | "jsx" => "javascript".into(),
        "ts" | "tsx" | "typescript" => "typescript".into(),
        "json" => "json".into(),
        "toml" => "toml".into(),
        "yaml" | "yml" => "yaml".into(),
        "rust" | "rs" => "rust".into(),
        "go" => "go".into(),
        "c" | "h" => "c".into(),
        "cpp" | "cc" | "cxx" | "hpp" | "hxx" => "cpp".into(),
        "java" => "java".into(),
        "kotlin" | "kt" => "kotlin".into(),
        "swift" => "swift".into(),
        "html" | "svelte" => "html".into(),
        "css" => "css".into(),
        "sql" => "sql".into(),
        "plaintext" | "text" | "txt" => "txt".into(),
        other => other.into(),
    }
}

/// syntect-backed highlighter emitting class-based spans.
///
/// Every streamed chunk re-renders all committed code blocks, so
/// highlighted output is cached per (language, code).
pub struct SyntectHighlighter {
    cache: Mutex<SimpleCache>,
}

impl Default for SyntectHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntectHighlighter {
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(cap: usize) -> Self {
        Self {
            cache: Mutex::new(SimpleCache::new(cap)),
        }
    }

    fn find_syntax(&self, language: &str) -> Option<&'static SyntaxReference> {
        let lang_norm = normalize_lang_hint(language);
        if lang_norm.is_empty() {
            return None;
        }
        syntax_set().find_syntax_by_token(&lang_norm)
    }

    #[cfg(test)]
    fn cached_blocks(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Highlighter for SyntectHighlighter {
    fn supports_language(&self, language: &str) -> bool {
        self.find_syntax(language).is_some()
    }

    fn highlight(&self, code: &str, language: &str) -> String {
        let lang_norm = normalize_lang_hint(language);
        let key = (lang_norm.clone(), hash_code(&lang_norm, code));
        if let Some(html) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return html;
        }

        let ps = syntax_set();
        let syntax = self
            .find_syntax(language)
            .unwrap_or_else(|| ps.find_syntax_plain_text());

        let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, ps, ClassStyle::Spaced);
        for line in LinesWithEndings::from(code) {
            if let Err(err) = generator.parse_html_for_line_which_includes_newline(line) {
                tracing::debug!(language = %lang_norm, error = %err, "Highlighting failed; rendering plain");
                return escape_html(code);
            }
        }
        let html = generator.finalize();

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, html.clone());
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lang_hint_maps_common_aliases() {
        assert_eq!(normalize_lang_hint("py"), "python");
        assert_eq!(normalize_lang_hint("JS"), "javascript");
        assert_eq!(normalize_lang_hint("TsX"), "typescript");
        assert_eq!(normalize_lang_hint("yml"), "yaml");
        assert_eq!(normalize_lang_hint("hpp"), "cpp");
        assert_eq!(normalize_lang_hint("rs"), "rust");
        assert_eq!(normalize_lang_hint("plaintext"), "txt");
    }

    #[test]
    fn knows_default_grammars() {
        let highlighter = SyntectHighlighter::new();
        assert!(highlighter.supports_language("py"));
        assert!(highlighter.supports_language("rust"));
        assert!(highlighter.supports_language("plaintext"));
        assert!(!highlighter.supports_language("definitely-not-a-language"));
        assert!(!highlighter.supports_language(""));
    }

    #[test]
    fn highlighted_output_is_escaped_markup() {
        let highlighter = SyntectHighlighter::new();
        let html = highlighter.highlight("if a < b:\n    print(\"<x>\")\n", "py");
        assert!(html.contains("<span class=\""));
        assert!(html.contains("&lt;"));
        assert!(!html.contains("<x>"));
    }

    #[test]
    fn repeated_blocks_hit_the_cache() {
        let highlighter = SyntectHighlighter::with_cache_capacity(2);
        let first = highlighter.highlight("let x = 1;", "rust");
        let second = highlighter.highlight("let x = 1;", "rs");
        assert_eq!(first, second);
        assert_eq!(highlighter.cached_blocks(), 1);

        highlighter.highlight("a", "rust");
        highlighter.highlight("b", "rust");
        assert_eq!(highlighter.cached_blocks(), 2);
    }
}
