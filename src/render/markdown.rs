use std::sync::Arc;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};

use super::fragments::{ContentFragment, FALLBACK_LANGUAGE};

/// Syntax highlighting collaborator used for fenced code.
pub trait Highlighter: Send + Sync {
    /// Whether a grammar is registered for `language`.
    fn supports_language(&self, language: &str) -> bool;

    /// Returns highlighted, HTML-escaped markup for `code`.
    fn highlight(&self, code: &str, language: &str) -> String;
}

/// Highlighter with no registered languages; everything renders plain.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainHighlighter;

impl Highlighter for PlainHighlighter {
    fn supports_language(&self, _language: &str) -> bool {
        false
    }

    fn highlight(&self, code: &str, _language: &str) -> String {
        escape_html(code)
    }
}

/// How code fragments are painted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CodeBlockStyle {
    /// Bare `<pre><code>` markup.
    #[default]
    Inline,
    /// A code component with a language header and a copy button.
    Component,
}

impl CodeBlockStyle {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Some(Self::Inline),
            "component" => Some(Self::Component),
            _ => None,
        }
    }
}

/// Markdown to HTML compiler with pluggable code highlighting.
#[derive(Clone)]
pub struct MarkdownCompiler {
    highlighter: Arc<dyn Highlighter>,
    code_style: CodeBlockStyle,
}

impl MarkdownCompiler {
    pub fn new(highlighter: Arc<dyn Highlighter>) -> Self {
        Self {
            highlighter,
            code_style: CodeBlockStyle::Inline,
        }
    }

    pub fn with_code_style(mut self, code_style: CodeBlockStyle) -> Self {
        self.code_style = code_style;
        self
    }

    pub fn render_fragment(&self, fragment: &ContentFragment) -> String {
        match fragment {
            ContentFragment::Text { content } => self.render_text(content),
            ContentFragment::Code { content, language } => self.render_code(content, language),
        }
    }

    /// Renders a markdown span. Soft breaks become `<br />` so chat replies
    /// keep their line structure.
    pub fn render_text(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut events: Vec<Event<'_>> = Vec::new();
        let mut code_block: Option<(String, String)> = None;

        for event in Parser::new_ext(markdown, options) {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let language = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .unwrap_or_default()
                            .to_string(),
                        CodeBlockKind::Indented => String::new(),
                    };
                    code_block = Some((language, String::new()));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((language, code)) = code_block.take() {
                        let html = self.render_code(code.trim_end_matches('\n'), &language);
                        events.push(Event::Html(CowStr::from(html)));
                    }
                }
                Event::Text(text) if code_block.is_some() => {
                    if let Some((_, code)) = code_block.as_mut() {
                        code.push_str(&text);
                    }
                }
                Event::SoftBreak => events.push(Event::HardBreak),
                other => events.push(other),
            }
        }

        let mut html = String::with_capacity(markdown.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut html, events.into_iter());
        html
    }

    /// Renders a code block, falling back to escaped plain text when the
    /// language has no registered grammar.
    pub fn render_code(&self, code: &str, language: &str) -> String {
        let language = language.trim();
        let (language, body) = if !language.is_empty() && self.highlighter.supports_language(language)
        {
            (language, self.highlighter.highlight(code, language))
        } else {
            (FALLBACK_LANGUAGE, escape_html(code))
        };
        let language = escape_html(language);

        let block = format!(
            "<pre><code class=\"hljs language-{language}\" data-highlighted=\"true\">{body}</code></pre>"
        );
        match self.code_style {
            CodeBlockStyle::Inline => block,
            CodeBlockStyle::Component => format!(
                "<div class=\"code-block\" data-language=\"{language}\">\
                 <div class=\"code-block-header\">\
                 <span class=\"code-block-language\">{language}</span>\
                 <button class=\"code-block-copy\" type=\"button\">Copy</button>\
                 </div>{block}</div>"
            ),
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RustOnly;

    impl Highlighter for RustOnly {
        fn supports_language(&self, language: &str) -> bool {
            language == "rust"
        }

        fn highlight(&self, code: &str, _language: &str) -> String {
            format!("<span class=\"hl\">{}</span>", escape_html(code))
        }
    }

    fn compiler() -> MarkdownCompiler {
        MarkdownCompiler::new(Arc::new(RustOnly))
    }

    #[test]
    fn renders_common_prose_constructs() {
        let html = compiler().render_text(
            "# Title\n\nSome **bold**, *em*, `code` and [a link](https://example.com).\n\n- one\n- two\n",
        );
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>em</em>"));
        assert!(html.contains("<code>code</code>"));
        assert!(html.contains("<a href=\"https://example.com\">a link</a>"));
        assert!(html.contains("<li>one</li>"));
    }

    #[test]
    fn soft_breaks_render_as_line_breaks() {
        let html = compiler().render_text("first line\nsecond line");
        assert_eq!(html, "<p>first line<br />\nsecond line</p>\n");
    }

    #[test]
    fn fenced_code_goes_through_the_highlighter() {
        let html = compiler().render_text("```rust\nfn main() {}\n```\n");
        assert_eq!(
            html,
            "<pre><code class=\"hljs language-rust\" data-highlighted=\"true\"><span class=\"hl\">fn main() {}</span></code></pre>"
        );
    }

    #[test]
    fn unknown_language_falls_back_to_plaintext() {
        let html = compiler().render_code("<b>x</b>", "brainfuck");
        assert_eq!(
            html,
            "<pre><code class=\"hljs language-plaintext\" data-highlighted=\"true\">&lt;b&gt;x&lt;/b&gt;</code></pre>"
        );
    }

    #[test]
    fn component_style_wraps_code_with_header() {
        let html = compiler()
            .with_code_style(CodeBlockStyle::Component)
            .render_code("let x = 1;", "rust");
        assert!(html.starts_with("<div class=\"code-block\" data-language=\"rust\">"));
        assert!(html.contains("<span class=\"code-block-language\">rust</span>"));
        assert!(html.contains("<span class=\"hl\">let x = 1;</span>"));
    }

    #[test]
    fn malformed_markdown_still_renders() {
        let html = compiler().render_text("**unbalanced _markers <tag");
        assert!(html.contains("**unbalanced"));
    }

    #[test]
    fn output_is_deterministic() {
        let input = "Hello **world**\n\n```rust\nlet a = 1;\n```";
        assert_eq!(compiler().render_text(input), compiler().render_text(input));
    }

    #[test]
    fn parses_code_block_styles() {
        assert_eq!(CodeBlockStyle::parse("Component"), Some(CodeBlockStyle::Component));
        assert_eq!(CodeBlockStyle::parse("inline"), Some(CodeBlockStyle::Inline));
        assert_eq!(CodeBlockStyle::parse("fancy"), None);
    }
}
