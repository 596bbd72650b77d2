//! Chunk accumulation and the fenced-code state machine.
//!
//! Incoming chunks are split into lines before any fence test, so a fence
//! split across chunks (or a run of backticks inside a token) can never
//! flip the state early. Feeding the same text in any chunking produces the
//! same fragments once [`FragmentBuffer::finish`] has run.

use std::fmt;

pub const FENCE: &str = "```";
pub const FALLBACK_LANGUAGE: &str = "plaintext";

/// A committed unit of rendered output, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentFragment {
    Text { content: String },
    Code { content: String, language: String },
}

impl ContentFragment {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn code(content: impl Into<String>, language: impl Into<String>) -> Self {
        Self::Code {
            content: content.into(),
            language: language.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParserState {
    pub inside_code_block: bool,
    pub pending_language: String,
    pub pending_text_buffer: String,
    pub pending_code_buffer: String,
}

type LanguageCheck = Box<dyn Fn(&str) -> bool + Send + Sync>;

pub struct FragmentBuffer {
    state: ParserState,
    partial_line: String,
    fragments: Vec<ContentFragment>,
    finished: bool,
    language_check: LanguageCheck,
}

impl fmt::Debug for FragmentBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentBuffer")
            .field("state", &self.state)
            .field("partial_line", &self.partial_line)
            .field("fragments", &self.fragments)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Default for FragmentBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentBuffer {
    /// Buffer that accepts any non-empty language tag.
    pub fn new() -> Self {
        Self::with_language_check(|_| true)
    }

    /// Buffer that maps tags rejected by `check` to [`FALLBACK_LANGUAGE`].
    pub fn with_language_check(check: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            state: ParserState::default(),
            partial_line: String::new(),
            fragments: Vec::new(),
            finished: false,
            language_check: Box::new(check),
        }
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    pub fn fragments(&self) -> &[ContentFragment] {
        &self.fragments
    }

    pub fn into_fragments(self) -> Vec<ContentFragment> {
        self.fragments
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn push(&mut self, chunk: &str) {
        if self.finished || chunk.is_empty() {
            return;
        }
        let mut buffered = std::mem::take(&mut self.partial_line);
        buffered.push_str(chunk);

        let mut rest = buffered.as_str();
        while let Some(newline) = rest.find('\n') {
            let (line, tail) = rest.split_at(newline + 1);
            self.consume_line(line);
            rest = tail;
        }
        self.partial_line = rest.to_string();
    }

    /// Flushes the trailing partial line and commits whatever is pending.
    /// An open code block is committed as-is.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        let last_line = std::mem::take(&mut self.partial_line);
        if !last_line.is_empty() {
            self.consume_line(&last_line);
        }
        if self.state.inside_code_block {
            self.commit_code();
        } else {
            self.commit_text();
        }
        self.finished = true;
    }

    /// Content received but not yet committed, for live display.
    ///
    /// A trailing partial line that may still turn into a fence is held back.
    pub fn live_fragment(&self) -> Option<ContentFragment> {
        if self.finished {
            return None;
        }
        let partial = if could_become_fence(&self.partial_line) {
            ""
        } else {
            self.partial_line.as_str()
        };

        if self.state.inside_code_block {
            let mut code = self.state.pending_code_buffer.clone();
            code.push_str(partial);
            Some(ContentFragment::code(
                trim_blank_lines(&code),
                self.state.pending_language.clone(),
            ))
        } else {
            let mut text = self.state.pending_text_buffer.clone();
            text.push_str(partial);
            if text.trim().is_empty() {
                None
            } else {
                Some(ContentFragment::text(text))
            }
        }
    }

    fn consume_line(&mut self, line: &str) {
        let fence_info = fence_info(line);
        if self.state.inside_code_block {
            match fence_info {
                Some(info) if info.trim().is_empty() => {
                    self.commit_code();
                    self.state.inside_code_block = false;
                }
                _ => self.state.pending_code_buffer.push_str(line),
            }
        } else {
            match fence_info {
                Some(info) => {
                    self.commit_text();
                    self.state.pending_language = self.resolve_language(info);
                    self.state.inside_code_block = true;
                }
                None => self.state.pending_text_buffer.push_str(line),
            }
        }
    }

    fn resolve_language(&self, info: &str) -> String {
        match info.split_whitespace().next() {
            Some(tag) if (self.language_check)(tag) => tag.to_string(),
            _ => FALLBACK_LANGUAGE.to_string(),
        }
    }

    fn commit_text(&mut self) {
        let text = std::mem::take(&mut self.state.pending_text_buffer);
        if !text.trim().is_empty() {
            self.fragments.push(ContentFragment::Text { content: text });
        }
    }

    fn commit_code(&mut self) {
        let code = std::mem::take(&mut self.state.pending_code_buffer);
        let language = std::mem::take(&mut self.state.pending_language);
        let language = if language.is_empty() {
            FALLBACK_LANGUAGE.to_string()
        } else {
            language
        };
        self.fragments.push(ContentFragment::Code {
            content: trim_blank_lines(&code),
            language,
        });
    }
}

/// Returns the info string when `line` is a fence line.
///
/// A fence is three or more backticks after at most three spaces of
/// indentation.
fn fence_info(line: &str) -> Option<&str> {
    let line = line.trim_end_matches(['\n', '\r']);
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = line[indent..].strip_prefix(FENCE)?;
    Some(rest.trim_start_matches('`'))
}

fn could_become_fence(partial: &str) -> bool {
    let trimmed = partial.trim_start_matches(' ');
    if trimmed.is_empty() || partial.len() - trimmed.len() > 3 {
        return false;
    }
    FENCE.starts_with(trimmed) || trimmed.starts_with(FENCE)
}

/// Drops blank lines at both ends; inner lines keep their indentation.
fn trim_blank_lines(code: &str) -> String {
    let lines: Vec<&str> = code.lines().collect();
    let Some(start) = lines.iter().position(|line| !line.trim().is_empty()) else {
        return String::new();
    };
    let end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .unwrap_or(start);
    lines[start..=end].join("\n")
}
