//! Incremental renderer that paints a live response into a container.
//!
//! Every chunk rebuilds the container from the full fragment list.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::cursor::{cursor_stylesheet, BlinkTimer, DEFAULT_BLINK_INTERVAL};
use super::dom::{place_after_last_char, ContainerHandle, Node};
use super::fragments::{ContentFragment, FragmentBuffer};
use super::markdown::{CodeBlockStyle, Highlighter, MarkdownCompiler};
use super::sanitize::sanitize_fragment;

const STREAM_ID_ATTR: &str = "data-stream-id";

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Debug)]
pub struct RendererOptions {
    /// Show the blinking insertion cursor while streaming.
    pub cursor: bool,
    pub code_style: CodeBlockStyle,
    pub blink_interval: Duration,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            cursor: true,
            code_style: CodeBlockStyle::Inline,
            blink_interval: DEFAULT_BLINK_INTERVAL,
        }
    }
}

impl RendererOptions {
    pub fn without_cursor(mut self) -> Self {
        self.cursor = false;
        self
    }

    pub fn with_code_style(mut self, code_style: CodeBlockStyle) -> Self {
        self.code_style = code_style;
        self
    }

    pub fn with_blink_interval(mut self, blink_interval: Duration) -> Self {
        self.blink_interval = blink_interval;
        self
    }
}

type CompletionCallback = Box<dyn FnOnce() + Send>;

pub struct StreamRenderer {
    container: ContainerHandle,
    buffer: FragmentBuffer,
    compiler: MarkdownCompiler,
    options: RendererOptions,
    style_id: Option<String>,
    blink: Option<BlinkTimer>,
    cursor_visible: Arc<AtomicBool>,
    completed: bool,
    on_complete: Option<CompletionCallback>,
}

impl fmt::Debug for StreamRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamRenderer")
            .field("buffer", &self.buffer)
            .field("options", &self.options)
            .field("style_id", &self.style_id)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

impl StreamRenderer {
    /// Binds a renderer to `container` and acquires its cursor resources:
    /// a scoped style sheet and, inside a tokio runtime, the blink task.
    pub fn new(
        container: ContainerHandle,
        highlighter: Arc<dyn Highlighter>,
        options: RendererOptions,
    ) -> Self {
        let lookup = Arc::clone(&highlighter);
        let buffer = FragmentBuffer::with_language_check(move |tag| lookup.supports_language(tag));
        let compiler = MarkdownCompiler::new(highlighter).with_code_style(options.code_style);
        let cursor_visible = Arc::new(AtomicBool::new(true));

        let mut style_id = None;
        let mut blink = None;
        if options.cursor {
            let stream_id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed).to_string();
            let id = format!("stream-cursor-{stream_id}");
            {
                let mut target = container.lock();
                target.set_attribute(STREAM_ID_ATTR, stream_id.as_str());
                target.attach_style(id.as_str(), cursor_stylesheet(&stream_id));
            }
            style_id = Some(id);

            blink = BlinkTimer::start(
                container.clone(),
                Arc::clone(&cursor_visible),
                options.blink_interval,
            );
            if blink.is_none() {
                debug!(container = %container.lock().id(), "No async runtime; cursor will not blink");
            }
        }

        Self {
            container,
            buffer,
            compiler,
            options,
            style_id,
            blink,
            cursor_visible,
            completed: false,
            on_complete: None,
        }
    }

    pub fn container(&self) -> &ContainerHandle {
        &self.container
    }

    pub fn fragments(&self) -> &[ContentFragment] {
        self.buffer.fragments()
    }

    pub fn is_animation_completed(&self) -> bool {
        self.completed
    }

    /// Registers the callback fired once from [`StreamRenderer::finish`].
    pub fn set_on_complete_callback(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    pub fn process_chunk(&mut self, chunk: &str) {
        if self.completed {
            warn!(
                container = %self.container.lock().id(),
                "Chunk received after the response was finished; ignoring"
            );
            return;
        }
        self.buffer.push(chunk);
        self.render(self.options.cursor);
    }

    pub fn finish(&mut self) {
        if self.completed {
            warn!(container = %self.container.lock().id(), "finish called twice; ignoring");
            return;
        }
        self.finalize();
        if let Some(callback) = self.on_complete.take() {
            callback();
        }
    }

    /// Stops a response early with the same cleanup as [`StreamRenderer::finish`]
    /// but without firing the completion callback.
    pub fn cancel(&mut self) {
        if self.completed {
            return;
        }
        debug!(container = %self.container.lock().id(), "Cancelling stream render");
        self.finalize();
        self.on_complete = None;
    }

    fn finalize(&mut self) {
        if let Some(blink) = self.blink.take() {
            blink.stop();
        }
        self.buffer.finish();
        self.render(false);
        if let Some(style_id) = self.style_id.take() {
            let mut target = self.container.lock();
            target.detach_style(&style_id);
            target.remove_attribute(STREAM_ID_ATTR);
        }
        self.completed = true;
    }

    fn render(&self, with_cursor: bool) {
        let mut nodes = Vec::new();
        for fragment in self.buffer.fragments() {
            nodes.extend(self.paint(fragment));
        }
        if let Some(live) = self.buffer.live_fragment() {
            nodes.extend(self.paint(&live));
        }

        let mut target = self.container.lock();
        if with_cursor {
            let cursor = Node::cursor(self.cursor_visible.load(Ordering::Acquire));
            if let Err(cursor) = place_after_last_char(&mut nodes, cursor) {
                nodes.push(cursor);
            }
        }
        target.replace_children(nodes);
        target.scroll_to_end();
    }

    fn paint(&self, fragment: &ContentFragment) -> Vec<Node> {
        sanitize_fragment(&self.compiler.render_fragment(fragment))
    }
}

impl Drop for StreamRenderer {
    fn drop(&mut self) {
        if !self.completed {
            self.cancel();
        }
    }
}

/// Renders `content` in one pass and returns the resulting markup.
pub fn render_markdown_to_html(content: &str, highlighter: Arc<dyn Highlighter>) -> String {
    let container = ContainerHandle::new("render");
    print_message(&container, content, highlighter, RendererOptions::default().without_cursor());
    container.inner_html()
}

/// Paints a complete, non-streamed message into `container`.
pub fn print_message(
    container: &ContainerHandle,
    content: &str,
    highlighter: Arc<dyn Highlighter>,
    options: RendererOptions,
) {
    let mut renderer = StreamRenderer::new(container.clone(), highlighter, options);
    renderer.process_chunk(content);
    renderer.finish();
}
