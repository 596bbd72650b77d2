//! Owned node tree standing in for the browser DOM.
//!
//! The renderer paints into a [`Container`], which hosts element/text
//! children, a small style area for component-scoped style rules, and a
//! scroll request counter. Hosts read the result back with
//! [`Container::inner_html`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const CURSOR_CLASS: &str = "blinking-cursor";
pub const CURSOR_GLYPH: &str = "▋";
/// Marks the renderer's own cursor. The sanitizer strips it from content.
pub const CURSOR_MARKER_ATTR: &str = "data-stream-cursor";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta",
    "param", "source", "track", "wbr",
];

// Children of these HTML elements are serialized verbatim; the parser does
// not decode entities inside them. In SVG or MathML the same names are
// ordinary elements and their text is escaped.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style", "script", "xmp", "iframe", "noembed", "noframes", "noscript",
];

/// Namespace an element was parsed into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
    MathMl,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub namespace: Namespace,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            namespace: Namespace::Html,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn is_void(&self) -> bool {
        self.namespace == Namespace::Html && VOID_ELEMENTS.contains(&self.tag.as_str())
    }

    pub fn is_raw_text(&self) -> bool {
        self.namespace == Namespace::Html && RAW_TEXT_ELEMENTS.contains(&self.tag.as_str())
    }

    pub fn is_cursor(&self) -> bool {
        self.attr(CURSOR_MARKER_ATTR).is_some()
    }
}

impl Node {
    pub fn text(content: impl Into<String>) -> Self {
        Node::Text(content.into())
    }

    pub fn is_cursor(&self) -> bool {
        matches!(self, Node::Element(el) if el.is_cursor())
    }

    /// Builds the cursor marker element.
    pub fn cursor(visible: bool) -> Self {
        Node::Element(
            Element::new("span")
                .with_attr("class", CURSOR_CLASS)
                .with_attr(CURSOR_MARKER_ATTR, "")
                .with_attr("data-visible", if visible { "true" } else { "false" })
                .with_child(Node::text(CURSOR_GLYPH)),
        )
    }
}

/// A style rule set owned by a component mounted in the container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleSheet {
    pub id: String,
    pub css: String,
}

/// Target element the renderer paints into.
#[derive(Clone, Debug, Default)]
pub struct Container {
    id: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
    styles: Vec<StyleSheet>,
    scroll_requests: u64,
}

impl Container {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn replace_children(&mut self, children: Vec<Node>) {
        self.children = children;
    }

    pub fn append(&mut self, node: Node) {
        self.children.push(node);
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.attrs.retain(|(key, _)| key != name);
    }

    pub fn styles(&self) -> &[StyleSheet] {
        &self.styles
    }

    /// Attaches a style sheet, replacing any existing sheet with the same id.
    pub fn attach_style(&mut self, id: impl Into<String>, css: impl Into<String>) {
        let sheet = StyleSheet {
            id: id.into(),
            css: css.into(),
        };
        self.styles.retain(|existing| existing.id != sheet.id);
        self.styles.push(sheet);
    }

    /// Returns true when a sheet with `id` was attached.
    pub fn detach_style(&mut self, id: &str) -> bool {
        let before = self.styles.len();
        self.styles.retain(|sheet| sheet.id != id);
        before != self.styles.len()
    }

    pub fn scroll_to_end(&mut self) {
        self.scroll_requests += 1;
    }

    pub fn scroll_requests(&self) -> u64 {
        self.scroll_requests
    }

    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        serialize_nodes(&self.children, false, &mut out);
        out
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    pub fn cursor_count(&self) -> usize {
        count_cursors(&self.children)
    }

    /// Flips the `data-visible` attribute on every cursor marker.
    pub fn set_cursor_visible(&mut self, visible: bool) {
        set_cursor_visibility(&mut self.children, visible);
    }
}

/// Shared handle to a container, cloned into the renderer's blink task.
#[derive(Clone, Debug, Default)]
pub struct ContainerHandle(Arc<Mutex<Container>>);

impl ContainerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::new(Mutex::new(Container::new(id))))
    }

    pub fn lock(&self) -> MutexGuard<'_, Container> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn inner_html(&self) -> String {
        self.lock().inner_html()
    }
}

impl From<Container> for ContainerHandle {
    fn from(container: Container) -> Self {
        Self(Arc::new(Mutex::new(container)))
    }
}

/// Inserts `cursor` right after the last non-whitespace character in `nodes`.
///
/// A trailing text node is split so the cursor ends up as a sibling of text,
/// never inside it. Hands the cursor back when there is no text at all.
pub fn place_after_last_char(nodes: &mut Vec<Node>, cursor: Node) -> Result<(), Node> {
    let mut cursor = cursor;
    for index in (0..nodes.len()).rev() {
        match &mut nodes[index] {
            Node::Element(el) => {
                if el.is_void() {
                    continue;
                }
                match place_after_last_char(&mut el.children, cursor) {
                    Ok(()) => return Ok(()),
                    Err(returned) => cursor = returned,
                }
            }
            Node::Text(text) => {
                let Some(end) = text
                    .char_indices()
                    .rev()
                    .find(|(_, ch)| !ch.is_whitespace())
                    .map(|(pos, ch)| pos + ch.len_utf8())
                else {
                    continue;
                };
                if end == text.len() {
                    nodes.insert(index + 1, cursor);
                } else {
                    let tail = text.split_off(end);
                    nodes.insert(index + 1, cursor);
                    nodes.insert(index + 2, Node::Text(tail));
                }
                return Ok(());
            }
        }
    }
    Err(cursor)
}

pub fn serialize_nodes(nodes: &[Node], raw_text: bool, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) if raw_text => out.push_str(text),
            Node::Text(text) => escape_text(text, out),
            Node::Element(el) => serialize_element(el, out),
        }
    }
}

fn serialize_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag);
    for (name, value) in &el.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attr(value, out);
        out.push('"');
    }
    out.push('>');
    if el.is_void() {
        return;
    }
    // The parser drops a newline directly after these start tags.
    if el.namespace == Namespace::Html && matches!(el.tag.as_str(), "pre" | "textarea" | "listing") {
        if let Some(Node::Text(first)) = el.children.first() {
            if first.starts_with('\n') {
                out.push('\n');
            }
        }
    }
    serialize_nodes(&el.children, el.is_raw_text(), out);
    out.push_str("</");
    out.push_str(&el.tag);
    out.push('>');
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            other => out.push(other),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            other => out.push(other),
        }
    }
}

pub fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => collect_text(&el.children, out),
        }
    }
}

fn count_cursors(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            n if n.is_cursor() => 1,
            Node::Element(el) => count_cursors(&el.children),
            Node::Text(_) => 0,
        })
        .sum()
}

fn set_cursor_visibility(nodes: &mut [Node], visible: bool) {
    for node in nodes {
        if let Node::Element(el) = node {
            if el.is_cursor() {
                el.set_attr("data-visible", if visible { "true" } else { "false" });
            } else {
                set_cursor_visibility(&mut el.children, visible);
            }
        }
    }
}
