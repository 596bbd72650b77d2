//! HTML sanitizer for compiler output.
//!
//! Works on the parsed fragment tree produced by html5ever (through
//! `scraper`), so malformed markup is normalized by a real HTML parser
//! before any filtering happens.

use scraper::{ElementRef, Html};

use super::dom::{serialize_nodes, Element, Namespace, Node, CURSOR_MARKER_ATTR};
use crate::utils::url::is_javascript_url;

const BLOCKED_ELEMENTS: &[&str] = &["script", "iframe", "object", "embed"];
// Replaced by their children: `plaintext` has no end tag, so it could never
// be serialized back to the same tree.
const UNWRAPPED_ELEMENTS: &[&str] = &["plaintext"];
const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
const MATHML_NAMESPACE: &str = "http://www.w3.org/1998/Math/MathML";
const EVENT_HANDLER_PREFIX: &str = "on";

/// Parses `html` as a body fragment and returns the sanitized node list.
pub fn sanitize_fragment(html: &str) -> Vec<Node> {
    if html.is_empty() {
        return Vec::new();
    }
    let fragment = Html::parse_fragment(html);
    convert_children(fragment.root_element())
}

/// Sanitizes `html` and serializes the result back to markup.
pub fn sanitize(html: &str) -> String {
    let nodes = sanitize_fragment(html);
    let mut out = String::with_capacity(html.len());
    serialize_nodes(&nodes, false, &mut out);
    out
}

fn convert_children(parent: ElementRef<'_>) -> Vec<Node> {
    let mut nodes = Vec::new();
    for child in parent.children() {
        match child.value() {
            scraper::Node::Text(text) => {
                let content: &str = text;
                if content.is_empty() {
                    continue;
                }
                // Adjacent text nodes would merge on the next parse.
                if let Some(Node::Text(previous)) = nodes.last_mut() {
                    previous.push_str(content);
                } else {
                    nodes.push(Node::text(content));
                }
            }
            scraper::Node::Element(element) => {
                let name = element.name();
                if is_blocked_element(name) {
                    continue;
                }
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                let namespace = match &*element.name.ns {
                    SVG_NAMESPACE => Namespace::Svg,
                    MATHML_NAMESPACE => Namespace::MathMl,
                    _ => Namespace::Html,
                };
                if namespace == Namespace::Html && is_unwrapped_element(name) {
                    for node in convert_children(child_ref) {
                        match (node, nodes.last_mut()) {
                            (Node::Text(text), Some(Node::Text(previous))) => {
                                previous.push_str(&text)
                            }
                            (node, _) => nodes.push(node),
                        }
                    }
                    continue;
                }
                let attrs = element
                    .attrs()
                    .filter(|(attr, value)| is_allowed_attribute(attr, value))
                    .map(|(attr, value)| (attr.to_string(), value.to_string()))
                    .collect();
                nodes.push(Node::Element(Element {
                    tag: name.to_string(),
                    namespace,
                    attrs,
                    children: convert_children(child_ref),
                }));
            }
            // Comments, doctypes and processing instructions carry no content.
            _ => {}
        }
    }
    nodes
}

fn is_blocked_element(name: &str) -> bool {
    BLOCKED_ELEMENTS
        .iter()
        .any(|blocked| blocked.eq_ignore_ascii_case(name))
}

fn is_unwrapped_element(name: &str) -> bool {
    UNWRAPPED_ELEMENTS
        .iter()
        .any(|unwrapped| unwrapped.eq_ignore_ascii_case(name))
}

fn is_allowed_attribute(name: &str, value: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    if lowered.starts_with(EVENT_HANDLER_PREFIX) || lowered == CURSOR_MARKER_ATTR {
        return false;
    }
    if lowered == "href" && is_javascript_url(value) {
        return false;
    }
    true
}
