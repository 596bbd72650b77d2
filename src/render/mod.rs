//! Streaming markdown rendering.
//!
//! [`fragments`] turns raw chunks into ordered text/code fragments without
//! touching any DOM, [`markdown`] compiles fragments to HTML, [`sanitize`]
//! filters that HTML through a real parser, and [`stream`] paints the result
//! into a [`dom::Container`] with a blinking cursor while a reply streams in.

pub mod cursor;
pub mod dom;
pub mod fragments;
pub mod markdown;
pub mod sanitize;
pub mod stream;

pub use dom::{Container, ContainerHandle, Node};
pub use fragments::{ContentFragment, FragmentBuffer, ParserState};
pub use markdown::{CodeBlockStyle, Highlighter, MarkdownCompiler, PlainHighlighter};
pub use sanitize::sanitize;
pub use stream::{print_message, render_markdown_to_html, RendererOptions, StreamRenderer};
