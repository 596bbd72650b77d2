//! Chatpane renders streamed LLM chat replies as sanitized, highlighted HTML.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`render`] owns the markdown compiler, the sanitizer, the fragment buffer
//!   and the [`render::StreamRenderer`] that rebuilds a reply container after
//!   every chunk.
//! - [`transport`] turns backend responses, SSE streams and local engines into
//!   one `{ done, value }` read interface and drives the renderer from it.
//! - [`core`] holds configuration, the provider table and chat history.
//! - [`api`] defines the chat tokens, provider records and wire payloads.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod render;
pub mod transport;
pub mod utils;
