//! `render` command: replays a markdown document as a stream.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;

use crate::render::{ContainerHandle, RendererOptions, StreamRenderer};
use crate::transport::{print_response, DriverOptions, StreamValue, TransportAdapter, ValueStream};
use crate::utils::syntax::SyntectHighlighter;

/// Splits `text` into chunks of at most `chunk_size` characters.
pub fn split_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

async fn read_input(file: Option<&Path>) -> Result<String, Box<dyn Error>> {
    match file {
        Some(path) => Ok(tokio::fs::read_to_string(path).await?),
        None => {
            let mut input = String::new();
            tokio::io::stdin().read_to_string(&mut input).await?;
            Ok(input)
        }
    }
}

/// Streams `markdown` chunk by chunk and returns the final container HTML.
pub async fn render_chunked(
    markdown: &str,
    chunk_size: usize,
    options: RendererOptions,
) -> Result<String, Box<dyn Error>> {
    let values = split_chunks(markdown, chunk_size)
        .into_iter()
        .map(StreamValue::Text)
        .collect();
    let mut adapter = TransportAdapter::new(ValueStream::from_values(values));
    let mut container = ContainerHandle::new("render");
    let mut renderer = StreamRenderer::new(
        container.clone(),
        Arc::new(SyntectHighlighter::new()),
        options,
    );
    let driver = DriverOptions {
        chunk_pause: Duration::ZERO,
        ..DriverOptions::default()
    };
    print_response(&mut adapter, &mut renderer, &mut container, &driver).await?;
    Ok(container.inner_html())
}

pub async fn run_render(
    file: Option<&Path>,
    chunk_size: usize,
    options: RendererOptions,
) -> Result<String, Box<dyn Error>> {
    let markdown = read_input(file).await?;
    render_chunked(&markdown, chunk_size, options).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_respect_char_boundaries() {
        assert_eq!(split_chunks("héllo", 2), vec!["hé", "ll", "o"]);
        assert_eq!(split_chunks("abc", 0), vec!["a", "b", "c"]);
        assert!(split_chunks("", 4).is_empty());
    }

    #[tokio::test]
    async fn chunk_size_does_not_change_output() {
        let markdown = "# Title\n\nSome *text* and a list:\n\n- one\n- two\n\n```rust\nfn main() {}\n```\nDone.";
        let whole = render_chunked(markdown, usize::MAX, RendererOptions::default())
            .await
            .unwrap();
        for size in [1, 3, 7, 16] {
            let chunked = render_chunked(markdown, size, RendererOptions::default())
                .await
                .unwrap();
            assert_eq!(chunked, whole, "chunk size {size}");
        }
        assert!(whole.contains("language-rust"));
        assert!(!whole.contains("```"));
        assert!(!whole.contains("blinking-cursor"));
    }

    #[tokio::test]
    async fn reads_markdown_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reply.md");
        std::fs::write(&path, "**bold**").unwrap();
        let html = run_render(Some(&path), 2, RendererOptions::default().without_cursor())
            .await
            .unwrap();
        assert_eq!(html.matches("<strong>bold</strong>").count(), 1);
    }
}
