use std::collections::VecDeque;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use memchr::memchr;
use tracing::warn;

use super::{StreamValue, TokenSource, TransportError};
use crate::api::ChatResponse;

#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Delta(ChatResponse),
    Done,
    Skip,
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn handle_data_payload(payload: &str) -> Result<SseLine, TransportError> {
    if payload == "[DONE]" {
        return Ok(SseLine::Done);
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => Ok(SseLine::Delta(response)),
        Err(_) => {
            if payload.trim().is_empty() {
                return Ok(SseLine::Skip);
            }
            Err(TransportError::Upstream(format_api_error(payload)))
        }
    }
}

fn process_sse_line(line: &str) -> Result<SseLine, TransportError> {
    extract_data_payload(line)
        .map(handle_data_payload)
        .unwrap_or(Ok(SseLine::Skip))
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                serde_json::Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .or_else(|| value.get("detail"))
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}

/// Formats an error body as markdown so it can be painted like a reply.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            if let Some(summary) = extract_error_summary(&json_value) {
                if !summary.is_empty() {
                    return format!("API Error: {}\n```json\n{}\n```", summary, pretty_json);
                }
            }
            return format!("API Error:\n```json\n{}\n```", pretty_json);
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{}\n```", trimmed)
    } else {
        format!("API Error:\n```\n{}\n```", trimmed)
    }
}

/// Server-sent-events body of an OpenAI-compatible streaming completion,
/// yielding one [`StreamValue::Delta`] per `data:` line.
pub struct SseDeltaSource {
    body: BoxStream<'static, Result<Vec<u8>, TransportError>>,
    buffer: Vec<u8>,
    pending: VecDeque<StreamValue>,
    finished: bool,
}

impl SseDeltaSource {
    pub fn new(body: impl Stream<Item = Result<Vec<u8>, TransportError>> + Send + 'static) -> Self {
        Self {
            body: body.boxed(),
            buffer: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    pub fn from_response(response: reqwest::Response) -> Self {
        Self::new(
            response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TransportError::Http)),
        )
    }

    /// Consumes every complete line in the buffer. Returns true once the
    /// stream signalled its end.
    fn drain_lines(&mut self) -> Result<bool, TransportError> {
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if self.handle_line(&line[..newline_pos])? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn handle_line(&mut self, raw: &[u8]) -> Result<bool, TransportError> {
        let line = match std::str::from_utf8(raw) {
            Ok(s) => s.trim(),
            Err(e) => {
                warn!(error = %e, "Invalid UTF-8 in event stream");
                return Ok(false);
            }
        };
        match process_sse_line(line)? {
            SseLine::Delta(response) => {
                self.pending.push_back(StreamValue::Delta(response));
                Ok(false)
            }
            SseLine::Done => Ok(true),
            SseLine::Skip => Ok(false),
        }
    }
}

#[async_trait]
impl TokenSource for SseDeltaSource {
    async fn next_value(&mut self) -> Result<Option<StreamValue>, TransportError> {
        loop {
            if let Some(value) = self.pending.pop_front() {
                return Ok(Some(value));
            }
            if self.finished {
                return Ok(None);
            }
            match self.body.next().await {
                Some(Ok(bytes)) => {
                    self.buffer.extend_from_slice(&bytes);
                    if self.drain_lines()? {
                        self.finished = true;
                    }
                }
                Some(Err(err)) => {
                    self.finished = true;
                    return Err(err);
                }
                None => {
                    self.finished = true;
                    let rest = std::mem::take(&mut self.buffer);
                    if !rest.is_empty() {
                        self.handle_line(&rest)?;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn body(chunks: &[&str]) -> SseDeltaSource {
        let chunks: Vec<Result<Vec<u8>, TransportError>> = chunks
            .iter()
            .map(|chunk| Ok(chunk.as_bytes().to_vec()))
            .collect();
        SseDeltaSource::new(stream::iter(chunks))
    }

    async fn contents(source: &mut SseDeltaSource) -> Result<Vec<String>, TransportError> {
        let mut out = Vec::new();
        while let Some(value) = source.next_value().await? {
            match value {
                StreamValue::Delta(delta) => out.push(delta.content().unwrap_or_default().to_string()),
                other => panic!("expected delta, got {:?}", other),
            }
        }
        Ok(out)
    }

    #[test]
    fn process_sse_line_handles_spacing_variants() {
        let variants = [
            (
                r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#,
                "Hello",
                "data: [DONE]",
            ),
            (
                r#"data:{"choices":[{"delta":{"content":"World"}}]}"#,
                "World",
                "data:[DONE]",
            ),
        ];

        for (chunk_line, expected_chunk, done_line) in variants {
            match process_sse_line(chunk_line).expect("valid line") {
                SseLine::Delta(response) => assert_eq!(response.content(), Some(expected_chunk)),
                other => panic!("expected delta, got {:?}", other),
            }
            assert_eq!(process_sse_line(done_line).unwrap(), SseLine::Done);
        }

        assert_eq!(process_sse_line(": keep-alive").unwrap(), SseLine::Skip);
        assert_eq!(process_sse_line("data: ").unwrap(), SseLine::Skip);
    }

    #[test]
    fn process_sse_line_routes_stream_errors() {
        let error_line = r#"data: {"error":{"message":"internal server error"}}"#;

        match process_sse_line(error_line) {
            Err(TransportError::Upstream(text)) => {
                let expected = r#"API Error: internal server error
```json
{
  "error": {
    "message": "internal server error"
  }
}
```"#;
                assert_eq!(text, expected);
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn lines_split_across_chunks_are_reassembled() {
        let mut source = body(&[
            "data: {\"choices\":[{\"delta\":{\"con",
            "tent\":\"Hel\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            "data: [DONE]\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n",
        ]);
        assert_eq!(contents(&mut source).await.unwrap(), vec!["Hel", "lo"]);
        assert!(source.next_value().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_parsed() {
        let mut source = body(&["data: {\"choices\":[{\"delta\":{\"content\":\"end\"}}]}"]);
        assert_eq!(contents(&mut source).await.unwrap(), vec!["end"]);
    }

    #[tokio::test]
    async fn error_payload_ends_the_stream_with_an_error() {
        let mut source = body(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
            "data: {\"error\":\"quota exceeded\"}\n",
        ]);
        let first = source.next_value().await.unwrap();
        assert!(matches!(first, Some(StreamValue::Delta(_))));
        let err = source.next_value().await.expect_err("error payload");
        assert!(err.to_string().starts_with("API Error: quota exceeded"));
    }

    #[test]
    fn format_api_error_prettifies_json_with_summary() {
        let raw = r#"{"error":{"message":"model overloaded","type":"invalid_request_error"}}"#;
        let formatted = format_api_error(raw);

        let expected = r#"API Error: model overloaded
```json
{
  "error": {
    "message": "model overloaded",
    "type": "invalid_request_error"
  }
}
```"#;
        assert_eq!(formatted, expected);
    }

    #[test]
    fn format_api_error_reads_backend_detail() {
        let formatted = format_api_error(r#"{"detail":"Unknown   provider"}"#);
        assert!(formatted.starts_with("API Error: Unknown provider\n```json"));
    }

    #[test]
    fn format_api_error_handles_json_without_summary() {
        let raw = r#"{"status":"failed"}"#;
        let formatted = format_api_error(raw);

        let expected = r#"API Error:
```json
{
  "status": "failed"
}
```"#;
        assert_eq!(formatted, expected);
    }

    #[test]
    fn format_api_error_handles_xml_and_plaintext() {
        assert_eq!(
            format_api_error("<error>bad</error>"),
            "API Error:\n```xml\n<error>bad</error>\n```"
        );
        assert_eq!(format_api_error("api failure"), "API Error:\n```\napi failure\n```");
        assert_eq!(format_api_error("  "), "API Error:\n```\n<empty>\n```");
    }
}
