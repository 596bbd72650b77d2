//! Response transports.
//!
//! Every upstream shape (raw bytes from the backend server, plain text,
//! OpenAI-style delta objects from SSE or the local engine) is funnelled
//! through [`TransportAdapter::read`], which hands the driver loop plain text
//! tokens.

pub mod driver;
pub mod engine;
pub mod factory;
pub mod http;
pub mod sse;

use std::error::Error;
use std::fmt;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};

use crate::api::ChatResponse;

pub use driver::{print_response, ChatPane, DriverOptions, ScrollBehavior};
pub use engine::{EngineError, EngineHandle, InferenceEngine, RetryPolicy};
pub use factory::{TransportFactory, TransportKind};

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Failures surfaced by a transport to the driver loop's caller.
#[derive(Debug)]
pub enum TransportError {
    /// The HTTP request or body stream failed.
    Http(reqwest::Error),
    /// The server answered with a non-success status.
    Status { status: u16, body: String },
    /// The stream carried an error payload instead of content.
    Upstream(String),
    /// The local inference engine failed after its retries.
    Engine(EngineError),
    /// The provider needs the local engine but none was supplied.
    EngineUnavailable { provider: String },
    /// The provider's API key variable is not set.
    MissingApiKey { env_var: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Http(err) => write!(f, "Request failed: {err}"),
            TransportError::Status { status, body } => {
                write!(f, "Server returned status {status}: {body}")
            }
            TransportError::Upstream(message) => write!(f, "{message}"),
            TransportError::Engine(err) => write!(f, "{err}"),
            TransportError::EngineUnavailable { provider } => write!(
                f,
                "Provider '{provider}' needs a local inference engine, but none is configured"
            ),
            TransportError::MissingApiKey { env_var } => {
                write!(f, "API key variable {env_var} is not set")
            }
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TransportError::Http(err) => Some(err),
            TransportError::Engine(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Http(err)
    }
}

impl From<EngineError> for TransportError {
    fn from(err: EngineError) -> Self {
        TransportError::Engine(err)
    }
}

/// One value as delivered by an upstream stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamValue {
    Bytes(Vec<u8>),
    Text(String),
    Delta(ChatResponse),
}

/// Pull-based source of upstream values. `Ok(None)` ends the stream.
#[async_trait]
pub trait TokenSource: Send {
    async fn next_value(&mut self) -> Result<Option<StreamValue>, TransportError>;
}

#[async_trait]
impl TokenSource for Box<dyn TokenSource> {
    async fn next_value(&mut self) -> Result<Option<StreamValue>, TransportError> {
        (**self).next_value().await
    }
}

/// Normalized read result: `done` ends the stream, `value` is the text
/// payload (absent for values that carry no content).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadResult {
    pub done: bool,
    pub value: Option<String>,
}

impl ReadResult {
    pub fn done() -> Self {
        Self {
            done: true,
            value: None,
        }
    }

    pub fn value(value: Option<String>) -> Self {
        Self { done: false, value }
    }
}

/// Wraps a [`TokenSource`] and extracts text from whatever it yields.
pub struct TransportAdapter<S> {
    source: S,
    decoder: Utf8Decoder,
    exhausted: bool,
}

impl<S: TokenSource> TransportAdapter<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            decoder: Utf8Decoder::default(),
            exhausted: false,
        }
    }

    pub async fn read(&mut self) -> Result<ReadResult, TransportError> {
        if self.exhausted {
            return Ok(ReadResult::done());
        }
        match self.source.next_value().await? {
            None => {
                self.exhausted = true;
                let tail = self.decoder.flush();
                if tail.is_empty() {
                    Ok(ReadResult::done())
                } else {
                    Ok(ReadResult::value(Some(tail)))
                }
            }
            Some(StreamValue::Bytes(bytes)) => {
                let text = self.decoder.decode(&bytes);
                Ok(ReadResult::value((!text.is_empty()).then_some(text)))
            }
            Some(StreamValue::Text(text)) => Ok(ReadResult::value(Some(text))),
            Some(StreamValue::Delta(delta)) => {
                Ok(ReadResult::value(delta.content().map(str::to_owned)))
            }
        }
    }
}

/// Incremental UTF-8 decoder; sequences split across byte chunks are held
/// until complete and invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.pending.len());
        let mut start = 0;
        while start < self.pending.len() {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.pending.len();
                }
                Err(err) => {
                    let valid_end = start + err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..start);
        out
    }

    /// Decodes whatever is left; a truncated sequence becomes U+FFFD.
    pub fn flush(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}

/// [`TokenSource`] over any boxed stream of values.
pub struct ValueStream {
    inner: BoxStream<'static, Result<StreamValue, TransportError>>,
}

impl ValueStream {
    pub fn new(
        inner: impl Stream<Item = Result<StreamValue, TransportError>> + Send + 'static,
    ) -> Self {
        Self {
            inner: inner.boxed(),
        }
    }

    pub fn from_values(values: Vec<StreamValue>) -> Self {
        Self::new(stream::iter(values.into_iter().map(Ok)))
    }

    /// Plain string stream.
    pub fn from_text_stream(texts: impl Stream<Item = String> + Send + 'static) -> Self {
        Self::new(texts.map(|text| Ok(StreamValue::Text(text))))
    }

    /// Raw body of an HTTP response; decoded by the adapter.
    pub fn from_response(response: reqwest::Response) -> Self {
        Self::new(response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| StreamValue::Bytes(bytes.to_vec()))
                .map_err(TransportError::Http)
        }))
    }
}

#[async_trait]
impl TokenSource for ValueStream {
    async fn next_value(&mut self) -> Result<Option<StreamValue>, TransportError> {
        self.inner.next().await.transpose()
    }
}
