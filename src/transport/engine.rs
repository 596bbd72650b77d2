//! In-process inference engine transport.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{BoxError, StreamValue, TokenSource, TransportError};
use crate::api::{ChatMessage, ChatResponse};

pub type DeltaStream = BoxStream<'static, Result<ChatResponse, BoxError>>;

/// A model that runs inside this process and streams OpenAI-style deltas.
#[async_trait]
pub trait InferenceEngine: Send {
    /// Loads `model`; called before the first generation and after a failed
    /// attempt.
    async fn init(&mut self, model: &str) -> Result<(), BoxError>;

    fn is_ready(&self) -> bool;

    async fn chat_stream(&mut self, messages: &[ChatMessage]) -> Result<DeltaStream, BoxError>;

    async fn dispose(&mut self);
}

/// Error raised by the engine transport, wrapping the engine's own error.
#[derive(Debug)]
pub struct EngineError {
    message: String,
    source: Option<BoxError>,
}

impl EngineError {
    pub fn new(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self {
            message: message.into(),
            source,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn Error + 'static))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Shared, explicitly owned handle to the process's inference engine.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<Mutex<Box<dyn InferenceEngine>>>,
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle").finish_non_exhaustive()
    }
}

impl EngineHandle {
    pub fn new(engine: impl InferenceEngine + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(engine))),
        }
    }

    pub async fn is_ready(&self) -> bool {
        self.inner.lock().await.is_ready()
    }

    pub async fn init(&self, model: &str) -> Result<(), EngineError> {
        self.inner
            .lock()
            .await
            .init(model)
            .await
            .map_err(|err| EngineError::new("Failed to initialize local engine", Some(err)))
    }

    pub async fn dispose(&self) {
        self.inner.lock().await.dispose().await;
    }

    /// Starts a generation, initializing the engine when needed. Failed
    /// attempts dispose the engine so the next one reloads the model.
    pub async fn open_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        retry: RetryPolicy,
    ) -> Result<EngineSource, TransportError> {
        let max_attempts = retry.max_attempts.max(1);
        let mut engine = self.inner.lock().await;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match start_generation(&mut **engine, model, messages).await {
                Ok(stream) => {
                    debug!(model, attempt, "Local engine stream opened");
                    return Ok(EngineSource::new(stream));
                }
                Err(err) => {
                    warn!(model, attempt, max_attempts, error = %err, "Local engine attempt failed");
                    engine.dispose().await;
                    last_error = Some(err);
                }
            }
        }

        Err(TransportError::Engine(EngineError::new(
            format!("Local engine failed after {max_attempts} attempts"),
            last_error,
        )))
    }
}

async fn start_generation(
    engine: &mut dyn InferenceEngine,
    model: &str,
    messages: &[ChatMessage],
) -> Result<DeltaStream, BoxError> {
    if !engine.is_ready() {
        engine.init(model).await?;
    }
    engine.chat_stream(messages).await
}

/// Deltas of one engine generation.
pub struct EngineSource {
    stream: DeltaStream,
}

impl EngineSource {
    pub fn new(stream: DeltaStream) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl TokenSource for EngineSource {
    async fn next_value(&mut self) -> Result<Option<StreamValue>, TransportError> {
        match self.stream.next().await {
            None => Ok(None),
            Some(Ok(delta)) => Ok(Some(StreamValue::Delta(delta))),
            Some(Err(err)) => Err(TransportError::Engine(EngineError::new(
                "Local engine stream failed",
                Some(err),
            ))),
        }
    }
}
