//! Loop that pumps a transport into a [`StreamRenderer`].

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::{TokenSource, TransportAdapter, TransportError};
use crate::render::{ContainerHandle, StreamRenderer};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScrollBehavior {
    #[default]
    Auto,
    Smooth,
}

/// The scrollable chat view that hosts the rendered reply.
pub trait ChatPane: Send {
    fn scroll_to_bottom(&mut self, behavior: ScrollBehavior);
}

impl ChatPane for ContainerHandle {
    fn scroll_to_bottom(&mut self, _behavior: ScrollBehavior) {
        self.lock().scroll_to_end();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriverOptions {
    /// Minimum spacing between pane scrolls while streaming.
    pub scroll_throttle: Duration,
    /// Pause after each chunk so other tasks (the blink timer) get a turn.
    pub chunk_pause: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            scroll_throttle: Duration::from_millis(200),
            chunk_pause: Duration::from_millis(10),
        }
    }
}

/// Lets an action through at most once per interval.
#[derive(Debug)]
pub struct ScrollThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ScrollThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Streams a reply into `renderer` until the transport is done.
///
/// Returns the full reply text. On a transport error the renderer is
/// cancelled (whatever arrived stays painted) and the error is returned.
pub async fn print_response<S: TokenSource>(
    adapter: &mut TransportAdapter<S>,
    renderer: &mut StreamRenderer,
    pane: &mut dyn ChatPane,
    options: &DriverOptions,
) -> Result<String, TransportError> {
    let mut throttle = ScrollThrottle::new(options.scroll_throttle);
    let mut response = String::new();
    let mut chunks = 0usize;

    loop {
        if throttle.ready(Instant::now()) {
            pane.scroll_to_bottom(ScrollBehavior::Smooth);
        }

        let result = match adapter.read().await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, chunks, "Response stream failed");
                renderer.cancel();
                return Err(err);
            }
        };

        if result.done {
            renderer.finish();
            pane.scroll_to_bottom(ScrollBehavior::Smooth);
            debug!(chunks, bytes = response.len(), "Response stream finished");
            return Ok(response);
        }

        if let Some(token) = result.value {
            chunks += 1;
            response.push_str(&token);
            renderer.process_chunk(&token);
            if !options.chunk_pause.is_zero() {
                tokio::time::sleep(options.chunk_pause).await;
            }
        }
    }
}
