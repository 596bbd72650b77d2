use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::dom::{ContainerHandle, CURSOR_MARKER_ATTR};

pub const DEFAULT_BLINK_INTERVAL: Duration = Duration::from_millis(200);

/// Style rules for the cursor, scoped to one renderer's stream id.
pub fn cursor_stylesheet(stream_id: &str) -> String {
    format!(
        "[data-stream-id=\"{stream_id}\"] [{CURSOR_MARKER_ATTR}] {{ display: inline-block; margin-left: 1px; }}\n\
         [data-stream-id=\"{stream_id}\"] [{CURSOR_MARKER_ATTR}][data-visible=\"false\"] {{ visibility: hidden; }}"
    )
}

/// Repeating task that toggles cursor visibility in a container.
///
/// Stops when [`BlinkTimer::stop`] is called or the timer is dropped.
#[derive(Debug)]
pub struct BlinkTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl BlinkTimer {
    /// Spawns the blink task on the current tokio runtime.
    ///
    /// Returns `None` outside a runtime; the cursor then stays static.
    pub fn start(
        container: ContainerHandle,
        visible: Arc<AtomicBool>,
        period: Duration,
    ) -> Option<Self> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = period.max(Duration::from_millis(1));

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let now_visible = !visible.fetch_xor(true, Ordering::AcqRel);
                        container.lock().set_cursor_visible(now_visible);
                    }
                }
            }
        });

        Some(Self { cancel, handle })
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

impl Drop for BlinkTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
