//! Event debouncing -- collapsing bursts into single regeneration ticks
//!
//! [`debounce`] adapts a watcher's event stream: a burst of inbound events
//! yields at most one outbound event, carrying the most recent input. The
//! `min` bound collapses quiet bursts; the `max` bound guarantees an
//! emission within `max` of the first event even under continuous input.

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use topogen_core::config::Wait;

use crate::docker::DaemonEvent;
use crate::events::EVENT_BUFFER_CAPACITY;

/// Wraps `input` in a debouncing adapter.
///
/// With no window, or a zero `min`, the input is returned verbatim.
/// Otherwise a background task owns the state machine; its output closes
/// when the input closes, discarding in-flight timers.
pub fn debounce(
    input: mpsc::Receiver<DaemonEvent>,
    wait: Option<Wait>,
) -> mpsc::Receiver<DaemonEvent> {
    let Some(wait) = wait else {
        return input;
    };
    if wait.min.is_zero() {
        return input;
    }

    let (tx, rx) = mpsc::channel(EVENT_BUFFER_CAPACITY);
    tokio::spawn(run(input, tx, wait));
    rx
}

/// Sleeps until `at`, or forever when unset. Replacing the deadline rather
/// than canceling a timer is what makes "reset" race-free here.
async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn run(
    mut input: mpsc::Receiver<DaemonEvent>,
    output: mpsc::Sender<DaemonEvent>,
    wait: Wait,
) {
    let mut last_event: Option<DaemonEvent> = None;
    let mut min_deadline: Option<Instant> = None;
    let mut max_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            received = input.recv() => match received {
                Some(event) => {
                    last_event = Some(event);
                    min_deadline = Some(Instant::now() + wait.min);
                    if max_deadline.is_none() {
                        max_deadline = Some(Instant::now() + wait.max);
                    }
                }
                // Input closed: drop the output, discarding in-flight timers.
                None => return,
            },
            _ = deadline(min_deadline) => {
                debug!("debounce min timer fired");
                min_deadline = None;
                max_deadline = None;
                if let Some(event) = last_event.take() {
                    if output.send(event).await.is_err() {
                        return;
                    }
                }
            }
            _ = deadline(max_deadline) => {
                debug!("debounce max timer fired");
                min_deadline = None;
                max_deadline = None;
                if let Some(event) = last_event.take() {
                    if output.send(event).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
