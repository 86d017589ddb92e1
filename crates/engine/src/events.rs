//! Event loop -- the single owner of the daemon event subscription
//!
//! One task maintains the connection to the daemon's event stream: it
//! subscribes, runs a full resync so watchers see a baseline, then fans
//! relevant events out to every watcher's bounded buffer. On stream loss it
//! reconnects (with backoff) through the connector; on sustained silence it
//! probes the daemon with a ping. A slow watcher backpressures the fanout
//! rather than losing events.
//!
//! State machine:
//!
//! | State        | Event              | Next         | Action                      |
//! |--------------|--------------------|--------------|-----------------------------|
//! | Disconnected | --                 | Watching     | connect, subscribe, resync  |
//! | Disconnected | connect error      | Disconnected | sleep 10s                   |
//! | Watching     | relevant event     | Watching     | broadcast                   |
//! | Watching     | stream closed      | Disconnected | sleep 10s; or shutdown if retry is off |
//! | Watching     | 10s idle           | Watching     | ping; on failure reconnect  |
//! | Watching     | shutdown signal    | terminal     | close watchers, return      |

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use topogen_core::context::short_id;

use crate::docker::{DaemonClient, DaemonConnector, DaemonEvent};
use crate::generator::GeneratorInner;
use crate::signals::{SignalEvent, SignalListener};

/// Capacity of the per-watcher and subscription buffers.
pub const EVENT_BUFFER_CAPACITY: usize = 100;

/// Sleep between reconnect attempts after a lost daemon connection.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(10);

/// Idle period after which daemon liveness is probed with a ping.
pub const LIVENESS_IDLE: Duration = Duration::from_secs(10);

/// Runs the event loop until shutdown (or stream loss with retry off).
///
/// Returning drops the watcher senders, which closes every watcher stream.
pub(crate) async fn run<C: DaemonConnector>(
    inner: Arc<GeneratorInner<C>>,
    watchers: Vec<mpsc::Sender<DaemonEvent>>,
    mut signals: SignalListener,
) {
    // The generator's client serves the first subscription; reconnects
    // build fresh ones.
    let mut current = Some(Arc::clone(&inner.client));

    'reconnect: loop {
        let client = match current.take() {
            Some(client) => client,
            None => match inner.connector.connect().await {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    warn!(error = %e, "unable to connect to docker daemon");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                    continue;
                }
            },
        };

        let mut events = client.subscribe_events();
        info!("watching docker events");
        // Sync all configs after (re)subscribing so watchers see a baseline
        // before any forwarded event.
        inner.generate_from_containers().await;

        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Some(event) if event.kind.is_relevant() => {
                        info!(
                            event = %event.kind,
                            actor = short_id(&event.actor_id),
                            "received event"
                        );
                        for watcher in &watchers {
                            // Bounded send: a stalled watcher blocks the
                            // fanout instead of dropping events.
                            let _ = watcher.send(event.clone()).await;
                        }
                    }
                    Some(_) => {}
                    None => {
                        warn!("docker daemon connection interrupted");
                        if !inner.retry {
                            // Dropping the senders closes every watcher.
                            return;
                        }
                        tokio::time::sleep(RECONNECT_BACKOFF).await;
                        continue 'reconnect;
                    }
                },
                _ = tokio::time::sleep(LIVENESS_IDLE) => {
                    if let Err(e) = client.ping().await {
                        warn!(error = %e, "unable to ping docker daemon");
                        continue 'reconnect;
                    }
                }
                signal = signals.recv() => match signal {
                    Some(SignalEvent::Shutdown(name)) => {
                        info!(signal = name, "received signal");
                        return;
                    }
                    Some(SignalEvent::Reload) => {}
                    None => return,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::docker::{DaemonEventKind, MockConnector, MockDaemonClient};
    use crate::generator::testing::make_inner;
    use crate::render::RecordingRenderer;
    use topogen_core::config::{Config, ConfigFile};

    fn watch_config() -> ConfigFile {
        ConfigFile::new(vec![Config {
            dest: "/tmp/watched".to_owned(),
            watch: true,
            ..Default::default()
        }])
    }

    fn start_event(actor: &str) -> DaemonEvent {
        DaemonEvent {
            kind: DaemonEventKind::ContainerStart,
            actor_id: actor.to_owned(),
        }
    }

    fn other_event() -> DaemonEvent {
        DaemonEvent {
            kind: DaemonEventKind::Other,
            actor_id: "ignored".to_owned(),
        }
    }

    async fn recv_within(
        rx: &mut mpsc::Receiver<DaemonEvent>,
        secs: u64,
    ) -> Option<DaemonEvent> {
        tokio::time::timeout(Duration::from_secs(secs), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test(start_paused = true)]
    async fn relevant_events_fan_out_to_all_watchers() {
        let (event_tx, event_rx) = mpsc::channel(16);
        let client = MockDaemonClient::new().with_event_stream(event_rx);
        let renderer = Arc::new(RecordingRenderer::new(true));
        let inner = make_inner(
            client,
            MockConnector::new(Vec::new()),
            watch_config(),
            true,
            Arc::clone(&renderer),
        );

        let (tx_a, mut rx_a) = mpsc::channel(EVENT_BUFFER_CAPACITY);
        let (tx_b, mut rx_b) = mpsc::channel(EVENT_BUFFER_CAPACITY);
        let signals = SignalListener::new().unwrap();
        let loop_task = tokio::spawn(run(inner, vec![tx_a, tx_b], signals));

        // Irrelevant first, then relevant: receiving the relevant one first
        // proves the filter dropped the other silently.
        event_tx.send(other_event()).await.unwrap();
        event_tx.send(start_event("abc123")).await.unwrap();

        assert_eq!(recv_within(&mut rx_a, 30).await.unwrap().actor_id, "abc123");
        assert_eq!(recv_within(&mut rx_b, 30).await.unwrap().actor_id, "abc123");

        loop_task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn subscription_triggers_baseline_resync() {
        let (_event_tx, event_rx) = mpsc::channel::<DaemonEvent>(16);
        let client = MockDaemonClient::new().with_event_stream(event_rx);
        let renderer = Arc::new(RecordingRenderer::new(true));
        let inner = make_inner(
            client,
            MockConnector::new(Vec::new()),
            watch_config(),
            true,
            Arc::clone(&renderer),
        );

        let (tx, _rx) = mpsc::channel(EVENT_BUFFER_CAPACITY);
        let signals = SignalListener::new().unwrap();
        let loop_task = tokio::spawn(run(inner, vec![tx], signals));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(renderer.render_count(), 1);

        loop_task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn closed_stream_reconnects_and_resyncs() {
        let (first_tx, first_rx) = mpsc::channel(16);
        let first = MockDaemonClient::new().with_event_stream(first_rx);

        let (second_tx, second_rx) = mpsc::channel(16);
        let second = MockDaemonClient::new().with_event_stream(second_rx);

        let renderer = Arc::new(RecordingRenderer::new(true));
        let connector = MockConnector::new(vec![second]);
        let connects = Arc::clone(&connector.connects);
        let inner = make_inner(first, connector, watch_config(), true, Arc::clone(&renderer));

        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER_CAPACITY);
        let signals = SignalListener::new().unwrap();
        let loop_task = tokio::spawn(run(inner, vec![tx], signals));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(renderer.render_count(), 1);

        // Daemon drops the stream: within the backoff a new subscription is
        // established and a fresh resync runs.
        drop(first_tx);
        tokio::time::sleep(RECONNECT_BACKOFF + Duration::from_millis(100)).await;
        assert_eq!(connects.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(renderer.render_count(), 2);

        // Subsequent events reach watchers through the new subscription.
        second_tx.send(start_event("after-reconnect")).await.unwrap();
        assert_eq!(
            recv_within(&mut rx, 30).await.unwrap().actor_id,
            "after-reconnect"
        );

        loop_task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn closed_stream_without_retry_closes_watchers() {
        let (event_tx, event_rx) = mpsc::channel::<DaemonEvent>(16);
        let client = MockDaemonClient::new().with_event_stream(event_rx);
        let renderer = Arc::new(RecordingRenderer::new(true));
        let inner = make_inner(
            client,
            MockConnector::new(Vec::new()),
            watch_config(),
            false,
            Arc::clone(&renderer),
        );

        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER_CAPACITY);
        let signals = SignalListener::new().unwrap();
        let loop_task = tokio::spawn(run(inner, vec![tx], signals));

        drop(event_tx);

        // Clean shutdown: watcher channel closes and the loop ends.
        assert!(recv_within(&mut rx, 60).await.is_none());
        tokio::time::timeout(Duration::from_secs(5), loop_task)
            .await
            .expect("event loop should finish")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_liveness_ping_forces_reconnect() {
        let (first_tx, first_rx) = mpsc::channel::<DaemonEvent>(16);
        let first = MockDaemonClient::new().with_event_stream(first_rx);
        first
            .fail_ping
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let (second_tx, second_rx) = mpsc::channel(16);
        let second = MockDaemonClient::new().with_event_stream(second_rx);

        let renderer = Arc::new(RecordingRenderer::new(true));
        let connector = MockConnector::new(vec![second]);
        let connects = Arc::clone(&connector.connects);
        let inner = make_inner(first, connector, watch_config(), true, Arc::clone(&renderer));

        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER_CAPACITY);
        let signals = SignalListener::new().unwrap();
        let loop_task = tokio::spawn(run(inner, vec![tx], signals));

        // The first stream stays silent, so after the idle period the loop
        // pings, fails, and rebuilds its client.
        tokio::time::sleep(LIVENESS_IDLE + Duration::from_millis(100)).await;
        assert_eq!(connects.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(renderer.render_count(), 2);

        second_tx.send(start_event("alive-again")).await.unwrap();
        assert_eq!(
            recv_within(&mut rx, 30).await.unwrap().actor_id,
            "alive-again"
        );

        drop(first_tx);
        loop_task.abort();
    }
}
