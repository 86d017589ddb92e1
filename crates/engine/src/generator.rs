//! Generator coordination -- wiring, startup sync, and lifecycle
//!
//! The [`Generator`] is the top-level owner of one generation pipeline. It
//! performs the startup sync (every config rendered once), then launches
//! the long-lived tasks: one interval ticker per config with
//! `interval > 0`, one consumer per watching config, the event loop that
//! feeds them, and the signal task. `generate` joins all of them.
//!
//! # Startup order
//!
//! 1. Initial context build and render of every config (`force_notify`
//!    off, so a first run notifies exactly when content differs from any
//!    existing file)
//! 2. Interval tickers
//! 3. Watcher consumers, then the event loop (the watcher list is complete
//!    before the loop starts)
//! 4. Signal task, only when at least one config watches

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use topogen_core::config::{Config, ConfigFile};
use topogen_core::error::TopogenError;

use crate::context::ContextBuilder;
use crate::debounce::debounce;
use crate::docker::{
    resolve_endpoint, BollardConnector, DaemonClient, DaemonConnector, DaemonEvent, TlsSettings,
};
use crate::error::EngineError;
use crate::events::{self, EVENT_BUFFER_CAPACITY};
use crate::notify::Notifier;
use crate::render::TemplateRenderer;
use crate::signals::{SignalEvent, SignalListener};
use crate::state::DaemonState;

/// Construction parameters for [`Generator::new`].
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Daemon endpoint; falls back to `DOCKER_HOST`, then the default socket
    pub endpoint: Option<String>,
    /// TLS material for `tcp://` endpoints
    pub tls: Option<TlsSettings>,
    /// Include stopped containers in listings
    pub all: bool,
    /// Reconnect to the daemon when the event stream drops. Keep this
    /// enabled unless a terminal signal is expected: with retry off, a
    /// dropped stream closes the watchers but interval and signal tasks
    /// keep running until a shutdown signal arrives.
    pub retry: bool,
    /// Render configs
    pub configs: ConfigFile,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            tls: None,
            all: false,
            retry: true,
            configs: ConfigFile::default(),
        }
    }
}

/// Shared pipeline state handed to every spawned task.
pub(crate) struct GeneratorInner<C: DaemonConnector> {
    pub(crate) connector: C,
    pub(crate) client: Arc<C::Client>,
    pub(crate) configs: ConfigFile,
    pub(crate) retry: bool,
    pub(crate) state: Arc<DaemonState>,
    pub(crate) builder: ContextBuilder<C::Client>,
    pub(crate) notifier: Notifier<C::Client>,
}

impl<C: DaemonConnector> GeneratorInner<C> {
    /// Full resync: build one context and render every config against it.
    ///
    /// Used by the startup sync, the hangup handler, and the event loop
    /// after each (re)subscription. Notifiers fire only on content change.
    pub(crate) async fn generate_from_containers(&self) {
        let ctx = match self.builder.build().await {
            Ok(ctx) => ctx,
            Err(e) => {
                error!(error = %e, "error listing containers");
                return;
            }
        };
        for config in &self.configs.config {
            self.notifier.generate_and_notify(config, &ctx, false).await;
        }
    }
}

/// The long-lived coordinator of one generation pipeline.
pub struct Generator<C: DaemonConnector> {
    inner: Arc<GeneratorInner<C>>,
}

impl Generator<BollardConnector> {
    /// Builds a generator against a real Docker daemon.
    ///
    /// Resolves the endpoint, connects, and probes the server version once
    /// (a failed probe is logged, not fatal).
    ///
    /// # Errors
    ///
    /// Setup failures only: a bad endpoint or a failed client construction.
    pub async fn new(
        config: GeneratorConfig,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Result<Self, TopogenError> {
        let endpoint = resolve_endpoint(config.endpoint.as_deref())?;
        let connector = BollardConnector::new(endpoint, config.tls);
        Self::with_connector(connector, config.configs, config.all, config.retry, renderer).await
    }
}

impl<C: DaemonConnector> Generator<C> {
    /// Builds a generator over an arbitrary connector.
    pub async fn with_connector(
        connector: C,
        configs: ConfigFile,
        all: bool,
        retry: bool,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Result<Self, TopogenError> {
        let client = Arc::new(connector.connect().await?);
        let state = Arc::new(DaemonState::new());

        // Grab the server version once and hold onto it.
        match client.version().await {
            Ok(version) => {
                info!(
                    version = %version.version,
                    api_version = %version.api_version,
                    "connected to docker daemon"
                );
                state.set_version(version);
            }
            Err(e) => warn!(error = %e, "error retrieving docker server version info"),
        }

        let builder = ContextBuilder::new(Arc::clone(&client), all, Arc::clone(&state));
        let notifier = Notifier::new(Arc::clone(&client), renderer);

        Ok(Self {
            inner: Arc::new(GeneratorInner {
                connector,
                client,
                configs,
                retry,
                state,
                builder,
                notifier,
            }),
        })
    }

    /// Ambient daemon state (info, server version, services) for renderers.
    pub fn state(&self) -> Arc<DaemonState> {
        Arc::clone(&self.inner.state)
    }

    /// Runs the pipeline: startup sync, then all trigger tasks until they
    /// complete.
    ///
    /// Subsystem errors are logged where they occur; this returns an error
    /// only when startup setup fails (signal handler installation).
    pub async fn generate(&self) -> Result<(), TopogenError> {
        self.inner.generate_from_containers().await;

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        self.spawn_interval_tasks(&mut tasks)?;
        self.spawn_event_tasks(&mut tasks)?;
        self.spawn_signal_task(&mut tasks)?;

        for task in tasks {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!(error = %e, "generator task panicked");
                }
            }
        }
        Ok(())
    }

    fn spawn_interval_tasks(&self, tasks: &mut Vec<JoinHandle<()>>) -> Result<(), EngineError> {
        for config in &self.inner.configs.config {
            if config.interval == 0 {
                continue;
            }
            info!(
                dest = %config.dest,
                interval = config.interval,
                "generating every interval"
            );
            let signals = SignalListener::new()?;
            tasks.push(tokio::spawn(interval_loop(
                Arc::clone(&self.inner),
                config.clone(),
                signals,
            )));
        }
        Ok(())
    }

    fn spawn_event_tasks(&self, tasks: &mut Vec<JoinHandle<()>>) -> Result<(), EngineError> {
        let watching = self.inner.configs.filter_watches();
        if watching.is_empty() {
            return Ok(());
        }

        // The complete watcher list exists before the event loop starts, so
        // the fanout never observes a partially built list.
        let mut watchers = Vec::with_capacity(watching.config.len());
        for config in watching.config {
            let (tx, rx) = mpsc::channel(EVENT_BUFFER_CAPACITY);
            watchers.push(tx);
            let debounced = debounce(rx, config.wait);
            tasks.push(tokio::spawn(watch_loop(
                Arc::clone(&self.inner),
                config,
                debounced,
            )));
        }

        let signals = SignalListener::new()?;
        tasks.push(tokio::spawn(events::run(
            Arc::clone(&self.inner),
            watchers,
            signals,
        )));
        Ok(())
    }

    fn spawn_signal_task(&self, tasks: &mut Vec<JoinHandle<()>>) -> Result<(), EngineError> {
        // When no config watches, this component installs no signal handling.
        if !self.inner.configs.config.iter().any(|c| c.watch) {
            return Ok(());
        }
        let signals = SignalListener::new()?;
        tasks.push(tokio::spawn(signal_loop(Arc::clone(&self.inner), signals)));
        Ok(())
    }
}

/// Periodic regeneration for one config. Interval triggers always notify,
/// even when the output is unchanged.
async fn interval_loop<C: DaemonConnector>(
    inner: Arc<GeneratorInner<C>>,
    config: Config,
    mut signals: SignalListener,
) {
    let period = Duration::from_secs(config.interval);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let ctx = match inner.builder.build().await {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        error!(dest = %config.dest, error = %e, "error listing containers");
                        continue;
                    }
                };
                inner.notifier.generate_and_notify(&config, &ctx, true).await;
            }
            signal = signals.recv() => match signal {
                Some(SignalEvent::Shutdown(name)) => {
                    info!(signal = name, "received signal");
                    return;
                }
                Some(SignalEvent::Reload) => {}
                None => return,
            }
        }
    }
}

/// Consumer of one watching config's debounced event stream. Regenerations
/// are serialized per watcher; a failed context build skips the tick.
async fn watch_loop<C: DaemonConnector>(
    inner: Arc<GeneratorInner<C>>,
    config: Config,
    mut events: mpsc::Receiver<DaemonEvent>,
) {
    while let Some(_event) = events.recv().await {
        let ctx = match inner.builder.build().await {
            Ok(ctx) => ctx,
            Err(e) => {
                error!(dest = %config.dest, error = %e, "error listing containers");
                continue;
            }
        };
        inner.notifier.generate_and_notify(&config, &ctx, false).await;
    }
    info!(dest = %config.dest, "watcher stream closed");
}

/// Hangup forces a full resync; terminal signals end the task (and with it
/// the generator's join, once every other task has observed its own copy).
async fn signal_loop<C: DaemonConnector>(inner: Arc<GeneratorInner<C>>, mut signals: SignalListener) {
    while let Some(signal) = signals.recv().await {
        match signal {
            SignalEvent::Reload => {
                info!(signal = "SIGHUP", "received signal");
                inner.generate_from_containers().await;
            }
            SignalEvent::Shutdown(name) => {
                info!(signal = name, "received signal");
                return;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::docker::{MockConnector, MockDaemonClient};
    use crate::render::RecordingRenderer;

    /// Assembles a `GeneratorInner` over mocks, bypassing `with_connector`
    /// so the initial client and the reconnect queue stay distinct.
    pub(crate) fn make_inner(
        client: MockDaemonClient,
        connector: MockConnector,
        configs: ConfigFile,
        retry: bool,
        renderer: Arc<RecordingRenderer>,
    ) -> Arc<GeneratorInner<MockConnector>> {
        let client = Arc::new(client);
        let state = Arc::new(DaemonState::new());
        let renderer: Arc<dyn TemplateRenderer> = renderer;
        Arc::new(GeneratorInner {
            builder: ContextBuilder::new(Arc::clone(&client), false, Arc::clone(&state)),
            notifier: Notifier::new(Arc::clone(&client), renderer),
            connector,
            client,
            configs,
            retry,
            state,
        })
    }
}
