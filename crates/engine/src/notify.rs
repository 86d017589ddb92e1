//! Notification pipeline -- render, then tell the world about it
//!
//! [`Notifier::generate_and_notify`] is the single regeneration step every
//! trigger funnels into: render the config, and unless the output is
//! unchanged (and nobody forced it), run the notify command, signal the
//! listed containers, and signal the containers backing the listed swarm
//! services. Notify failures are logged and never abort the pipeline; there
//! is no retry.

use std::sync::Arc;

use tracing::{error, info};

use topogen_core::config::Config;
use topogen_core::context::{short_id, Context};

use crate::docker::DaemonClient;
use crate::render::TemplateRenderer;

/// Runs the render-and-notify pipeline for single configs.
pub struct Notifier<D: DaemonClient> {
    client: Arc<D>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl<D: DaemonClient> Notifier<D> {
    pub fn new(client: Arc<D>, renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self { client, renderer }
    }

    /// Renders `config` and calls its notifiers.
    ///
    /// With `force_notify` set, notifiers run even when the rendered file
    /// did not change (interval triggers use this).
    pub async fn generate_and_notify(&self, config: &Config, ctx: &Context, force_notify: bool) {
        let changed = self.renderer.generate_file(config, ctx);
        if !changed && !force_notify {
            info!(
                dest = %config.dest,
                "contents did not change, skipping notifications"
            );
            return;
        }
        if !changed {
            info!(
                dest = %config.dest,
                "contents did not change, calling notifiers anyway"
            );
        }

        self.run_notify_cmd(config).await;
        self.signal_containers(config).await;
        self.signal_services(config).await;
    }

    async fn run_notify_cmd(&self, config: &Config) {
        if config.notify_cmd.is_empty() {
            return;
        }

        info!(command = %config.notify_cmd, "running notify command");
        let output = match tokio::process::Command::new("/bin/sh")
            .arg("-c")
            .arg(&config.notify_cmd)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                error!(command = %config.notify_cmd, error = %e, "error running notify command");
                return;
            }
        };

        if !output.status.success() {
            error!(
                command = %config.notify_cmd,
                status = %output.status,
                "notify command exited with an error"
            );
        }

        if config.notify_output {
            let mut combined = output.stdout;
            combined.extend_from_slice(&output.stderr);
            for line in String::from_utf8_lossy(&combined).lines() {
                if !line.is_empty() {
                    info!("[{}]: {}", config.notify_cmd, line);
                }
            }
        }
    }

    async fn signal_containers(&self, config: &Config) {
        for (container, signal) in &config.notify_containers {
            info!(
                container = %container,
                signal = %signal,
                "sending signal to container"
            );
            if let Err(e) = self.client.kill_container(container, signal).await {
                error!(container = %container, error = %e, "error sending signal to container");
            }
        }
    }

    async fn signal_services(&self, config: &Config) {
        for (service, signal) in &config.notify_services {
            info!(service = %service, "service needs notification");
            let tasks = match self.client.list_tasks(service).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    error!(service = %service, error = %e, "error retrieving task list");
                    continue;
                }
            };
            for task in tasks {
                if !task.state.eq_ignore_ascii_case("running") {
                    continue;
                }
                let Some(container) = task.container_id else {
                    continue;
                };
                info!(
                    container = short_id(&container),
                    signal = %signal,
                    "sending signal to service task container"
                );
                if let Err(e) = self.client.kill_container(&container, signal).await {
                    error!(
                        container = short_id(&container),
                        error = %e,
                        "error sending signal to container"
                    );
                }
            }
        }
    }
}
