#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`EngineError`)
//! - [`docker`]: Daemon API abstraction (`DaemonClient`, `DaemonConnector`,
//!   `BollardClient`, endpoint resolution)
//! - [`state`]: Ambient daemon state shared with renderers (`DaemonState`)
//! - [`context`]: Context building (`ContextBuilder`)
//! - [`debounce`]: Burst-collapsing event stream adapter
//! - [`render`]: Renderer contract (`TemplateRenderer`)
//! - [`notify`]: Render-and-notify pipeline (`Notifier`)
//! - [`events`]: The event loop owning the daemon subscription
//! - [`signals`]: Per-task OS signal subscriptions
//! - [`generator`]: Top-level coordinator (`Generator`)

pub mod context;
pub mod debounce;
pub mod docker;
pub mod error;
pub mod events;
pub mod generator;
pub mod notify;
pub mod render;
pub mod signals;
pub mod state;

// --- Public API Re-exports ---

// Generator (main coordinator)
pub use generator::{Generator, GeneratorConfig};

// Error
pub use error::EngineError;

// Daemon API
pub use docker::{
    resolve_endpoint, BollardClient, BollardConnector, ContainerDetails, DaemonClient,
    DaemonConnector, DaemonEvent, DaemonEventKind, Endpoint, EventSubscription, TlsSettings,
    DEFAULT_ENDPOINT,
};

// Context building and ambient state
pub use context::ContextBuilder;
pub use state::DaemonState;

// Rendering and notification
pub use notify::Notifier;
pub use render::TemplateRenderer;

// Debouncing
pub use debounce::debounce;

// Signals
pub use signals::{SignalEvent, SignalListener};
