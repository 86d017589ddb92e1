#![doc = include_str!("../README.md")]

pub mod config;
pub mod context;
pub mod error;

// --- Main type re-exports ---
// Core types of each module are usable straight from the crate root.

// Errors
pub use error::{ConfigError, DockerError, TopogenError};

// Configuration
pub use config::{Config, ConfigFile, Wait};

// Context model
pub use context::{
    Address, ContainerState, Context, DaemonInfo, DaemonVersion, DockerImage, Mount, Network,
    RuntimeContainer, Service, ServiceNetwork, Services, SwarmNode, Volume,
};
