#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod blueprint;
pub mod config;
mod error;
mod executor;
pub mod live;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;
pub mod steps;
pub mod utils;

use std::fmt::Display;
use std::sync::Arc;

pub use crate::blueprint::{Blueprint, BoxFuture, Pipeline, TaskContext, TaskDef, TaskId};
pub use crate::config::Config;
pub use crate::error::*;
pub use crate::live::LiveReload;

/// Selects development or production behaviour of the site generator. The
/// value is passed to the generator in its environment and doesn't change
/// anything on this side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    /// Name of the environment variable carrying the mode.
    pub const VAR: &'static str = "NODE_ENV";

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide state shared by all tasks.
///
/// Created once at startup and cloned into every task invocation. Cloning is
/// cheap, both the configuration and the live-reload hub are shared.
#[derive(Debug, Clone)]
pub struct Env {
    /// Pipeline settings.
    pub config: Arc<Config>,
    /// Channel to the browsers connected to the development server.
    pub reload: LiveReload,
}

impl Env {
    pub fn new(config: Config) -> Self {
        let reload = LiveReload::new(config.server.root.clone());

        Self {
            config: Arc::new(config),
            reload,
        }
    }
}
