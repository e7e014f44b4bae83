//! Core configuration.

use crate::context::RECEIVER_ROUTE;
use std::fmt;
use std::str::FromStr;

/// How the embedding process runs, which decides how boot-time declaration
/// errors surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Errors are logged and never raised.
    Production,
    /// Errors are logged and raised.
    #[default]
    Development,
    /// Errors are raised without logging.
    Test,
}

impl ExecutionMode {
    /// Whether declaration errors are written to the log.
    #[must_use]
    pub const fn logs_declaration_errors(self) -> bool {
        !matches!(self, ExecutionMode::Test)
    }

    /// Whether declaration errors abort startup.
    #[must_use]
    pub const fn raises_declaration_errors(self) -> bool {
        !matches!(self, ExecutionMode::Production)
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(ExecutionMode::Production),
            "dev" | "development" => Ok(ExecutionMode::Development),
            "test" => Ok(ExecutionMode::Test),
            other => Err(format!("unknown execution mode: {other}")),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionMode::Production => "prod",
            ExecutionMode::Development => "dev",
            ExecutionMode::Test => "test",
        })
    }
}

/// Configuration shared by the core services.
#[derive(Debug, Clone)]
pub struct Config {
    /// Execution mode of the embedding process.
    pub mode: ExecutionMode,
    /// Attributes never propagated (auto-maintained timestamps).
    pub ignored_attributes: Vec<String>,
    /// Route tag that marks an execution context as incoming.
    pub receiver_route: String,
    /// Whether the journal store syncs after every write.
    pub sync_on_write: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            ignored_attributes: vec!["updatedAt".to_string()],
            receiver_route: RECEIVER_ROUTE.to_string(),
            sync_on_write: true,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the execution mode.
    #[must_use]
    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replaces the ignored attribute list.
    #[must_use]
    pub fn ignored_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the receiver route.
    #[must_use]
    pub fn receiver_route(mut self, route: impl Into<String>) -> Self {
        self.receiver_route = route.into();
        self
    }

    /// Sets whether the journal store syncs after every write.
    #[must_use]
    pub fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }
}
