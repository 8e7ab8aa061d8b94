use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::error::EventSystemError;

/// Lifecycle events emitted by the plugin manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginEventKind {
    Install,
    Uninstall,
    Activate,
    Deactivate,
    Update,
    /// A lifecycle operation failed after its own event was emitted
    Error,
}

impl PluginEventKind {
    pub const ALL: [PluginEventKind; 6] = [
        PluginEventKind::Install,
        PluginEventKind::Uninstall,
        PluginEventKind::Activate,
        PluginEventKind::Deactivate,
        PluginEventKind::Update,
        PluginEventKind::Error,
    ];

    /// Event name used as the registry key
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginEventKind::Install => "install",
            PluginEventKind::Uninstall => "uninstall",
            PluginEventKind::Activate => "activate",
            PluginEventKind::Deactivate => "deactivate",
            PluginEventKind::Update => "update",
            PluginEventKind::Error => "error",
        }
    }
}

impl fmt::Display for PluginEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginEventKind {
    type Err = EventSystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PluginEventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EventSystemError::UnknownEvent(s.to_string()))
    }
}

/// A single lifecycle notification
#[derive(Debug, Clone, Serialize)]
pub struct PluginEvent {
    pub kind: PluginEventKind,
    /// Plugin name, or the install source when the name is not known yet
    pub plugin: String,
    pub timestamp: DateTime<Utc>,
    /// Operation options, or the error message for `error` events
    pub data: serde_json::Value,
}

impl PluginEvent {
    pub fn new(kind: PluginEventKind, plugin: impl Into<String>) -> Self {
        Self {
            kind,
            plugin: plugin.into(),
            timestamp: Utc::now(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }
}
