//! Runtime configuration.

use crate::resource::{ResourceError, ResourceRegistry, MAX_RESOURCES};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Priority given to tasks when nobody picks one.
pub const DEFAULT_TASK_PRIORITY: u8 = 127;

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Resource declaration could not be registered
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),

    /// A value is outside its allowed range
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Settings for the gameplay task component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    /// Priority of tasks created without an explicit one
    pub default_priority: u8,

    /// Max passes of the event processing loop before pending events are dropped
    pub max_event_iterations: usize,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            default_priority: DEFAULT_TASK_PRIORITY,
            max_event_iterations: 16,
        }
    }
}

/// Settings for the pawn actions component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Max action events processed in a single tick
    pub max_events_per_tick: usize,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self { max_events_per_tick: 64 }
    }
}

/// Settings for the latent test harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Simulated seconds per tick
    pub tick_interval: f32,

    /// Upper bound of update calls for a latent test
    pub max_latent_ticks: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tick_interval: 1.0 / 30.0,
            max_latent_ticks: 600,
        }
    }
}

/// Declaration of one resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDecl {
    /// Resource name
    pub name: String,

    /// Fixed index, or `None` for the next free one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u8>,
}

impl ResourceDecl {
    /// Declare a resource with an automatic index.
    pub fn auto(name: impl Into<String>) -> Self {
        Self { name: name.into(), id: None }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Gameplay task settings
    pub tasks: TasksConfig,

    /// Pawn action settings
    pub actions: ActionsConfig,

    /// Test harness settings
    pub harness: HarnessConfig,

    /// Resource kinds, registered in order
    pub resources: Vec<ResourceDecl>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tasks: TasksConfig::default(),
            actions: ActionsConfig::default(),
            harness: HarnessConfig::default(),
            resources: ["Movement", "Logic", "Animation", "Perception"]
                .into_iter()
                .map(ResourceDecl::auto)
                .collect(),
        }
    }
}

impl RuntimeConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tasks.max_event_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "tasks.max_event_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.actions.max_events_per_tick == 0 {
            return Err(ConfigError::Invalid {
                field: "actions.max_events_per_tick",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.harness.tick_interval > 0.0) {
            return Err(ConfigError::Invalid {
                field: "harness.tick_interval",
                reason: format!("must be positive, got {}", self.harness.tick_interval),
            });
        }
        if self.resources.len() > MAX_RESOURCES {
            return Err(ConfigError::Invalid {
                field: "resources",
                reason: format!(
                    "{} declarations exceed the limit of {}",
                    self.resources.len(),
                    MAX_RESOURCES
                ),
            });
        }
        Ok(())
    }

    /// Build a registry from the resource declarations.
    ///
    /// Pinned ids are registered first so automatic ones fill the gaps.
    pub fn build_registry(&self) -> Result<ResourceRegistry, ConfigError> {
        let mut registry = ResourceRegistry::new();
        for decl in self.resources.iter().filter(|d| d.id.is_some()) {
            if let Some(id) = decl.id {
                registry.register_with_id(&decl.name, id)?;
            }
        }
        for decl in self.resources.iter().filter(|d| d.id.is_none()) {
            registry.register(&decl.name)?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RuntimeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.tasks.default_priority, 127);
        assert_eq!(config.tasks.max_event_iterations, 16);

        let registry = config.build_registry().unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.id("Movement").map(|id| id.index()), Some(0));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{ "tasks": { "default_priority": 10 } }"#).unwrap();
        assert_eq!(config.tasks.default_priority, 10);
        assert_eq!(config.tasks.max_event_iterations, 16);
        assert_eq!(config.resources.len(), 4);
    }

    #[test]
    fn test_pinned_ids_registered_first() {
        let config = RuntimeConfig {
            resources: vec![
                ResourceDecl::auto("Movement"),
                ResourceDecl { name: "Logic".to_string(), id: Some(0) },
            ],
            ..Default::default()
        };
        let registry = config.build_registry().unwrap();
        assert_eq!(registry.id("Logic").map(|id| id.index()), Some(0));
        assert_eq!(registry.id("Movement").map(|id| id.index()), Some(1));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = RuntimeConfig::default();
        config.tasks.max_event_iterations = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let mut config = RuntimeConfig::default();
        config.harness.tick_interval = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gametask.json");

        let mut config = RuntimeConfig::default();
        config.harness.max_latent_ticks = 42;
        config.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
