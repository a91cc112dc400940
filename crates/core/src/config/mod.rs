use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Category, Owner, Result, Shortcut};

/// Top-level configuration: timer defaults plus the bindings and stage
/// handlers a profile starts with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timing: TimingConfig,
    pub bindings: Vec<BindingConfig>,
    pub stages: Vec<StageConfig>,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

/// Configuration specific to the timing subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Frame rate assumed until the host reports a measured one.
    pub nominal_frame_rate: f32,
    /// Period given to timers registered without one.
    pub default_period_ms: i64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            nominal_frame_rate: 60.0,
            default_period_ms: 40,
        }
    }
}

/// A shortcut → handler binding declared up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Delegate owning the handler; the grabber when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub shortcut: Shortcut,
    pub handler: String,
    /// Event category the handler was registered for.
    #[serde(default)]
    pub accepts: Category,
}

impl BindingConfig {
    pub fn owner(&self) -> Owner {
        Owner::from(self.owner.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub stage: String,
}

impl StageConfig {
    pub fn owner(&self) -> Owner {
        Owner::from(self.owner.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{HandlerRegistry, Modifiers, Profile};

    const CONFIG: &str = r#"{
        "timing": { "nominal_frame_rate": 30.0 },
        "bindings": [
            { "shortcut": { "kind": "Motion", "id": 0 }, "handler": "rotate", "accepts": "Motion" },
            { "shortcut": { "kind": "Keyboard", "id": 82, "modifiers": "CTRL" }, "handler": "reset" },
            { "owner": "hud", "shortcut": { "kind": "Keyboard", "id": 72 }, "handler": "toggle" }
        ],
        "stages": [
            { "stage": "initMotion" },
            { "stage": "initWheel" }
        ]
    }"#;

    #[test]
    fn parses_partial_documents_with_defaults() {
        let config = EngineConfig::from_json_str(CONFIG).unwrap();

        assert_eq!(config.timing.nominal_frame_rate, 30.0);
        assert_eq!(config.timing.default_period_ms, 40);
        assert_eq!(config.bindings.len(), 3);
        assert_eq!(config.bindings[1].accepts, Category::Generic);
        assert_eq!(
            config.bindings[1].shortcut,
            Shortcut::keyboard(82, Modifiers::CTRL)
        );
        assert_eq!(config.bindings[2].owner(), Owner::delegate("hud"));
    }

    #[test]
    fn applies_what_resolves_and_skips_the_rest() {
        let config = EngineConfig::from_json_str(CONFIG).unwrap();
        let mut registry = HandlerRegistry::<u32>::new();
        registry
            .action("rotate", Category::Motion, |turns, _| {
                *turns += 1;
                Ok(())
            })
            .action("reset", Category::Generic, |turns, _| {
                *turns = 0;
                Ok(())
            })
            .stage("initMotion", Category::Motion, |_, _| Ok(true));
        let mut profile = Profile::new(Rc::new(registry));

        // `toggle` has no registered handler and `initWheel` is not a stage.
        assert_eq!(profile.apply_config(&config), 3);
        assert!(profile.has_binding(&Shortcut::motion(0, Modifiers::empty())));
        assert!(!profile.has_binding(&Shortcut::keyboard(72, Modifiers::empty())));
        assert!(profile.has_stage_handler("initMotion"));
    }

    #[test]
    fn empty_document_is_the_default() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert!(config.bindings.is_empty());
        assert_eq!(config.timing.nominal_frame_rate, 60.0);
    }

    #[test]
    fn load_reports_missing_files() {
        let err = EngineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, crate::BiasError::Io(_)));
    }
}
