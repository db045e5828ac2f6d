// crates/demoforge-cli/src/scenario.rs
//
// A scenario is a declarative step list, not a scripting language — the same
// choice this codebase already makes for the timeline itself (serde over a
// bespoke format). `compose` loads one from TOML and drives it twice: once
// dry (narration preprocessor) and once for real (capture).

use std::path::Path;

use serde::{Deserialize, Serialize};

use demoforge_core::error::{DemoforgeError, Result};
use demoforge_core::timeline::{SlideStyle, TransitionKind};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScenarioStep {
    Scene {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        slide: Option<SlideStyle>,
    },
    Navigate {
        url: String,
        #[serde(default)]
        narrate: Option<String>,
    },
    Click {
        selector: String,
        #[serde(default)]
        narrate: Option<String>,
    },
    Dblclick {
        selector: String,
        #[serde(default)]
        narrate: Option<String>,
    },
    Hover {
        selector: String,
        #[serde(default)]
        narrate: Option<String>,
    },
    Fill {
        selector: String,
        value: String,
        #[serde(default)]
        narrate: Option<String>,
    },
    Press {
        selector: String,
        key: String,
        #[serde(default)]
        narrate: Option<String>,
    },
    Wait {
        ms: u64,
    },
    Narrate {
        text: String,
    },
    Transition {
        #[serde(default = "default_transition_kind")]
        kind: TransitionKind,
        duration_ms: u64,
    },
}

fn default_transition_kind() -> TransitionKind {
    TransitionKind::Fade
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<ScenarioStep>,
}

pub fn load(path: &Path) -> Result<Scenario> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| DemoforgeError::Config(format!("cannot read scenario '{}': {e}", path.display())))?;
    toml::from_str(&raw)
        .map_err(|e| DemoforgeError::Config(format!("malformed scenario '{}': {e}", path.display())))
}

/// Every narration text a scenario will ask for, in call order: action-level
/// `narrate` options, `Narrate` steps, and `scene(_, slide.narrate)`.
pub fn narration_texts(scenario: &Scenario) -> Vec<String> {
    let mut texts = Vec::new();
    for step in &scenario.steps {
        match step {
            ScenarioStep::Scene { slide: Some(slide), .. } => {
                if let Some(text) = &slide.narrate {
                    texts.push(text.clone());
                }
            }
            ScenarioStep::Navigate { narrate: Some(t), .. }
            | ScenarioStep::Click { narrate: Some(t), .. }
            | ScenarioStep::Dblclick { narrate: Some(t), .. }
            | ScenarioStep::Hover { narrate: Some(t), .. }
            | ScenarioStep::Fill { narrate: Some(t), .. }
            | ScenarioStep::Press { narrate: Some(t), .. } => texts.push(t.clone()),
            ScenarioStep::Narrate { text } => texts.push(text.clone()),
            _ => {}
        }
    }
    texts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_scenario() {
        let toml = r#"
            name = "signup"

            [[steps]]
            step = "scene"
            title = "Welcome"

            [[steps]]
            step = "navigate"
            url = "https://example.com"

            [[steps]]
            step = "click"
            selector = "#signup"
            narrate = "Click sign up to get started"

            [[steps]]
            step = "wait"
            ms = 500
        "#;
        let scenario: Scenario = toml::from_str(toml).unwrap();
        assert_eq!(scenario.steps.len(), 4);
        assert_eq!(narration_texts(&scenario), vec!["Click sign up to get started".to_string()]);
    }
}
