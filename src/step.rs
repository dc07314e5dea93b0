//! Building a single pipeline step.
//!
//! A step starts from fixed defaults and then goes through the override
//! stages in order, each stage returning a fresh map:
//!
//! 1. per-test `docker_plugin` keys
//! 2. environment agent-tag override (replaces `agents` entirely)
//! 3. environment docker plugin override (wins over per-test keys)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::GeneratorConfig;
use crate::description::{TestSpec, PLATFORM_PLACEHOLDER};
use crate::error::{Error, Result};
use crate::overrides::{platform_tag, Overrides, PlatformClass, DOCKER_PLUGIN_VAR};

// =============================================================================
// STEP
// =============================================================================

/// One emitted pipeline step. Field order is the YAML key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub label: String,
    pub command: String,
    pub retry: Retry,
    pub agents: Map<String, Value>,
    pub plugins: Vec<Map<String, Value>>,
}

/// Retries are left to the operator; automatic retry is always off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retry {
    pub automatic: bool,
}

// =============================================================================
// DEFAULTS
// =============================================================================

/// `linux` agents tagged `<tag>.metal`.
pub fn default_agents(platform: &str) -> Map<String, Value> {
    let mut agents = Map::new();
    agents.insert("os".to_string(), Value::from("linux"));
    agents.insert(
        "platform".to_string(),
        Value::from(format!("{}.metal", platform_tag(platform))),
    );
    agents
}

/// The dev container image, always pulled.
pub fn default_docker_config(config: &GeneratorConfig) -> Map<String, Value> {
    let mut docker = Map::new();
    docker.insert("image".to_string(), Value::from(config.image()));
    docker.insert("always-pull".to_string(), Value::Bool(true));
    docker
}

/// Shallow merge: keys of `overlay` replace keys of `base`, new keys are appended.
pub fn merge_shallow(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in overlay {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

// =============================================================================
// BUILDER
// =============================================================================

/// Builds steps against a fixed configuration and set of overrides.
pub struct StepBuilder<'a> {
    config: &'a GeneratorConfig,
    overrides: &'a Overrides,
}

impl<'a> StepBuilder<'a> {
    pub fn new(config: &'a GeneratorConfig, overrides: &'a Overrides) -> Self {
        StepBuilder { config, overrides }
    }

    /// Builds the step for `test` on `platform`.
    pub fn build(&self, test: &TestSpec, platform: &str) -> Result<Step> {
        if test.name.is_empty() {
            return Err(Error::EmptyStepField { field: "test name" });
        }
        if test.command.is_empty() {
            return Err(Error::EmptyStepField { field: "command" });
        }
        if platform.is_empty() {
            return Err(Error::EmptyStepField { field: "platform" });
        }

        let label = format!("{}-{}", test.name, platform);
        let command = test.command.replace(PLATFORM_PLACEHOLDER, platform);

        let agents = self.apply_agent_override(&test.name, platform, default_agents(platform));

        let docker = merge_shallow(&default_docker_config(self.config), &test.docker_plugin);
        let docker = self.apply_docker_override(&test.name, docker);

        let mut plugin = Map::new();
        plugin.insert(self.config.docker_plugin_key(), Value::Object(docker));

        tracing::debug!(label = %label, "built step");

        Ok(Step {
            label,
            command,
            retry: Retry::default(),
            agents,
            plugins: vec![plugin],
        })
    }

    fn apply_agent_override(
        &self,
        test: &str,
        platform: &str,
        agents: Map<String, Value>,
    ) -> Map<String, Value> {
        let Some(class) = PlatformClass::from_tag(platform_tag(platform)) else {
            return agents;
        };
        match self.overrides.agents_for(class) {
            Some(doc) if doc.applies_to(test) => {
                tracing::debug!(test, %class, var = class.agents_var(), "replacing agents");
                doc.cfg.clone()
            }
            _ => agents,
        }
    }

    fn apply_docker_override(&self, test: &str, docker: Map<String, Value>) -> Map<String, Value> {
        match &self.overrides.docker_plugin {
            Some(doc) if doc.applies_to(test) => {
                tracing::debug!(test, var = DOCKER_PLUGIN_VAR, "merging docker plugin override");
                merge_shallow(&docker, &doc.cfg)
            }
            _ => docker,
        }
    }
}
