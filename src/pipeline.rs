//! Expanding a test description into the full pipeline.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::config::{GeneratorConfig, MismatchPolicy};
use crate::description::TestDescription;
use crate::error::{Error, Result};
use crate::overrides::{platform_tag, Overrides, PlatformClass};
use crate::step::{Step, StepBuilder};

// =============================================================================
// PIPELINE DOCUMENT
// =============================================================================

/// The generated pipeline document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub steps: Vec<Step>,
}

impl Pipeline {
    /// Serializes the pipeline as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Writes the pipeline YAML to the given writer.
    pub fn emit_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let yaml = self.to_yaml()?;
        w.write_all(yaml.as_bytes())?;
        w.flush()?;
        Ok(())
    }
}

// =============================================================================
// GENERATION
// =============================================================================

/// Builds one step per (test, platform) pair, in document order.
pub struct PipelineBuilder<'a> {
    config: &'a GeneratorConfig,
    overrides: &'a Overrides,
    pipeline: Pipeline,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(config: &'a GeneratorConfig, overrides: &'a Overrides) -> Self {
        PipelineBuilder {
            config,
            overrides,
            pipeline: Pipeline::default(),
        }
    }

    /// Appends the steps for every test in `description`.
    pub fn add_description(mut self, description: &TestDescription) -> Result<Self> {
        if self.config.mismatch_policy == MismatchPolicy::Fail {
            check_agent_overrides(description, self.overrides)?;
        }

        let steps = StepBuilder::new(self.config, self.overrides);
        for test in description.tests() {
            if test.platforms.is_empty() {
                return Err(Error::EmptyPlatforms {
                    test: test.name.clone(),
                });
            }
            for platform in &test.platforms {
                self.pipeline.steps.push(steps.build(test, platform)?);
            }
        }
        Ok(self)
    }

    pub fn finish(self) -> Pipeline {
        tracing::info!(steps = self.pipeline.steps.len(), "generated pipeline");
        self.pipeline
    }
}

/// Generates the pipeline for a test description in one call.
pub fn generate(
    description: &TestDescription,
    config: &GeneratorConfig,
    overrides: &Overrides,
) -> Result<Pipeline> {
    Ok(PipelineBuilder::new(config, overrides)
        .add_description(description)?
        .finish())
}

/// Every test named by an agent-tag override must have a step on that class.
fn check_agent_overrides(description: &TestDescription, overrides: &Overrides) -> Result<()> {
    for class in PlatformClass::ALL {
        let Some(doc) = overrides.agents_for(class) else {
            continue;
        };
        for name in &doc.tests {
            let on_class = description.get(name).is_some_and(|test| {
                test.platforms
                    .iter()
                    .any(|p| PlatformClass::from_tag(platform_tag(p)) == Some(class))
            });
            if !on_class {
                return Err(Error::OverrideMismatch {
                    var: class.agents_var(),
                    test: name.clone(),
                    class,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::OverrideDoc;
    use serde_json::json;

    const DESCRIPTION: &str = r#"{"tests": [
        {"test_name": "build-gnu",
         "command": "cargo build --release --target {target_platform}-unknown-linux-gnu",
         "platform": ["x86_64", "aarch64"]},
        {"test_name": "unittests",
         "command": "cargo test --target {target_platform}",
         "platform": ["aarch64"],
         "docker_plugin": {"devices": ["/dev/kvm"]}},
        {"test_name": "clippy",
         "command": "cargo clippy --all -- -D warnings",
         "platform": ["x86_64"]}
    ]}"#;

    fn description() -> TestDescription {
        TestDescription::from_json(DESCRIPTION).unwrap()
    }

    fn agents_override(tests: &[&str]) -> OverrideDoc {
        OverrideDoc {
            tests: tests.iter().map(|s| s.to_string()).collect(),
            cfg: json!({"platform": "x86_64.metal", "device": "gpu"})
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    #[test]
    fn test_step_count_and_order() {
        let pipeline = generate(
            &description(),
            &GeneratorConfig::default(),
            &Overrides::default(),
        )
        .unwrap();

        let labels: Vec<_> = pipeline.steps.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "build-gnu-x86_64",
                "build-gnu-aarch64",
                "unittests-aarch64",
                "clippy-x86_64"
            ]
        );
        assert_eq!(
            pipeline.steps[1].command,
            "cargo build --release --target aarch64-unknown-linux-gnu"
        );
    }

    #[test]
    fn test_yaml_key_order() {
        let pipeline = generate(
            &description(),
            &GeneratorConfig::default(),
            &Overrides::default(),
        )
        .unwrap();
        let yaml = pipeline.to_yaml().unwrap();

        assert!(yaml.starts_with("steps:\n"));
        let first = yaml.split("- label:").nth(1).unwrap();
        let positions: Vec<_> = ["command:", "retry:", "agents:", "plugins:"]
            .iter()
            .map(|key| first.find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(yaml.contains("docker#v5.3.0"));
        assert!(yaml.contains("always-pull: true"));
        assert!(yaml.contains("platform: arm.metal"));
    }

    #[test]
    fn test_yaml_reserialization_is_stable() {
        let pipeline = generate(
            &description(),
            &GeneratorConfig::default(),
            &Overrides::default(),
        )
        .unwrap();
        let yaml = pipeline.to_yaml().unwrap();

        let reparsed: Pipeline = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(reparsed, pipeline);
        assert_eq!(reparsed.to_yaml().unwrap(), yaml);
    }

    #[test]
    fn test_emit_to_writer() {
        let pipeline = generate(
            &description(),
            &GeneratorConfig::default(),
            &Overrides::default(),
        )
        .unwrap();

        let mut buf = Vec::new();
        pipeline.emit_to(&mut buf).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_slice(&buf).unwrap();
        assert_eq!(value["steps"][3]["label"].as_str(), Some("clippy-x86_64"));
        assert_eq!(value["steps"][0]["retry"]["automatic"].as_bool(), Some(false));
    }

    #[test]
    fn test_mismatch_skipped_by_default() {
        let overrides = Overrides {
            x86_agents: Some(agents_override(&["unittests"])),
            ..Default::default()
        };
        let pipeline =
            generate(&description(), &GeneratorConfig::default(), &overrides).unwrap();
        assert_eq!(pipeline.steps[2].agents["platform"], "arm.metal");
        assert_eq!(pipeline.steps[2].agents["os"], "linux");
    }

    #[test]
    fn test_mismatch_fails_when_configured() {
        let config = GeneratorConfig {
            mismatch_policy: MismatchPolicy::Fail,
            ..Default::default()
        };
        let overrides = Overrides {
            x86_agents: Some(agents_override(&["unittests"])),
            ..Default::default()
        };
        let err = generate(&description(), &config, &overrides).unwrap_err();
        assert!(matches!(
            err,
            Error::OverrideMismatch {
                class: PlatformClass::X86_64,
                ref test,
                ..
            } if test == "unittests"
        ));
    }

    #[test]
    fn test_unknown_test_is_mismatch_under_fail() {
        let config = GeneratorConfig {
            mismatch_policy: MismatchPolicy::Fail,
            ..Default::default()
        };
        let overrides = Overrides {
            arm_agents: Some(agents_override(&["nonexistent"])),
            ..Default::default()
        };
        assert!(generate(&description(), &config, &overrides).is_err());
    }

    #[test]
    fn test_matching_override_passes_under_fail() {
        let config = GeneratorConfig {
            mismatch_policy: MismatchPolicy::Fail,
            ..Default::default()
        };
        let overrides = Overrides {
            x86_agents: Some(agents_override(&["build-gnu"])),
            ..Default::default()
        };
        let pipeline = generate(&description(), &config, &overrides).unwrap();
        assert_eq!(pipeline.steps[0].agents["device"], "gpu");
        assert!(pipeline.steps[0].agents.get("os").is_none());
        assert_eq!(pipeline.steps[1].agents["os"], "linux");
    }

    #[test]
    fn test_builder_accumulates_descriptions() {
        let config = GeneratorConfig::default();
        let overrides = Overrides::default();
        let extra = TestDescription::from_json(
            r#"{"tests": [{"test_name": "fmt", "command": "cargo fmt --check", "platform": ["x86_64"]}]}"#,
        )
        .unwrap();

        let pipeline = PipelineBuilder::new(&config, &overrides)
            .add_description(&description())
            .unwrap()
            .add_description(&extra)
            .unwrap()
            .finish();
        assert_eq!(pipeline.steps.len(), 5);
        assert_eq!(pipeline.steps[4].label, "fmt-x86_64");
    }
}
