//! Generator configuration.

use std::fmt;
use std::str::FromStr;

pub const DEFAULT_DEV_IMAGE: &str = "rustvmm/dev";
pub const DEFAULT_CONTAINER_VERSION: &str = "v27";
pub const DEFAULT_DOCKER_PLUGIN_VERSION: &str = "v5.3.0";

/// What to do when an agent-tag override names a test that has no step
/// on the override's platform class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MismatchPolicy {
    /// Leave the override unapplied for that test.
    #[default]
    Skip,
    /// Abort generation.
    Fail,
}

impl FromStr for MismatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(MismatchPolicy::Skip),
            "fail" => Ok(MismatchPolicy::Fail),
            other => Err(format!("unknown mismatch policy {:?} (expected skip or fail)", other)),
        }
    }
}

impl fmt::Display for MismatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchPolicy::Skip => write!(f, "skip"),
            MismatchPolicy::Fail => write!(f, "fail"),
        }
    }
}

/// Constants that shape every generated step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Container image name, without tag.
    pub dev_image: String,
    /// Tag of the container image.
    pub container_version: String,
    /// Version of the docker plugin, as in `docker#v5.3.0`.
    pub docker_plugin_version: String,
    pub mismatch_policy: MismatchPolicy,
}

impl GeneratorConfig {
    /// Full image reference, e.g. `rustvmm/dev:v27`.
    pub fn image(&self) -> String {
        format!("{}:{}", self.dev_image, self.container_version)
    }

    /// Key of the docker plugin entry, e.g. `docker#v5.3.0`.
    pub fn docker_plugin_key(&self) -> String {
        format!("docker#{}", self.docker_plugin_version)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            dev_image: DEFAULT_DEV_IMAGE.to_string(),
            container_version: DEFAULT_CONTAINER_VERSION.to_string(),
            docker_plugin_version: DEFAULT_DOCKER_PLUGIN_VERSION.to_string(),
            mismatch_policy: MismatchPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::default();
        assert_eq!(config.image(), "rustvmm/dev:v27");
        assert_eq!(config.docker_plugin_key(), "docker#v5.3.0");
        assert_eq!(config.mismatch_policy, MismatchPolicy::Skip);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("fail".parse::<MismatchPolicy>(), Ok(MismatchPolicy::Fail));
        assert_eq!("skip".parse::<MismatchPolicy>(), Ok(MismatchPolicy::Skip));
        assert!("maybe".parse::<MismatchPolicy>().is_err());
    }
}
