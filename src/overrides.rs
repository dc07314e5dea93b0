//! Environment-sourced overrides.
//!
//! Operators can retarget individual tests without touching the test
//! description by exporting JSON documents of the form
//! `{"tests": ["name", ...], "cfg": {...}}` in:
//!
//! - [`X86_AGENTS_VAR`] - replaces the `agents` of matching x86_64 steps
//! - [`ARM_AGENTS_VAR`] - replaces the `agents` of matching arm steps
//! - [`DOCKER_PLUGIN_VAR`] - merged into the docker plugin config of matching steps

use std::env;
use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub const X86_AGENTS_VAR: &str = "X86_LINUX_AGENT_TAGS";
pub const ARM_AGENTS_VAR: &str = "AARCH64_LINUX_AGENT_TAGS";
pub const DOCKER_PLUGIN_VAR: &str = "DOCKER_PLUGIN_CONFIG";

// =============================================================================
// PLATFORM CLASS
// =============================================================================

/// The two architectures agent selection varies over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformClass {
    X86_64,
    Arm,
}

impl PlatformClass {
    /// Every class, in the order overrides are read.
    pub const ALL: [PlatformClass; 2] = [PlatformClass::X86_64, PlatformClass::Arm];

    /// Classifies an agent platform tag (see [`platform_tag`]).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "x86_64" => Some(PlatformClass::X86_64),
            "arm" => Some(PlatformClass::Arm),
            _ => None,
        }
    }

    /// Environment variable holding this class's agent-tag override.
    pub fn agents_var(self) -> &'static str {
        match self {
            PlatformClass::X86_64 => X86_AGENTS_VAR,
            PlatformClass::Arm => ARM_AGENTS_VAR,
        }
    }
}

impl fmt::Display for PlatformClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformClass::X86_64 => write!(f, "x86_64"),
            PlatformClass::Arm => write!(f, "arm"),
        }
    }
}

/// Agent platform tag for a platform identifier, without the `.metal` suffix.
///
/// `aarch64` agents are tagged `arm`; everything else passes through.
pub fn platform_tag(platform: &str) -> &str {
    match platform {
        "aarch64" => "arm",
        other => other,
    }
}

// =============================================================================
// OVERRIDE DOCUMENTS
// =============================================================================

/// One override fragment: which tests it targets and what to apply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OverrideDoc {
    pub tests: Vec<String>,
    pub cfg: Map<String, Value>,
}

impl OverrideDoc {
    /// Whether this override targets the named test.
    pub fn applies_to(&self, test: &str) -> bool {
        self.tests.iter().any(|t| t == test)
    }

    /// Parses a raw variable value. Empty or blank values mean "no override".
    pub fn parse(var: &'static str, raw: Option<&str>) -> Result<Option<Self>> {
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(None),
        };
        serde_json::from_str(raw)
            .map(Some)
            .map_err(|source| Error::MalformedOverride { var, source })
    }
}

/// All overrides for one generation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub x86_agents: Option<OverrideDoc>,
    pub arm_agents: Option<OverrideDoc>,
    pub docker_plugin: Option<OverrideDoc>,
}

impl Overrides {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads overrides through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |var: &'static str| {
            let doc = OverrideDoc::parse(var, lookup(var).as_deref())?;
            if let Some(doc) = &doc {
                tracing::debug!(var, tests = ?doc.tests, "loaded override");
            }
            Ok::<_, Error>(doc)
        };

        Ok(Overrides {
            x86_agents: read(X86_AGENTS_VAR)?,
            arm_agents: read(ARM_AGENTS_VAR)?,
            docker_plugin: read(DOCKER_PLUGIN_VAR)?,
        })
    }

    /// The agent-tag override for a platform class, if any.
    pub fn agents_for(&self, class: PlatformClass) -> Option<&OverrideDoc> {
        match class {
            PlatformClass::X86_64 => self.x86_agents.as_ref(),
            PlatformClass::Arm => self.arm_agents.as_ref(),
        }
    }
}
