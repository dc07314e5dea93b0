//! Test description input.
//!
//! The input document looks like:
//!
//! ```json
//! { "tests": [
//!     { "test_name": "build-gnu",
//!       "command": "cargo build --release --target {target_platform}-unknown-linux-gnu",
//!       "platform": ["x86_64", "aarch64"],
//!       "docker_plugin": { "privileged": true } }
//! ] }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Placeholder substituted with the platform identifier in test commands.
pub const PLATFORM_PLACEHOLDER: &str = "{target_platform}";

// =============================================================================
// VALIDATED TYPES
// =============================================================================

/// One named test, expanded into a step per platform.
#[derive(Debug, Clone, PartialEq)]
pub struct TestSpec {
    pub name: String,
    /// Command template, may contain [`PLATFORM_PLACEHOLDER`].
    pub command: String,
    /// Never empty.
    pub platforms: Vec<String>,
    /// Per-test keys merged into the docker plugin configuration.
    pub docker_plugin: Map<String, Value>,
}

/// A parsed and validated test description.
#[derive(Debug, Clone, PartialEq)]
pub struct TestDescription {
    tests: Vec<TestSpec>,
}

impl TestDescription {
    /// Parses and validates a JSON test description.
    pub fn from_json(input: &str) -> Result<Self> {
        let raw: RawDescription = serde_json::from_str(input)?;
        raw.validate()
    }

    /// Reads and validates a test description file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "reading test description");
        let input = fs::read_to_string(path)?;
        Self::from_json(&input)
    }

    /// Tests in document order.
    pub fn tests(&self) -> &[TestSpec] {
        &self.tests
    }

    /// Looks up a test by name.
    pub fn get(&self, name: &str) -> Option<&TestSpec> {
        self.tests.iter().find(|t| t.name == name)
    }
}

// =============================================================================
// RAW INPUT
// =============================================================================

#[derive(Deserialize)]
struct RawDescription {
    #[serde(default)]
    tests: Vec<RawTest>,
}

#[derive(Deserialize)]
struct RawTest {
    test_name: Option<String>,
    command: Option<String>,
    platform: Option<Vec<String>>,
    #[serde(default)]
    docker_plugin: Option<Map<String, Value>>,
}

impl RawDescription {
    fn validate(self) -> Result<TestDescription> {
        if self.tests.is_empty() {
            return Err(Error::NoTests);
        }

        let mut seen = HashSet::new();
        let mut tests = Vec::with_capacity(self.tests.len());
        for (index, raw) in self.tests.into_iter().enumerate() {
            let test = raw.validate(index)?;
            if !seen.insert(test.name.clone()) {
                return Err(Error::DuplicateTest { test: test.name });
            }
            tests.push(test);
        }
        Ok(TestDescription { tests })
    }
}

impl RawTest {
    fn validate(self, index: usize) -> Result<TestSpec> {
        let missing = |field| Error::MissingField { index, field };

        let name = self
            .test_name
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("test_name"))?;
        let command = self
            .command
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("command"))?;
        let platforms = self.platform.ok_or_else(|| missing("platform"))?;
        if platforms.is_empty() {
            return Err(Error::EmptyPlatforms { test: name });
        }
        if platforms.iter().any(|p| p.is_empty()) {
            return Err(missing("platform"));
        }

        Ok(TestSpec {
            name,
            command,
            platforms,
            docker_plugin: self.docker_plugin.unwrap_or_default(),
        })
    }
}
