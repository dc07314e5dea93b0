//! Error type for pipeline generation.

use thiserror::Error;

use crate::PlatformClass;

/// Everything that can stop a generation run.
///
/// All variants are fatal: the generator never emits partial output.
#[derive(Debug, Error)]
pub enum Error {
    /// A test entry is missing `test_name`, `command` or `platform`, or has it empty.
    #[error("test entry #{index} is missing required field {field:?}")]
    MissingField { index: usize, field: &'static str },

    /// A step was requested with an empty name, command or platform.
    #[error("cannot build step: {field} is empty")]
    EmptyStepField { field: &'static str },

    /// The test description has no tests at all.
    #[error("test description contains no tests")]
    NoTests,

    /// A test lists no platforms.
    #[error("test {test:?} has an empty platform list")]
    EmptyPlatforms { test: String },

    /// Two tests share a name.
    #[error("test {test:?} is defined more than once")]
    DuplicateTest { test: String },

    /// An override variable is set but is not a valid override document.
    #[error("malformed override in {var}: {source}")]
    MalformedOverride {
        var: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// An agent-tag override names a test with no step on its platform class.
    #[error("{var} names test {test:?}, which has no {class} step")]
    OverrideMismatch {
        var: &'static str,
        test: String,
        class: PlatformClass,
    },

    #[error("invalid test description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
