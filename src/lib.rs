//! Pipegen - Buildkite pipelines generated from a JSON test description
//!
//! Each test in the description becomes one step per platform it lists.
//! Steps run in the dev container on `linux` metal agents, and operators
//! can retarget individual tests through environment overrides.
//!
//! # Simple usage
//!
//! ```rust
//! use pipegen::{generate, GeneratorConfig, Overrides, TestDescription};
//!
//! let description = TestDescription::from_json(
//!     r#"{"tests": [{"test_name": "build",
//!                    "command": "cargo build --target {target_platform}",
//!                    "platform": ["x86_64", "aarch64"]}]}"#,
//! )
//! .unwrap();
//!
//! let pipeline = generate(&description, &GeneratorConfig::default(), &Overrides::default()).unwrap();
//! assert_eq!(pipeline.steps[1].label, "build-aarch64");
//! assert_eq!(pipeline.steps[1].agents["platform"], "arm.metal");
//!
//! print!("{}", pipeline.to_yaml().unwrap());
//! ```
//!
//! # With environment overrides
//!
//! ```rust,no_run
//! use pipegen::{generate, GeneratorConfig, Overrides, TestDescription};
//!
//! fn main() -> pipegen::Result<()> {
//!     let description = TestDescription::from_path(".buildkite/test_description.json")?;
//!     let overrides = Overrides::from_env()?;
//!     generate(&description, &GeneratorConfig::default(), &overrides)?
//!         .emit_to(&mut std::io::stdout())
//! }
//! ```

pub mod config;
pub mod description;
pub mod error;
pub mod overrides;
pub mod pipeline;
pub mod step;

pub use config::{GeneratorConfig, MismatchPolicy};
pub use description::{TestDescription, TestSpec, PLATFORM_PLACEHOLDER};
pub use error::{Error, Result};
pub use overrides::{OverrideDoc, Overrides, PlatformClass};
pub use pipeline::{generate, Pipeline, PipelineBuilder};
pub use step::{Retry, Step, StepBuilder};
