use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pipegen::config::{
    DEFAULT_CONTAINER_VERSION, DEFAULT_DEV_IMAGE, DEFAULT_DOCKER_PLUGIN_VERSION,
};
use pipegen::{generate, GeneratorConfig, MismatchPolicy, Overrides, TestDescription};

#[derive(Parser)]
#[command(name = "pipegen", version)]
#[command(about = "Generate a Buildkite pipeline from a JSON test description")]
struct Cli {
    /// Test description to expand
    #[arg(short, long, default_value = ".buildkite/test_description.json")]
    test_description: PathBuf,

    /// Write the pipeline here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dev container image name
    #[arg(long, env = "PIPEGEN_DEV_IMAGE", default_value = DEFAULT_DEV_IMAGE)]
    image: String,

    /// Dev container image tag
    #[arg(long, env = "PIPEGEN_CONTAINER_VERSION", default_value = DEFAULT_CONTAINER_VERSION)]
    container_version: String,

    /// Buildkite docker plugin version
    #[arg(long, env = "PIPEGEN_DOCKER_PLUGIN_VERSION", default_value = DEFAULT_DOCKER_PLUGIN_VERSION)]
    docker_plugin_version: String,

    /// What to do when an agent override names a test with no step on its platform class
    #[arg(long, default_value_t = MismatchPolicy::Skip)]
    on_override_mismatch: MismatchPolicy,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "pipegen=debug" } else { "pipegen=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = GeneratorConfig {
        dev_image: cli.image,
        container_version: cli.container_version,
        docker_plugin_version: cli.docker_plugin_version,
        mismatch_policy: cli.on_override_mismatch,
    };

    let description = TestDescription::from_path(&cli.test_description).with_context(|| {
        format!(
            "failed to load test description {}",
            cli.test_description.display()
        )
    })?;
    let overrides = Overrides::from_env()?;
    let pipeline = generate(&description, &config, &overrides)?;

    // Rendered before the output file is created so failures leave nothing behind.
    let yaml = pipeline.to_yaml()?;
    match cli.output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_all(&mut BufWriter::new(file), &yaml)?;
        }
        None => write_all(&mut io::stdout().lock(), &yaml)?,
    }
    Ok(())
}

fn write_all<W: io::Write>(w: &mut W, yaml: &str) -> io::Result<()> {
    w.write_all(yaml.as_bytes())?;
    w.flush()
}
