//! docker-job - run a job in an ephemeral Docker container
//!
//! Arguments after `--` form the job's command. Host paths among them are
//! annotated so they can be bind-mounted:
//!
//! - `input:<path>` / `output:<path>` tags one argument
//! - `inputs: a b :inputs` / `outputs: x y :outputs` tags a block
//!
//! The exit code is the container's exit status, or 1 when docker-job itself
//! fails.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use container_runtime::{ApiVersion, DockerConfig, DockerRuntime, DEFAULT_TIMEOUT_SECS};
use docker_job_core::{
    prepare_job, JobRunner, JobSpan, PlannerConfig, RunOptions, DEFAULT_MOUNT_ROOT,
    FAILURE_EXIT_CODE,
};
use tracing::{error, Level};

#[derive(Parser, Debug)]
#[command(name = "docker-job")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Run a job in an ephemeral Docker container, binding the host paths named in its arguments",
    long_about = None
)]
struct Cli {
    /// Name of the image
    #[arg(value_name = "NAME[:TAG]")]
    image: String,

    /// Docker server API version: "auto" or MAJOR.MINOR
    #[arg(
        long,
        value_name = "VERSION",
        default_value = "auto",
        env = "DOCKER_JOB_SERVER_VERSION"
    )]
    server_version: ApiVersion,

    /// Docker API request timeout in seconds
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        env = "DOCKER_JOB_TIMEOUT"
    )]
    timeout: u64,

    /// Remove the image after the run
    #[arg(long)]
    remove_image: bool,

    /// Keep the container after the run
    #[arg(long)]
    keep_container: bool,

    /// Display debugging information
    #[arg(long)]
    debug: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Directory inside the container under which host paths are mounted
    #[arg(
        long,
        value_name = "DIR",
        default_value = DEFAULT_MOUNT_ROOT,
        env = "DOCKER_JOB_MOUNT_ROOT"
    )]
    mount_root: PathBuf,

    /// Job arguments
    #[arg(last = true, value_name = "JOB_ARGS")]
    job_args: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    docker_job_core::init_tracing(cli.json, level);

    match run(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            if cli.debug {
                error!("{:?}", e);
            } else {
                error!("{:#}", e);
            }
            ExitCode::from(FAILURE_EXIT_CODE)
        }
    }
}

async fn run(cli: &Cli) -> Result<u8> {
    let planner = PlannerConfig::new(&cli.mount_root)?;
    // paths are checked and planned before the daemon is contacted
    let job = {
        let _span = JobSpan::enter(&cli.image);
        prepare_job(&cli.job_args, &planner)?
    };

    let config = DockerConfig::from_env()
        .with_api_version(cli.server_version)
        .with_timeout_secs(cli.timeout);
    let runtime = DockerRuntime::connect(&config)
        .await
        .context("Failed to connect to Docker")?;

    let options = RunOptions {
        image: cli.image.clone(),
        keep_container: cli.keep_container,
        remove_image: cli.remove_image,
    };
    let runner = JobRunner::new(Arc::new(runtime), options);
    let outcome = runner.run(&job, interrupted(), &mut std::io::stdout()).await?;
    Ok(outcome.exit_code())
}

/// Completes on the first Ctrl-C. Never completes if the handler cannot be
/// installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_job_args_after_separator() {
        let cli = Cli::try_parse_from([
            "docker-job",
            "--keep-container",
            "alpine:3.19",
            "--",
            "wc",
            "-l",
            "input:notes.txt",
        ])
        .unwrap();

        assert_eq!(cli.image, "alpine:3.19");
        assert!(cli.keep_container);
        assert!(!cli.remove_image);
        assert_eq!(cli.job_args, vec!["wc", "-l", "input:notes.txt"]);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["docker-job", "busybox"]).unwrap();
        assert!(cli.job_args.is_empty());
        assert_eq!(cli.mount_root, PathBuf::from("/tmp"));
        assert_eq!(cli.timeout, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_timeout_flag() {
        let cli = Cli::try_parse_from(["docker-job", "--timeout", "30", "busybox"]).unwrap();
        assert_eq!(cli.timeout, 30);
        assert!(Cli::try_parse_from(["docker-job", "--timeout", "soon", "busybox"]).is_err());
    }

    #[test]
    fn test_server_version_pinned() {
        let cli =
            Cli::try_parse_from(["docker-job", "--server-version", "1.41", "busybox"]).unwrap();
        assert_eq!(
            cli.server_version,
            ApiVersion::Pinned {
                major: 1,
                minor: 41
            }
        );
    }

    #[test]
    fn test_server_version_rejects_garbage() {
        assert!(Cli::try_parse_from(["docker-job", "--server-version", "newest", "busybox"]).is_err());
    }

    #[test]
    fn test_image_is_required() {
        assert!(Cli::try_parse_from(["docker-job"]).is_err());
    }
}
