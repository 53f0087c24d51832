//! Job preparation pipeline: annotate, qualify, plan, rewrite.
//!
//! Everything here runs before the container runtime is contacted, so a
//! syntax or path error never leaves a container behind.

use std::path::Path;

use container_runtime::Mount;
use tracing::debug;

use crate::annotation::parse_annotations;
use crate::error::{PlanError, Result};
use crate::plan::{collect_paths, BindPlanner, PathBinding, PlannerConfig};
use crate::rewrite::rewrite_arguments;

/// A fully planned job: the container command plus its bind mounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub args: Vec<String>,
    pub bindings: Vec<PathBinding>,
}

impl Job {
    pub fn mounts(&self) -> Vec<Mount> {
        self.bindings.iter().map(PathBinding::to_mount).collect()
    }
}

/// Prepare `raw` job arguments relative to the current working directory.
pub fn prepare_job<S: AsRef<str>>(raw: &[S], config: &PlannerConfig) -> Result<Job> {
    let cwd = std::env::current_dir().map_err(PlanError::WorkingDirectory)?;
    prepare_job_in(raw, config, &cwd)
}

/// Prepare `raw` job arguments with relative paths resolved against `base`.
pub fn prepare_job_in<S: AsRef<str>>(
    raw: &[S],
    config: &PlannerConfig,
    base: &Path,
) -> Result<Job> {
    let annotated = parse_annotations(raw)?;
    let requests = collect_paths(&annotated, base);
    let plan = BindPlanner::new(config.clone()).plan(&requests)?;

    let table = plan.bind_table(base);
    if table.is_empty() {
        debug!("path_binds={{}}");
    } else {
        debug!("path_binds={{\n  {}\n}}", table.join("\n  "));
    }

    let args = rewrite_arguments(&annotated, &plan.rewrites);
    debug!(job_args = ?args, "Rewrote job arguments");

    Ok(Job {
        args,
        bindings: plan.bindings,
    })
}
