//! Bind planning: turn tagged host paths into bind mounts and argument
//! rewrites.
//!
//! Planning runs in two phases over an immutable snapshot of the requested
//! paths. The first phase only inspects the host (existence, access); the
//! second creates missing output directories and builds the bindings. A
//! missing input therefore fails the job before any directory is created.

use std::collections::{BTreeMap, BTreeSet};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use container_runtime::{Mount, MountAccess};
use nix::unistd::{access, AccessFlags};
use tracing::debug;
use uuid::Uuid;

use crate::annotation::{AnnotatedArgument, PathMode};
use crate::error::{AccessKind, PlanError};
use crate::qualify::{qualify_path_from, CanonicalPath, QualifiedPath};

/// Default parent directory for in-container mount points.
pub const DEFAULT_MOUNT_ROOT: &str = "/tmp";

/// Permissions for output directories created on the host.
const OUTPUT_DIR_MODE: u32 = 0o700;

/// Planner settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Container directory under which every mount prefix is generated
    pub mount_root: PathBuf,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            mount_root: PathBuf::from(DEFAULT_MOUNT_ROOT),
        }
    }
}

impl PlannerConfig {
    /// Validated config; the mount root must be absolute.
    pub fn new(mount_root: impl Into<PathBuf>) -> Result<Self, PlanError> {
        let mount_root = mount_root.into();
        if !mount_root.is_absolute() {
            return Err(PlanError::InvalidMountRoot(mount_root));
        }
        Ok(Self { mount_root })
    }

    /// Fresh `<mount_root>/<uuid>` prefix, without a trailing separator.
    pub fn mount_prefix(&self) -> String {
        let root = self.mount_root.to_string_lossy();
        format!(
            "{}/{}",
            root.trim_end_matches('/'),
            Uuid::new_v4().simple()
        )
    }
}

/// Everything the job asked of one canonical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRequest {
    pub qualified: QualifiedPath,
    pub modes: BTreeSet<PathMode>,
    /// Argument positions that named this path
    pub indices: Vec<usize>,
}

impl PathRequest {
    pub fn is_input(&self) -> bool {
        self.modes.contains(&PathMode::Input)
    }

    pub fn is_output(&self) -> bool {
        self.modes.contains(&PathMode::Output)
    }
}

/// Qualify every tagged argument against `base` and merge arguments that
/// name the same canonical path.
pub fn collect_paths(
    args: &[AnnotatedArgument],
    base: &Path,
) -> BTreeMap<CanonicalPath, PathRequest> {
    let mut requests: BTreeMap<CanonicalPath, PathRequest> = BTreeMap::new();
    for arg in args {
        let Some(mode) = arg.tag.mode() else {
            continue;
        };
        let qualified = qualify_path_from(base, &arg.text);
        let request = requests
            .entry(qualified.canonical.clone())
            .or_insert_with(|| PathRequest {
                qualified,
                modes: BTreeSet::new(),
                indices: Vec::new(),
            });
        request.modes.insert(mode);
        request.indices.push(arg.index);
    }
    requests
}

/// One bind mount, shared by every argument naming the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathBinding {
    pub canonical: CanonicalPath,
    pub modes: BTreeSet<PathMode>,
    pub host_source: String,
    pub container_target: String,
    pub access: MountAccess,
    /// In-container path substituted for every argument naming this path
    pub argument_path: String,
    pub indices: Vec<usize>,
}

impl PathBinding {
    pub fn to_mount(&self) -> Mount {
        Mount {
            host_source: self.host_source.clone(),
            container_target: self.container_target.clone(),
            access: self.access,
        }
    }
}

/// Planner output: bindings plus the argument substitutions they imply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindPlan {
    pub bindings: Vec<PathBinding>,
    /// Argument index to in-container path
    pub rewrites: BTreeMap<usize, String>,
}

impl BindPlan {
    /// Human-readable bind table, host sources shown relative to `cwd` when
    /// they live under it.
    pub fn bind_table(&self, cwd: &Path) -> Vec<String> {
        let mut lines: Vec<String> = self
            .bindings
            .iter()
            .map(|binding| {
                let source = Path::new(&binding.host_source);
                let mut shown = match source.strip_prefix(cwd) {
                    Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
                    Ok(rel) => rel.to_string_lossy().into_owned(),
                    Err(_) => binding.host_source.clone(),
                };
                if binding.host_source.ends_with('/') && !shown.ends_with('/') {
                    shown.push('/');
                }
                format!(
                    "'{}': {} ({})",
                    shown, binding.container_target, binding.access
                )
            })
            .collect();
        lines.sort();
        lines
    }
}

/// Builds a [`BindPlan`] from collected path requests.
#[derive(Debug, Clone, Default)]
pub struct BindPlanner {
    config: PlannerConfig,
}

impl BindPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn plan(
        &self,
        requests: &BTreeMap<CanonicalPath, PathRequest>,
    ) -> Result<BindPlan, PlanError> {
        for request in requests.values() {
            validate(request)?;
        }

        let mut plan = BindPlan::default();
        for request in requests.values() {
            let binding = self.bind(request)?;
            for &index in &binding.indices {
                plan.rewrites.insert(index, binding.argument_path.clone());
            }
            plan.bindings.push(binding);
        }
        Ok(plan)
    }

    fn bind(&self, request: &PathRequest) -> Result<PathBinding, PlanError> {
        let qualified = &request.qualified;
        let canonical = &qualified.canonical;
        let prefix = self.config.mount_prefix();
        let self_target = format!("{}/{}", prefix, canonical.basename());
        let argument_path = self_target.clone();

        let (host_source, container_target, access) = if request.is_output() {
            let parent = canonical.parent_dir();
            if !qualified.exists {
                create_output_dir(parent)?;
                check_access(parent, AccessKind::Write)?;
                (parent.to_string(), format!("{prefix}/"), MountAccess::ReadWrite)
            } else {
                (canonical.to_string(), self_target, MountAccess::ReadWrite)
            }
        } else {
            (canonical.to_string(), self_target, MountAccess::ReadOnly)
        };

        debug!(
            path = %canonical,
            source = %host_source,
            target = %container_target,
            access = %access,
            "Planned bind"
        );

        Ok(PathBinding {
            canonical: canonical.clone(),
            modes: request.modes.clone(),
            host_source,
            container_target,
            access,
            argument_path,
            indices: request.indices.clone(),
        })
    }
}

/// Side-effect-free checks, run for every path before any directory is
/// created.
fn validate(request: &PathRequest) -> Result<(), PlanError> {
    let qualified = &request.qualified;
    let path = qualified.canonical.as_str();
    if request.is_input() {
        if !qualified.exists {
            return Err(PlanError::NotFound(path.to_string()));
        }
        check_access(path, AccessKind::Read)?;
    }
    if request.is_output() && qualified.exists {
        check_access(path, AccessKind::Write)?;
    }
    Ok(())
}

fn check_access(path: &str, kind: AccessKind) -> Result<(), PlanError> {
    let flags = match kind {
        AccessKind::Read => AccessFlags::R_OK,
        AccessKind::Write => AccessFlags::W_OK,
    };
    access(Path::new(path), flags).map_err(|_| PlanError::Permission {
        path: path.to_string(),
        access: kind,
    })
}

fn create_output_dir(path: &str) -> Result<(), PlanError> {
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(OUTPUT_DIR_MODE)
        .create(path)
        .map_err(|source| match source.kind() {
            std::io::ErrorKind::PermissionDenied => PlanError::Permission {
                path: path.to_string(),
                access: AccessKind::Write,
            },
            _ => PlanError::CreateDir {
                path: path.to_string(),
                source,
            },
        })
}
