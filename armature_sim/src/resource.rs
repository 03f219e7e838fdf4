//! Logical resource names to files on disk.
//!
//! Names look like `armature/manipulation/models/...`. Roots are searched in
//! order: explicit roots, then `ARMATURE_RESOURCE_ROOT` (colon separated),
//! then the resources bundled with this crate.

use crate::error::{SimError, SimResult};
use std::path::{Component, Path, PathBuf};

pub const RESOURCE_PREFIX: &str = "armature/";
pub const RESOURCE_ROOT_ENV: &str = "ARMATURE_RESOURCE_ROOT";

#[derive(Debug, Clone, Default)]
pub struct ResourceLocator {
    roots: Vec<PathBuf>,
}

impl ResourceLocator {
    /// Locator with no roots at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Explicit roots first, then the environment, then the bundled tree.
    pub fn standard(explicit: &[PathBuf]) -> Self {
        let mut locator = Self::empty();
        for root in explicit {
            locator.push_root(root.clone());
        }
        if let Ok(value) = std::env::var(RESOURCE_ROOT_ENV) {
            for root in std::env::split_paths(&value) {
                if !root.as_os_str().is_empty() {
                    locator.push_root(root);
                }
            }
        }
        locator.push_root(Self::bundled_root());
        locator
    }

    pub fn bundled_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("resources")
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.push_root(root.into());
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve `name` to an existing file.
    pub fn find_resource(&self, name: &str) -> SimResult<PathBuf> {
        let relative = Self::relative_path(name)?;
        for root in &self.roots {
            let candidate = root.join(relative);
            if candidate.is_file() {
                tracing::debug!(resource = name, path = %candidate.display(), "resource resolved");
                return Ok(candidate);
            }
        }
        Err(SimError::ResourceNotFound {
            name: name.to_string(),
            searched: self.roots.clone(),
        })
    }

    fn push_root(&mut self, root: PathBuf) {
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
    }

    fn relative_path(name: &str) -> SimResult<&Path> {
        let invalid = |reason: &str| SimError::InvalidResourceName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let rest = name
            .strip_prefix(RESOURCE_PREFIX)
            .ok_or_else(|| invalid("must start with 'armature/'"))?;
        if rest.is_empty() {
            return Err(invalid("empty path after prefix"));
        }

        let path = Path::new(rest);
        for component in path.components() {
            match component {
                Component::Normal(_) => {}
                Component::ParentDir => return Err(invalid("'..' is not allowed")),
                _ => return Err(invalid("must be a relative path")),
            }
        }
        Ok(path)
    }
}

/// Resolve `name` with the standard search order.
pub fn resolve_resource(name: &str) -> SimResult<PathBuf> {
    ResourceLocator::standard(&[]).find_resource(name)
}
