use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::assets::resolver::{AssetRole, ResolvedAssets};
use crate::foundation::error::{NewsreelError, NewsreelResult};

const ASSET_DIR: &str = "assets";

/// Scratch directory owned by one render run. Removed on drop.
#[derive(Debug)]
pub struct RunWorkspace {
    run_id: uuid::Uuid,
    dir: tempfile::TempDir,
}

impl RunWorkspace {
    /// Create a fresh workspace under `root` (or the system temp dir).
    pub fn create(root: Option<&Path>) -> NewsreelResult<Self> {
        let run_id = uuid::Uuid::new_v4();
        let prefix = format!("newsreel-run-{run_id}-");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)
                    .with_context(|| format!("create scratch root '{}'", root.display()))?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .context("create run workspace")?;
        std::fs::create_dir(dir.path().join(ASSET_DIR))
            .with_context(|| format!("create asset dir in '{}'", dir.path().display()))?;
        tracing::debug!(%run_id, path = %dir.path().display(), "created run workspace");
        Ok(Self { run_id, dir })
    }

    /// Unique id of this run.
    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    /// Workspace root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a named intermediate artifact.
    pub fn intermediate(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write every resolved asset to disk, one file per role.
    pub fn materialize(&self, assets: &ResolvedAssets) -> NewsreelResult<MaterializedAssets> {
        let mut paths = BTreeMap::new();
        for asset in assets.iter() {
            let path = self
                .dir
                .path()
                .join(ASSET_DIR)
                .join(format!("{}.{}", asset.role.file_stem(), asset.extension));
            std::fs::write(&path, asset.bytes.as_slice())
                .with_context(|| format!("materialize {} to '{}'", asset.role, path.display()))?;
            paths.insert(asset.role, path);
        }
        Ok(MaterializedAssets { paths })
    }

    /// Remove the workspace now, logging instead of failing when removal goes wrong.
    pub fn close(self) {
        let run_id = self.run_id;
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(
                %run_id,
                path = %path.display(),
                error = %e,
                "failed to remove run workspace"
            );
        }
    }
}

/// On-disk locations of a run's assets.
#[derive(Clone, Debug, Default)]
pub struct MaterializedAssets {
    paths: BTreeMap<AssetRole, PathBuf>,
}

impl MaterializedAssets {
    /// File holding the asset for `role`.
    pub fn path(&self, role: AssetRole) -> NewsreelResult<&Path> {
        self.paths
            .get(&role)
            .map(PathBuf::as_path)
            .ok_or_else(|| NewsreelError::graph(format!("{role} was never materialized")))
    }

    /// Number of materialized files.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// `true` when nothing was materialized.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/exec/workspace.rs"]
mod tests;
