// ABOUTME: Directory-convention discovery of agent apps: scan sub-directories for the two-file pair.
// ABOUTME: Invalid or incomplete directories are skipped with a log line, never a fatal error.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::agent::{AgentGraph, GraphError};
use crate::manifest::{AppManifest, ManifestError};
use crate::{AGENTS_FILE, MANIFEST_FILE};

/// Errors produced while loading a single app directory.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} not found in {1:?}")]
    MissingFile(&'static str, PathBuf),

    #[error("manifest error in {path:?}: {source}")]
    Manifest {
        path: PathBuf,
        source: ManifestError,
    },

    #[error("agent graph error in {path:?}: {source}")]
    Graph { path: PathBuf, source: GraphError },
}

/// A discovered, fully parsed agent application.
#[derive(Debug, Clone)]
pub struct AgentApp {
    pub manifest: AppManifest,
    pub graph: AgentGraph,
    pub dir: PathBuf,
}

impl AgentApp {
    /// The app's name from its manifest.
    pub fn name(&self) -> &str {
        &self.manifest.app.name
    }
}

/// Load a single app directory containing agentdock.toml and agents.yaml.
pub fn load_app(dir: &Path) -> Result<AgentApp, DiscoveryError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Err(DiscoveryError::MissingFile(MANIFEST_FILE, dir.to_path_buf()));
    }
    let agents_path = dir.join(AGENTS_FILE);
    if !agents_path.is_file() {
        return Err(DiscoveryError::MissingFile(AGENTS_FILE, dir.to_path_buf()));
    }

    let manifest_text = fs::read_to_string(&manifest_path)?;
    let manifest = AppManifest::parse_toml(&manifest_text).map_err(|source| {
        DiscoveryError::Manifest {
            path: manifest_path,
            source,
        }
    })?;

    let graph_text = fs::read_to_string(&agents_path)?;
    let graph = AgentGraph::parse_yaml(&graph_text).map_err(|source| DiscoveryError::Graph {
        path: agents_path,
        source,
    })?;

    Ok(AgentApp {
        manifest,
        graph,
        dir: dir.to_path_buf(),
    })
}

/// Scan the immediate sub-directories of `root` for agent apps.
///
/// A sub-directory is an app candidate when it contains both convention
/// files. Candidates that fail to parse or validate are logged and skipped;
/// hidden directories are ignored. The result is sorted by app name so
/// discovery order is stable across platforms.
pub fn discover_apps(root: &Path) -> Result<Vec<AgentApp>, std::io::Error> {
    let mut apps = Vec::new();

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let dir_name = entry.file_name();
        if dir_name.to_string_lossy().starts_with('.') {
            continue;
        }
        if !path.join(MANIFEST_FILE).is_file() || !path.join(AGENTS_FILE).is_file() {
            tracing::debug!(dir = %path.display(), "skipping directory without app files");
            continue;
        }

        match load_app(&path) {
            Ok(app) => {
                tracing::info!(app = app.name(), dir = %path.display(), "discovered app");
                apps.push(app);
            }
            Err(e) => {
                tracing::warn!(dir = %path.display(), error = %e, "skipping invalid app");
            }
        }
    }

    apps.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(apps)
}
