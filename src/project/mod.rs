//! Project directories, configuration loading and the per-project error log.
//!
//! A project is a named folder under the projects root holding everything the
//! pipeline reads and writes:
//!
//! ```text
//! config.json          {"selected_directory": "<abs-path>"}
//! file_list.json       {"<rel-subdir>": ["<base>", ...], ...}
//! sounds/<stem>.wav
//! spectrograms/<md5>.json
//! elbow_results.json
//! log.error
//! ```
//!
//! The directory picker and the shell that persist `config.json` and
//! `file_list.json` are external collaborators; this module only loads what
//! they wrote and bootstraps the directories.

mod error_log;
mod paths;

pub use error_log::ErrorLog;
pub use paths::ProjectPaths;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Errors that can occur while resolving or loading a project.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed {file}: {source}")]
    Malformed {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("selected_directory not found in config")]
    MissingSelectedDirectory,

    #[error("invalid project name: {0}")]
    InvalidName(String),

    #[error("no project named {0}")]
    NotFound(String),
}

/// The project inputs the pipeline consumes: the selected source directory
/// and the inventory mapping relative subdirectory (`.` for the root) to file
/// base names.
#[derive(Debug, Clone)]
pub struct ProjectData {
    pub selected_directory: PathBuf,
    pub file_list: BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct ProjectConfig {
    selected_directory: Option<PathBuf>,
}

impl ProjectData {
    /// Load `config.json` and `file_list.json` for a project.
    pub async fn load(paths: &ProjectPaths) -> Result<Self, ProjectError> {
        let config_raw = tokio::fs::read_to_string(&paths.config_path).await?;
        let config: ProjectConfig =
            serde_json::from_str(&config_raw).map_err(|source| ProjectError::Malformed {
                file: "config.json".to_string(),
                source,
            })?;
        let selected_directory = config
            .selected_directory
            .ok_or(ProjectError::MissingSelectedDirectory)?;

        let file_list_raw = tokio::fs::read_to_string(&paths.file_list_path).await?;
        let file_list: BTreeMap<String, Vec<String>> = serde_json::from_str(&file_list_raw)
            .map_err(|source| ProjectError::Malformed {
                file: "file_list.json".to_string(),
                source,
            })?;

        Ok(Self {
            selected_directory,
            file_list,
        })
    }

    /// Resolve the absolute source path of one `(subdir, filename)` inventory
    /// entry. `.` means the selected directory itself.
    pub fn source_path(&self, subdir: &str, filename: &str) -> PathBuf {
        if subdir == "." {
            self.selected_directory.join(filename)
        } else {
            self.selected_directory.join(subdir).join(filename)
        }
    }
}

/// Create the directory for a new project, returning its root.
pub async fn create_project(projects_root: &Path, name: &str) -> Result<PathBuf, ProjectError> {
    validate_project_name(name)?;
    let project_root = projects_root.join(name);
    tokio::fs::create_dir_all(&project_root).await?;
    info!("Created project directory {:?}", project_root);
    Ok(project_root)
}

/// Resolve the paths of an existing project, failing with `NotFound` if it
/// was never created. Phases that only read a project go through this so a
/// typo'd name does not silently bootstrap an empty directory.
pub async fn require_project(
    projects_root: &Path,
    name: &str,
) -> Result<ProjectPaths, ProjectError> {
    validate_project_name(name)?;
    let paths = ProjectPaths::new(projects_root, name);
    if !tokio::fs::try_exists(&paths.project_root).await? {
        return Err(ProjectError::NotFound(name.to_string()));
    }
    Ok(paths)
}

/// List the names of existing projects under the projects root.
pub async fn list_projects(projects_root: &Path) -> Result<Vec<String>, ProjectError> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(projects_root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

fn validate_project_name(name: &str) -> Result<(), ProjectError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(ProjectError::InvalidName(name.to_string()));
    }
    Ok(())
}
