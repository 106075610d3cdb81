//! Filesystem layout of a single project.

use std::path::{Path, PathBuf};

/// All paths the pipeline touches for one project, resolved once and threaded
/// through every phase.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    /// `<projects_root>/<name>/`
    pub project_root: PathBuf,
    /// Normalized WAVs.
    pub sounds_dir: PathBuf,
    /// Spectrogram records plus transient segment WAVs.
    pub spectrograms_dir: PathBuf,
    /// Append-only per-project error log.
    pub log_path: PathBuf,
    /// `{"selected_directory": ...}`
    pub config_path: PathBuf,
    /// Inventory of relative subdirectory -> file base names.
    pub file_list_path: PathBuf,
    /// Persisted elbow result.
    pub elbow_path: PathBuf,
}

impl ProjectPaths {
    /// Resolve the layout for a named project under a projects root.
    pub fn new(projects_root: &Path, project_name: &str) -> Self {
        let project_root = projects_root.join(project_name);
        Self {
            sounds_dir: project_root.join("sounds"),
            spectrograms_dir: project_root.join("spectrograms"),
            log_path: project_root.join("log.error"),
            config_path: project_root.join("config.json"),
            file_list_path: project_root.join("file_list.json"),
            elbow_path: project_root.join("elbow_results.json"),
            project_root,
        }
    }

    /// Default projects root: `<home>/NeuralForge/projects`.
    pub fn default_projects_root() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join("NeuralForge").join("projects"))
    }
}
