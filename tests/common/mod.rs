//! Common test infrastructure
//!
//! Provides a throwaway project on disk plus a [`MockRenderer`] standing in
//! for the external media tool, so the whole pipeline can run end to end
//! without ffmpeg or real audio.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use serde_json::json;

use neuralforge::pipeline::{PipelineConfig, PipelineManager};
use neuralforge::project::ProjectPaths;
use neuralforge::renderer::{AudibleInterval, Renderer, RendererError};

/// A temporary projects root holding one project and a source directory.
///
/// Dropping the value deletes everything.
pub struct TestProject {
    _root: tempfile::TempDir,
    pub sources_dir: PathBuf,
    pub paths: ProjectPaths,
}

impl TestProject {
    pub async fn create() -> Self {
        let root = tempfile::tempdir().unwrap();
        let sources_dir = root.path().join("sources");
        tokio::fs::create_dir_all(&sources_dir).await.unwrap();
        let projects_root = root.path().join("projects");
        let paths = ProjectPaths::new(&projects_root, "demo");
        tokio::fs::create_dir_all(&paths.project_root)
            .await
            .unwrap();
        Self {
            _root: root,
            sources_dir,
            paths,
        }
    }

    /// Write one source file under the selected directory. `name` may contain
    /// subdirectories.
    pub async fn write_source(&self, name: &str, bytes: &[u8]) {
        let path = self.sources_dir.join(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.unwrap();
        }
        tokio::fs::write(path, bytes).await.unwrap();
    }

    /// Persist `config.json` and `file_list.json` the way the picker shell
    /// does: subdirectory (`.` for the root) to file base names.
    pub async fn write_inventory(&self, entries: &[(&str, &[&str])]) {
        let config = json!({ "selected_directory": self.sources_dir });
        tokio::fs::write(&self.paths.config_path, config.to_string())
            .await
            .unwrap();

        let mut file_list = serde_json::Map::new();
        for (subdir, files) in entries {
            let names: Vec<_> = files.iter().map(|f| json!(f)).collect();
            file_list.insert(subdir.to_string(), json!(names));
        }
        tokio::fs::write(
            &self.paths.file_list_path,
            serde_json::Value::Object(file_list).to_string(),
        )
        .await
        .unwrap();
    }

    pub fn manager(&self, renderer: Arc<MockRenderer>) -> PipelineManager {
        PipelineManager::new(self.paths.clone(), renderer, PipelineConfig::default())
    }

    /// A manager with a single spectrogram worker, for tests that need
    /// deterministic segment ordering.
    pub fn serial_manager(&self, renderer: Arc<MockRenderer>) -> PipelineManager {
        let config = PipelineConfig {
            spectrogram_workers: 1,
            ..PipelineConfig::default()
        };
        PipelineManager::new(self.paths.clone(), renderer, config)
    }

    /// Lines currently in the project error log; empty if it was never
    /// written.
    pub async fn log_lines(&self) -> Vec<String> {
        match tokio::fs::read_to_string(&self.paths.log_path).await {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Record files under `spectrograms/`, sorted by name.
    pub async fn record_files(&self) -> Vec<PathBuf> {
        self.spectrogram_files("json").await
    }

    /// Segment WAVs left under `spectrograms/`, sorted by name.
    pub async fn leftover_wavs(&self) -> Vec<PathBuf> {
        self.spectrogram_files("wav").await
    }

    async fn spectrogram_files(&self, extension: &str) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.paths.spectrograms_dir).await {
            Ok(entries) => entries,
            Err(_) => return files,
        };
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(extension) {
                files.push(path);
            }
        }
        files.sort();
        files
    }
}

/// In-process stand-in for the external media tool.
///
/// All operations work on the mock's own byte conventions:
/// - transcode prepends a marker to the source bytes
/// - extraction derives the chunk bytes from the source bytes and the
///   segment duration, so equal-length segments of one file collide by hash
/// - rendering writes a square PNG whose shade is derived from the input
///   bytes, and can be made to fail for paths containing a needle
pub struct MockRenderer {
    silence: HashMap<String, Vec<AudibleInterval>>,
    fail_render_on: Option<String>,
    image_size: u32,
    render_calls: AtomicUsize,
}

pub const TRANSCODE_MARKER: &[u8] = b"RIFF-transcoded:";

impl MockRenderer {
    pub fn new() -> Self {
        Self {
            silence: HashMap::new(),
            fail_render_on: None,
            image_size: 1024,
            render_calls: AtomicUsize::new(0),
        }
    }

    /// Return the given audible intervals when silence detection runs on a
    /// file with this base name. Unlisted files report no silence.
    pub fn with_silence(mut self, file_name: &str, intervals: Vec<AudibleInterval>) -> Self {
        self.silence.insert(file_name.to_string(), intervals);
        self
    }

    /// Fail spectrogram rendering for any path containing `needle`.
    pub fn failing_render_on(mut self, needle: &str) -> Self {
        self.fail_render_on = Some(needle.to_string());
        self
    }

    /// Render PNGs of this size instead of 1024x1024.
    pub fn with_image_size(mut self, size: u32) -> Self {
        self.image_size = size;
        self
    }

    /// How many spectrograms were actually rendered.
    pub fn render_count(&self) -> usize {
        self.render_calls.load(Ordering::SeqCst)
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn transcode_to_wav(&self, src: &Path, dst: &Path) -> Result<(), RendererError> {
        let source = tokio::fs::read(src).await?;
        let mut bytes = TRANSCODE_MARKER.to_vec();
        bytes.extend_from_slice(&source);
        tokio::fs::write(dst, bytes).await?;
        Ok(())
    }

    async fn detect_silence(&self, src: &Path) -> Result<Vec<AudibleInterval>, RendererError> {
        Ok(self
            .silence
            .get(&Self::file_name(src))
            .cloned()
            .unwrap_or_default())
    }

    async fn extract_segment(
        &self,
        src: &Path,
        dst: &Path,
        _start: f64,
        duration: Option<f64>,
    ) -> Result<(), RendererError> {
        let mut bytes = tokio::fs::read(src).await?;
        match duration {
            Some(d) => bytes.extend_from_slice(format!("|dur={:.3}", d).as_bytes()),
            None => bytes.extend_from_slice(b"|dur=eof"),
        }
        tokio::fs::write(dst, bytes).await?;
        Ok(())
    }

    async fn render_spectrogram_png(&self, src: &Path, dst: &Path) -> Result<(), RendererError> {
        if let Some(needle) = &self.fail_render_on {
            if src.to_string_lossy().contains(needle.as_str()) {
                return Err(RendererError::Spectrogram {
                    stderr: format!("mock render failure for {}", src.display()),
                });
            }
        }
        self.render_calls.fetch_add(1, Ordering::SeqCst);

        // A uniform shade derived from the input keeps distinct segments
        // distinguishable in the decoded tensors.
        let source = tokio::fs::read(src).await?;
        let shade = source
            .iter()
            .fold(0u8, |acc, byte| acc.wrapping_add(*byte));
        let img = RgbImage::from_pixel(self.image_size, self.image_size, Rgb([shade; 3]));
        img.save(dst)
            .map_err(|e| RendererError::Spectrogram {
                stderr: e.to_string(),
            })?;
        Ok(())
    }
}
