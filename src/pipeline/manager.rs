//! Pipeline coordinator: drives the three public phases over one project.

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

use super::extractor::process_segment_file;
use super::segmenter::segment_wav;
use crate::clustering::{self, ClusteringConfig, ClusteringError};
use crate::project::{ErrorLog, ProjectData, ProjectError, ProjectPaths};
use crate::renderer::{Renderer, RendererError};
use crate::store::{ContentStore, StoreError};

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("project error: {0}")]
    Project(#[from] ProjectError),

    #[error("renderer error: {0}")]
    Renderer(#[from] RendererError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("spectrogram decode failed: {0}")]
    Decode(String),

    #[error("spectrogram is {rows}x{cols}, expected 1024x1024")]
    Dimensions { rows: usize, cols: usize },

    #[error("{failed} of {total} files failed to normalize")]
    NormalizeSummary { failed: usize, total: usize },

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Tunables for the pipeline's bounded concurrency.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Files normalized concurrently per batch; batches run sequentially.
    pub normalize_batch: usize,
    /// Spectrogram worker pool size; segment queue depth equals the pool.
    pub spectrogram_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            normalize_batch: 200,
            spectrogram_workers: 10,
        }
    }
}

/// Orchestrates Normalize -> Segment+Extract -> Cluster-Count for one
/// project. Stateless between invocations: every phase reads and writes only
/// the project's directories, which is what makes re-runs resumable.
pub struct PipelineManager {
    paths: ProjectPaths,
    renderer: Arc<dyn Renderer>,
    store: ContentStore,
    log: Arc<ErrorLog>,
    config: PipelineConfig,
}

impl PipelineManager {
    pub fn new(paths: ProjectPaths, renderer: Arc<dyn Renderer>, config: PipelineConfig) -> Self {
        let store = ContentStore::new(&paths.spectrograms_dir);
        let log = Arc::new(ErrorLog::new(&paths.log_path));
        Self {
            paths,
            renderer,
            store,
            log,
            config,
        }
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Append a per-item failure to the project error log. Logging failures
    /// must never take a phase down, so they are only traced.
    pub async fn log_error(&self, err: impl Display, message: &str) {
        if let Err(log_err) = self.log.append(err, message).await {
            error!("Failed to append to error log: {}", log_err);
        }
    }

    /// Phase 1: normalize every inventoried file into `sounds/`.
    pub async fn convert_files_to_wav(&self) -> Result<(), PipelineError> {
        let data = ProjectData::load(&self.paths).await?;
        super::normalizer::convert_files_to_wav(
            &self.paths,
            &data,
            &self.renderer,
            &self.log,
            self.config.normalize_batch,
        )
        .await
    }

    /// Phase 2: segment every WAV under `sounds/`, render and persist one
    /// spectrogram record per unique segment.
    ///
    /// Returns the content hash of every segment observed, duplicates
    /// included; the store deduplicates, the return value does not. Hashes
    /// from the resume sweep come first; ordering within each round is
    /// unspecified.
    pub async fn process_audio_chunks_and_spectrograms(
        &self,
    ) -> Result<Vec<String>, PipelineError> {
        if let Err(err) = tokio::fs::create_dir_all(&self.paths.spectrograms_dir).await {
            self.log_error(&err, "error creating spectrograms directory")
                .await;
            return Err(err.into());
        }

        let mut hashes = Vec::new();

        // Resume sweep: leftover segment WAVs from an interrupted run sit
        // directly under spectrograms/. Segmentation reuses the same
        // deterministic chunk names, so the sweep must fully drain before
        // any WAV is re-segmented onto those paths.
        let leftovers = self.leftover_segments().await?;
        if !leftovers.is_empty() {
            let pool = self.spawn_segment_pool();
            for leftover in leftovers {
                pool.send(leftover).await;
            }
            hashes.extend(pool.finish().await?);
        }

        // Segment each normalized WAV, feeding chunks to the pool as they
        // are produced. Per-file segmentation failures are logged and the
        // walk continues.
        let pool = self.spawn_segment_pool();
        for wav in self.collect_sound_wavs()? {
            match segment_wav(&self.renderer, &wav, &self.paths.spectrograms_dir).await {
                Ok(chunks) => {
                    for chunk in chunks {
                        pool.send(chunk).await;
                    }
                }
                Err(err) => {
                    self.log_error(&err, &format!("error segmenting {}", wav.display()))
                        .await;
                }
            }
        }
        hashes.extend(pool.finish().await?);

        info!(
            "Spectrogram phase complete: {} segments observed for {:?}",
            hashes.len(),
            self.paths.project_root
        );
        Ok(hashes)
    }

    fn spawn_segment_pool(&self) -> SegmentPool {
        let workers = self.config.spectrogram_workers.max(1);
        let (segment_tx, segment_rx) = mpsc::channel::<PathBuf>(workers);
        let (hash_tx, mut hash_rx) = mpsc::channel::<String>(workers);
        let segment_rx = Arc::new(Mutex::new(segment_rx));

        let mut worker_handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let segment_rx = segment_rx.clone();
            let hash_tx = hash_tx.clone();
            let store = self.store.clone();
            let renderer = self.renderer.clone();
            let log = self.log.clone();
            worker_handles.push(tokio::spawn(async move {
                loop {
                    let segment = { segment_rx.lock().await.recv().await };
                    let Some(segment) = segment else { break };
                    match process_segment_file(&store, &renderer, &segment).await {
                        Ok(hash) => {
                            let _ = hash_tx.send(hash).await;
                        }
                        Err(err) => {
                            if let Err(log_err) = log
                                .append(
                                    &err,
                                    &format!("error processing segment {}", segment.display()),
                                )
                                .await
                            {
                                error!("Failed to append to error log: {}", log_err);
                            }
                        }
                    }
                }
            }));
        }
        drop(hash_tx);

        let collector = tokio::spawn(async move {
            let mut hashes = Vec::new();
            while let Some(hash) = hash_rx.recv().await {
                hashes.push(hash);
            }
            hashes
        });

        SegmentPool {
            segment_tx,
            workers: worker_handles,
            collector,
        }
    }

    /// Phase 3: estimate the optimal cluster count over stored spectrograms.
    pub async fn calculate_optimal_clusters(
        &self,
        config: &ClusteringConfig,
    ) -> Result<usize, ClusteringError> {
        clustering::calculate_optimal_clusters(&self.paths, config, &self.log).await
    }

    async fn leftover_segments(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let mut leftovers = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.paths.spectrograms_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_wav(&path) && path.is_file() {
                leftovers.push(path);
            }
        }
        Ok(leftovers)
    }

    fn collect_sound_wavs(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let mut wavs = Vec::new();
        for entry in walkdir::WalkDir::new(&self.paths.sounds_dir) {
            let entry = entry.map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::Other, e)
            })?;
            if entry.file_type().is_file() && is_wav(entry.path()) {
                wavs.push(entry.path().to_path_buf());
            }
        }
        wavs.sort();
        Ok(wavs)
    }
}

/// One round of spectrogram workers over a bounded segment queue, with a
/// collector gathering the observed hashes.
struct SegmentPool {
    segment_tx: mpsc::Sender<PathBuf>,
    workers: Vec<tokio::task::JoinHandle<()>>,
    collector: tokio::task::JoinHandle<Vec<String>>,
}

impl SegmentPool {
    /// Workers only stop once the sender drops, so a failed send means a
    /// worker panicked; `finish` surfaces that on join.
    async fn send(&self, segment: PathBuf) {
        let _ = self.segment_tx.send(segment).await;
    }

    async fn finish(self) -> Result<Vec<String>, PipelineError> {
        drop(self.segment_tx);
        for handle in self.workers {
            handle.await?;
        }
        Ok(self.collector.await?)
    }
}

fn is_wav(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}
