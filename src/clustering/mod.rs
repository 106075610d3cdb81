//! Cluster-count estimation over stored spectrograms.
//!
//! Loads every record under `spectrograms/`, flattens each tensor row-major
//! into one vector, runs k-means for k in `[1, k_max]` and picks k with an
//! elbow heuristic on the WCSS curve. The heuristic is deliberately the
//! second-difference scan described in the project docs, not a geometric
//! elbow fit; cluster counts must stay reproducible across runs, which is
//! also why k-means itself is single-threaded and seedable.

mod kmeans;

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::project::{ErrorLog, ProjectPaths};
use crate::store::{ContentStore, StoreError};

/// Errors that can occur during cluster-count estimation.
#[derive(Debug, Error)]
pub enum ClusteringError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no spectrogram records found in {0}")]
    Empty(PathBuf),

    #[error("spectrogram length mismatch in {file}: expected {expected}, got {got}")]
    LengthMismatch {
        file: PathBuf,
        expected: usize,
        got: usize,
    },

    #[error("loader task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Tunables for the estimator.
#[derive(Debug, Clone)]
pub struct ClusteringConfig {
    /// Maximum number of clusters to try.
    pub k_max: usize,
    /// Lloyd iterations per k.
    pub iterations: usize,
    /// Concurrent record loads.
    pub loader_workers: usize,
    /// RNG seed for centroid initialization; `None` draws a fresh one.
    pub seed: Option<u64>,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            k_max: 10,
            iterations: 100,
            loader_workers: 100,
            seed: None,
        }
    }
}

/// Persisted outcome of one estimation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElbowResult {
    pub wcss_values: Vec<f64>,
    pub optimal_k: usize,
}

/// Estimate the optimal cluster count for a project and persist the result
/// to `elbow_results.json`.
///
/// Malformed records are logged and skipped; an empty corpus is fatal.
pub async fn calculate_optimal_clusters(
    paths: &ProjectPaths,
    config: &ClusteringConfig,
    log: &ErrorLog,
) -> Result<usize, ClusteringError> {
    let files = list_record_files(&paths.spectrograms_dir).await?;
    if files.is_empty() {
        return Err(ClusteringError::Empty(paths.spectrograms_dir.clone()));
    }

    // Decode records concurrently; order does not matter.
    let loaded: Vec<(PathBuf, Result<Vec<f64>, StoreError>)> = stream::iter(files)
        .map(|path| async move {
            let result = load_flattened(&path).await;
            (path, result)
        })
        .buffer_unordered(config.loader_workers.max(1))
        .collect()
        .await;

    let mut vectors: Vec<(PathBuf, Vec<f64>)> = Vec::with_capacity(loaded.len());
    for (path, result) in loaded {
        match result {
            Ok(vector) => vectors.push((path, vector)),
            Err(err) => {
                warn!("Skipping unreadable record {:?}: {}", path, err);
                if let Err(log_err) = log
                    .append(&err, &format!("error loading spectrogram {}", path.display()))
                    .await
                {
                    warn!("Failed to append to error log: {}", log_err);
                }
            }
        }
    }

    if vectors.is_empty() {
        return Err(ClusteringError::Empty(paths.spectrograms_dir.clone()));
    }

    let dim = vectors[0].1.len();
    for (path, vector) in &vectors {
        if vector.len() != dim {
            return Err(ClusteringError::LengthMismatch {
                file: path.clone(),
                expected: dim,
                got: vector.len(),
            });
        }
    }

    let rows = vectors.len();
    let mut flat = Vec::with_capacity(rows * dim);
    for (_, vector) in vectors {
        flat.extend(vector);
    }
    let data = Array2::from_shape_vec((rows, dim), flat)
        .expect("row count and dimension were just computed from the data");

    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    let mut rng = StdRng::seed_from_u64(seed);
    info!(
        "Running k-means over {} records of dimension {} (seed {})",
        rows, dim, seed
    );

    let mut wcss_values = Vec::with_capacity(config.k_max);
    for k in 1..=config.k_max {
        wcss_values.push(kmeans::kmeans_wcss(&data, k, config.iterations, &mut rng));
    }

    let optimal_k = elbow_point(&wcss_values);
    info!("Optimal number of clusters by elbow heuristic: {}", optimal_k);

    let result = ElbowResult {
        wcss_values,
        optimal_k,
    };
    let json = serde_json::to_string_pretty(&result)?;
    tokio::fs::write(&paths.elbow_path, json).await?;

    Ok(optimal_k)
}

/// Second-difference elbow scan: the last `i` where the WCSS drop grows
/// picks `k = i + 1`; a curve with no such point yields 1.
fn elbow_point(wcss: &[f64]) -> usize {
    let mut optimal = 1;
    for i in 1..wcss.len().saturating_sub(1) {
        let angle = (wcss[i + 1] - wcss[i]).abs() - (wcss[i] - wcss[i - 1]).abs();
        if angle > 0.0 {
            optimal = i + 1;
        }
    }
    optimal
}

async fn list_record_files(dir: &Path) -> Result<Vec<PathBuf>, ClusteringError> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn load_flattened(path: &Path) -> Result<Vec<f64>, StoreError> {
    let record = ContentStore::load(path).await?;
    let mut flattened =
        Vec::with_capacity(record.spectrogram.len() * record.spectrogram.first().map_or(0, Vec::len));
    for row in record.spectrogram {
        flattened.extend(row);
    }
    Ok(flattened)
}
