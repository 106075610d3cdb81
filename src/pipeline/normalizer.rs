//! Stage 1: normalize every inventoried file to a WAV under `sounds/`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use super::PipelineError;
use crate::project::{ErrorLog, ProjectData, ProjectPaths};
use crate::renderer::Renderer;

/// One normalization job: source file to `sounds/<stem>.wav`.
#[derive(Debug, Clone)]
struct NormalizeJob {
    source: PathBuf,
    target: PathBuf,
}

/// Normalize the full inventory. Files run concurrently in fixed-size
/// batches; batches run sequentially, bounding the peak number of external
/// processes. Per-file failures go to the error log; the call fails with a
/// summary only after every batch has completed.
pub(crate) async fn convert_files_to_wav(
    paths: &ProjectPaths,
    data: &ProjectData,
    renderer: &Arc<dyn Renderer>,
    log: &ErrorLog,
    batch_size: usize,
) -> Result<(), PipelineError> {
    tokio::fs::create_dir_all(&paths.sounds_dir).await?;

    let jobs = build_jobs(paths, data);
    warn_on_collisions(&jobs);
    let jobs = dedupe_by_target(jobs);

    let total = jobs.len();
    let mut failed = 0usize;

    for batch in jobs.chunks(batch_size.max(1)) {
        let results = join_all(batch.iter().map(|job| normalize_one(job, renderer))).await;
        for (job, result) in batch.iter().zip(results) {
            if let Err(err) = result {
                failed += 1;
                if let Err(log_err) = log
                    .append(
                        &err,
                        &format!("error normalizing {}", job.source.display()),
                    )
                    .await
                {
                    warn!("Failed to append to error log: {}", log_err);
                }
            }
        }
    }

    info!("Normalized {}/{} files into {:?}", total - failed, total, paths.sounds_dir);

    if failed > 0 {
        return Err(PipelineError::NormalizeSummary { failed, total });
    }
    Ok(())
}

fn build_jobs(paths: &ProjectPaths, data: &ProjectData) -> Vec<NormalizeJob> {
    let mut jobs = Vec::new();
    for (subdir, files) in &data.file_list {
        for file in files {
            jobs.push(NormalizeJob {
                source: data.source_path(subdir, file),
                target: paths.sounds_dir.join(format!("{}.wav", stem(file))),
            });
        }
    }
    jobs
}

/// Strip the final extension from a base name. Subdirectory names never
/// appear in the target path, so sources sharing a stem collide.
fn stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}

/// Stem collisions resolve last-writer-wins; surface them up front.
fn warn_on_collisions(jobs: &[NormalizeJob]) {
    let mut by_target: HashMap<&Path, usize> = HashMap::new();
    for job in jobs {
        *by_target.entry(job.target.as_path()).or_insert(0) += 1;
    }
    for (target, count) in by_target {
        if count > 1 {
            warn!(
                "{} sources map to {:?}; last writer wins",
                count, target
            );
        }
    }
}

/// Keep only the final job for each target, in inventory order. Colliding
/// sources resolve last-writer-wins, and dropping the earlier jobs up front
/// keeps two batch members from ever writing one destination concurrently.
fn dedupe_by_target(jobs: Vec<NormalizeJob>) -> Vec<NormalizeJob> {
    let mut last_for_target: HashMap<PathBuf, usize> = HashMap::new();
    for (i, job) in jobs.iter().enumerate() {
        last_for_target.insert(job.target.clone(), i);
    }
    jobs.into_iter()
        .enumerate()
        .filter(|(i, job)| last_for_target[&job.target] == *i)
        .map(|(_, job)| job)
        .collect()
}

async fn normalize_one(
    job: &NormalizeJob,
    renderer: &Arc<dyn Renderer>,
) -> Result<(), PipelineError> {
    if job.target.exists() {
        info!("{:?} already exists", job.target);
        return Ok(());
    }

    if has_wav_extension(&job.source) {
        tokio::fs::copy(&job.source, &job.target).await?;
    } else {
        renderer.transcode_to_wav(&job.source, &job.target).await?;
    }
    Ok(())
}

fn has_wav_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}
