//! Silence-based segmentation of normalized WAVs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::renderer::{AudibleInterval, Renderer, RendererError};

/// What to materialize for one source WAV.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// No silence detected: the entire file is one segment.
    WholeFile,
    /// One silence-bounded audible interval.
    Audible(AudibleInterval),
}

/// Map detected audible intervals to the segments to materialize.
pub(crate) fn plan_segments(intervals: &[AudibleInterval]) -> Vec<Segment> {
    if intervals.is_empty() {
        vec![Segment::WholeFile]
    } else {
        intervals.iter().copied().map(Segment::Audible).collect()
    }
}

/// Segment file name for a source stem and 1-based index.
pub(crate) fn chunk_file_name(stem: &str, index: usize) -> String {
    format!("{}_chunk{}.wav", stem, index)
}

/// Segment one normalized WAV into transient chunk WAVs under `out_dir`,
/// returning the chunk paths in interval order.
pub(crate) async fn segment_wav(
    renderer: &Arc<dyn Renderer>,
    wav_path: &Path,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, RendererError> {
    let intervals = renderer.detect_silence(wav_path).await?;
    let segments = plan_segments(&intervals);

    let stem = wav_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("segment");

    let mut chunks = Vec::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate() {
        let dst = out_dir.join(chunk_file_name(stem, i + 1));
        match segment {
            Segment::WholeFile => {
                tokio::fs::copy(wav_path, &dst).await?;
            }
            Segment::Audible(interval) => {
                renderer
                    .extract_segment(wav_path, &dst, interval.start, interval.duration())
                    .await?;
            }
        }
        chunks.push(dst);
    }

    debug!("Segmented {:?} into {} chunks", wav_path, chunks.len());
    Ok(chunks)
}
