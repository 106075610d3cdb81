//! Stage 3: hash a segment, render its spectrogram and persist the record.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::PipelineError;
use crate::renderer::Renderer;
use crate::store::{ContentStore, SpectrogramRecord, SPECTROGRAM_SIZE};

/// Process one transient segment WAV to completion:
/// hash -> store gate -> render -> decode -> persist -> delete.
///
/// Returns the segment's content hash whether it was newly recorded or a
/// duplicate of an existing record. On failure the segment file is left in
/// place for later cleanup.
pub(crate) async fn process_segment_file(
    store: &ContentStore,
    renderer: &Arc<dyn Renderer>,
    segment_path: &Path,
) -> Result<String, PipelineError> {
    let hash = ContentStore::hash_file(segment_path).await?;

    if store.contains(&hash) {
        debug!("{:?} already recorded as {}", segment_path, hash);
        tokio::fs::remove_file(segment_path).await?;
        return Ok(hash);
    }

    // The PNG is deleted on every exit path when the guard drops.
    let png = tempfile::Builder::new()
        .prefix("spectrogram-")
        .suffix(".png")
        .tempfile()?;
    renderer
        .render_spectrogram_png(segment_path, png.path())
        .await?;

    let spectrogram = decode_spectrogram_png(png.path())?;
    let rows = spectrogram.len();
    let cols = spectrogram.first().map(Vec::len).unwrap_or(0);
    if rows != SPECTROGRAM_SIZE || cols != SPECTROGRAM_SIZE {
        return Err(PipelineError::Dimensions { rows, cols });
    }

    let file_name = segment_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let record = SpectrogramRecord {
        file_name,
        md5_hash: hash.clone(),
        chunk_path: segment_path.display().to_string(),
        spectrogram,
    };
    store.write(&hash, &record).await?;

    tokio::fs::remove_file(segment_path).await?;
    Ok(hash)
}

/// Decode a rendered PNG into an intensity matrix in `[0, 1]`.
///
/// Each pixel collapses to `(r + g + b) / (3 * 65535)` with channels in the
/// 16-bit range. Rows run top to bottom, columns left to right.
pub(crate) fn decode_spectrogram_png(path: &Path) -> Result<Vec<Vec<f64>>, PipelineError> {
    const FULL_SCALE: f64 = 65535.0;

    let img = image::open(path)
        .map_err(|e| PipelineError::Decode(e.to_string()))?
        .into_rgb16();
    let (width, height) = img.dimensions();

    let mut matrix = Vec::with_capacity(height as usize);
    for y in 0..height {
        let mut row = Vec::with_capacity(width as usize);
        for x in 0..width {
            let pixel = img.get_pixel(x, y);
            let sum = pixel[0] as f64 + pixel[1] as f64 + pixel[2] as f64;
            row.push(sum / (3.0 * FULL_SCALE));
        }
        matrix.push(row);
    }
    Ok(matrix)
}
