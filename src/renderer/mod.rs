//! External renderer adapter.
//!
//! The pipeline relies on an out-of-process media tool for everything that
//! touches actual audio bytes: transcoding to WAV, silence detection, segment
//! extraction and spectrogram rendering. The [`Renderer`] trait is the seam;
//! [`FfmpegRenderer`] is the production implementation and tests substitute
//! their own. Failures of the tool are always per-item and carry the captured
//! stderr for diagnostics.

mod ffmpeg;
mod silence;

pub use ffmpeg::FfmpegRenderer;
pub use silence::{parse_silence_markers, AudibleInterval};

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Default silence detection threshold in dB.
pub const SILENCE_THRESHOLD_DB: i32 = -30;
/// Default minimum silence duration in seconds.
pub const SILENCE_MIN_DURATION_S: f64 = 0.5;

/// Errors from the external renderer. Each command variant carries the
/// tool's captured stderr.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcode failed: {stderr}")]
    Transcode { stderr: String },

    #[error("silence detection failed: {stderr}")]
    SilenceDetect { stderr: String },

    #[error("segment extraction failed: {stderr}")]
    Extract { stderr: String },

    #[error("spectrogram render failed: {stderr}")]
    Spectrogram { stderr: String },
}

/// The four operations the pipeline needs from the media tool.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Transcode any decodable audio file to a WAV at `dst`.
    async fn transcode_to_wav(&self, src: &Path, dst: &Path) -> Result<(), RendererError>;

    /// Detect silence in `src` and return the derived audible intervals.
    /// An empty list means no silence of the configured duration was found.
    async fn detect_silence(&self, src: &Path) -> Result<Vec<AudibleInterval>, RendererError>;

    /// Extract `[start, start + duration)` of `src` into a standalone WAV at
    /// `dst` via stream copy. `duration == None` extracts to end of file.
    async fn extract_segment(
        &self,
        src: &Path,
        dst: &Path,
        start: f64,
        duration: Option<f64>,
    ) -> Result<(), RendererError>;

    /// Render a square spectrogram PNG of `src` at `dst` (cube-root intensity
    /// scale, no legend).
    async fn render_spectrogram_png(&self, src: &Path, dst: &Path) -> Result<(), RendererError>;
}
