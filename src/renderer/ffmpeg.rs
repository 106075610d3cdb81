//! Renderer implementation backed by the `ffmpeg` binary.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::silence::{parse_silence_markers, AudibleInterval};
use super::{Renderer, RendererError, SILENCE_MIN_DURATION_S, SILENCE_THRESHOLD_DB};
use crate::store::SPECTROGRAM_SIZE;

/// Out-of-process renderer invoking a program reachable as `ffmpeg` on PATH.
pub struct FfmpegRenderer {
    program: String,
}

impl FfmpegRenderer {
    pub fn new() -> Self {
        Self {
            program: "ffmpeg".to_string(),
        }
    }

    /// Use a different binary name or path, e.g. a pinned build.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output, RendererError> {
        debug!("{} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        Ok(output)
    }
}

impl Default for FfmpegRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn transcode_to_wav(&self, src: &Path, dst: &Path) -> Result<(), RendererError> {
        let src = path_str(src);
        let dst = path_str(dst);
        let output = self.run(&["-y", "-i", &src, &dst]).await?;
        if !output.status.success() {
            return Err(RendererError::Transcode {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }

    async fn detect_silence(&self, src: &Path) -> Result<Vec<AudibleInterval>, RendererError> {
        let src = path_str(src);
        let filter = format!(
            "silencedetect=n={}dB:d={}",
            SILENCE_THRESHOLD_DB, SILENCE_MIN_DURATION_S
        );
        let output = self
            .run(&["-i", &src, "-af", &filter, "-f", "null", "-"])
            .await?;
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(RendererError::SilenceDetect { stderr });
        }
        Ok(parse_silence_markers(&stderr))
    }

    async fn extract_segment(
        &self,
        src: &Path,
        dst: &Path,
        start: f64,
        duration: Option<f64>,
    ) -> Result<(), RendererError> {
        let src = path_str(src);
        let dst = path_str(dst);
        let start = format!("{}", start);

        // Stream copy, no re-encode. Seeking by seconds may be imprecise at
        // non-keyframe boundaries; that is accepted.
        let mut args = vec!["-y", "-ss", &start];
        let duration_arg;
        if let Some(duration) = duration {
            duration_arg = format!("{}", duration);
            args.push("-t");
            args.push(&duration_arg);
        }
        args.extend_from_slice(&["-i", &src, "-c", "copy", &dst]);

        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(RendererError::Extract {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }

    async fn render_spectrogram_png(&self, src: &Path, dst: &Path) -> Result<(), RendererError> {
        let src = path_str(src);
        let dst = path_str(dst);
        let filter = format!(
            "showspectrumpic=s={size}x{size}:legend=disabled:scale=cbrt",
            size = SPECTROGRAM_SIZE
        );
        let output = self.run(&["-y", "-i", &src, "-lavfi", &filter, &dst]).await?;
        if !output.status.success() {
            return Err(RendererError::Spectrogram {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}
