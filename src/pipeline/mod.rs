//! The audio -> chunk -> spectrogram pipeline.
//!
//! Three stages over a project's filesystem state:
//!
//! 1. Normalizer: every inventoried file becomes `sounds/<stem>.wav`
//! 2. Segmenter: each WAV is split on silence into transient chunk WAVs
//! 3. Extractor: each chunk is hashed, rendered to a 1024x1024 intensity
//!    tensor and persisted content-addressed; the chunk is then deleted
//!
//! [`PipelineManager`] coordinates the stages with bounded concurrency and
//! funnels per-item failures into the project error log. Idempotency comes
//! from the content store: a present hash is never regenerated.

mod extractor;
mod manager;
mod normalizer;
mod segmenter;

pub use manager::{PipelineConfig, PipelineError, PipelineManager};
pub use segmenter::Segment;
