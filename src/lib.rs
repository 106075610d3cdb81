//! NeuralForge audio pipeline library.
//!
//! Turns a user-selected directory of heterogeneous audio files into a
//! content-addressed corpus of fixed-size spectrogram tensors, then estimates
//! an optimal cluster count over the corpus. The pipeline has three phases,
//! each separately invocable and resumable from filesystem state:
//!
//! 1. Normalize every inventoried file to a canonical WAV under `sounds/`
//! 2. Segment each WAV on silence, render each segment to a 1024x1024
//!    spectrogram tensor and persist it keyed by the segment's MD5 hash
//! 3. Run seeded k-means for k in `[1, K_MAX]` over the stored tensors and
//!    pick k with an elbow heuristic on WCSS

pub mod clustering;
pub mod pipeline;
pub mod project;
pub mod renderer;
pub mod store;

// Re-export commonly used types for convenience
pub use clustering::{ClusteringConfig, ClusteringError, ElbowResult};
pub use pipeline::{PipelineConfig, PipelineError, PipelineManager};
pub use project::{ErrorLog, ProjectData, ProjectError, ProjectPaths};
pub use renderer::{AudibleInterval, FfmpegRenderer, Renderer, RendererError};
pub use store::{ContentStore, SpectrogramRecord, StoreError, SPECTROGRAM_SIZE};
