use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use neuralforge::clustering::ClusteringConfig;
use neuralforge::pipeline::{PipelineConfig, PipelineManager};
use neuralforge::project::{self, ProjectPaths};
use neuralforge::renderer::FfmpegRenderer;

#[derive(Parser, Debug)]
#[command(
    name = "neuralforge",
    about = "Audio corpus to spectrogram tensors to cluster-count estimate"
)]
struct CliArgs {
    /// Root directory holding project folders.
    /// Defaults to <home>/NeuralForge/projects.
    #[clap(long)]
    projects_root: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize every inventoried file into the project's sounds directory.
    Convert { project: String },

    /// Segment normalized audio on silence and render spectrogram records.
    Spectrograms { project: String },

    /// Estimate the optimal cluster count over stored spectrograms.
    Clusters {
        project: String,

        /// RNG seed for centroid initialization (reproducible runs).
        #[clap(long)]
        seed: Option<u64>,

        /// Maximum number of clusters to try.
        #[clap(long, default_value_t = 10)]
        k_max: usize,
    },

    /// Run all three phases in order.
    Run {
        project: String,

        /// RNG seed for centroid initialization (reproducible runs).
        #[clap(long)]
        seed: Option<u64>,

        /// Maximum number of clusters to try.
        #[clap(long, default_value_t = 10)]
        k_max: usize,
    },

    /// List existing projects under the projects root.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let projects_root = match cli_args.projects_root {
        Some(root) => root,
        None => ProjectPaths::default_projects_root()
            .context("could not resolve the home directory; pass --projects-root")?,
    };

    match cli_args.command {
        Command::Convert { project } => {
            let manager = bootstrapped_manager(&projects_root, &project).await?;
            manager
                .convert_files_to_wav()
                .await
                .context("normalization phase failed")?;
        }
        Command::Spectrograms { project } => {
            let manager = existing_manager(&projects_root, &project).await?;
            let hashes = manager
                .process_audio_chunks_and_spectrograms()
                .await
                .context("spectrogram phase failed")?;
            info!("Observed {} segment hashes", hashes.len());
        }
        Command::Clusters {
            project,
            seed,
            k_max,
        } => {
            let manager = existing_manager(&projects_root, &project).await?;
            let config = ClusteringConfig {
                k_max,
                seed,
                ..ClusteringConfig::default()
            };
            let optimal_k = manager
                .calculate_optimal_clusters(&config)
                .await
                .context("clustering phase failed")?;
            println!("{}", optimal_k);
        }
        Command::Run {
            project,
            seed,
            k_max,
        } => {
            let manager = bootstrapped_manager(&projects_root, &project).await?;
            manager
                .convert_files_to_wav()
                .await
                .context("normalization phase failed")?;
            let hashes = manager
                .process_audio_chunks_and_spectrograms()
                .await
                .context("spectrogram phase failed")?;
            info!("Observed {} segment hashes", hashes.len());
            let config = ClusteringConfig {
                k_max,
                seed,
                ..ClusteringConfig::default()
            };
            let optimal_k = manager
                .calculate_optimal_clusters(&config)
                .await
                .context("clustering phase failed")?;
            println!("{}", optimal_k);
        }
        Command::List => {
            for name in project::list_projects(&projects_root)
                .await
                .context("could not list projects")?
            {
                println!("{}", name);
            }
        }
    }

    Ok(())
}

/// Create the project directory if needed, then build its manager. Only the
/// writing commands (`convert`, `run`) bootstrap.
async fn bootstrapped_manager(
    projects_root: &std::path::Path,
    name: &str,
) -> Result<PipelineManager> {
    let project_root = project::create_project(projects_root, name).await?;
    info!("Using project at {:?}", project_root);
    Ok(manager_at(ProjectPaths::new(projects_root, name)))
}

/// Build the manager for a project that must already exist.
async fn existing_manager(
    projects_root: &std::path::Path,
    name: &str,
) -> Result<PipelineManager> {
    let paths = project::require_project(projects_root, name).await?;
    Ok(manager_at(paths))
}

fn manager_at(paths: ProjectPaths) -> PipelineManager {
    PipelineManager::new(
        paths,
        Arc::new(FfmpegRenderer::new()),
        PipelineConfig::default(),
    )
}
