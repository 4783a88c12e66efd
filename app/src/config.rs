use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use agrirec::training::{Algorithm, TrainOptions};
use agrirec::{ArtifactPaths, Metric, ServiceConfig, UnmatchedPolicy, DEFAULT_SUITABILITY_THRESHOLD};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Crop, fertilizer and suitability recommendations over HTTP.
#[derive(Debug, Parser)]
#[command(name = "agrirec", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP prediction server
    Serve(ServeArgs),
    /// Train artifacts from CSV datasets
    Train(TrainArgs),
    /// Interactive prompt-driven predictions
    Demo(DemoArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ArtifactArgs {
    /// Directory holding crop.json, fertilizer.json and suitability.json
    #[arg(long, env = "AGRIREC_ARTIFACTS", default_value = "artifacts")]
    pub artifacts_dir: PathBuf,

    #[arg(long, env = "AGRIREC_CROP_MODEL")]
    pub crop_model: Option<PathBuf>,

    #[arg(long, env = "AGRIREC_FERTILIZER_MODEL")]
    pub fertilizer_model: Option<PathBuf>,

    #[arg(long, env = "AGRIREC_SUITABILITY_MODEL")]
    pub suitability_model: Option<PathBuf>,

    /// A crop is suitable when its probability is strictly above this
    #[arg(long, env = "AGRIREC_SUITABILITY_THRESHOLD", default_value_t = DEFAULT_SUITABILITY_THRESHOLD)]
    pub suitability_threshold: f64,

    /// How to fill model columns no request field maps to
    #[arg(long, env = "AGRIREC_UNMATCHED_COLUMNS", default_value_t = UnmatchedPolicy::Zero)]
    pub unmatched_columns: UnmatchedPolicy,
}

impl ArtifactArgs {
    /// Explicit model paths win over the artifacts directory.
    pub fn paths(&self) -> ArtifactPaths {
        let mut paths = ArtifactPaths::in_dir(&self.artifacts_dir);
        if let Some(p) = &self.crop_model {
            paths.crop = p.clone();
        }
        if let Some(p) = &self.fertilizer_model {
            paths.fertilizer = p.clone();
        }
        if let Some(p) = &self.suitability_model {
            paths.suitability = p.clone();
        }
        paths
    }

    pub fn service_config(&self) -> anyhow::Result<ServiceConfig> {
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.suitability_threshold),
            "--suitability-threshold must be within [0, 1], got {}",
            self.suitability_threshold
        );
        Ok(ServiceConfig {
            suitability_threshold: self.suitability_threshold,
            unmatched: self.unmatched_columns,
        })
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long, env = "AGRIREC_ADDR", default_value = "127.0.0.1:5000")]
    pub addr: SocketAddr,

    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    /// State/district table served by /states and /districts
    #[arg(long, env = "AGRIREC_RAINFALL_CSV", default_value = "data2.csv")]
    pub rainfall_csv: PathBuf,

    #[arg(long, env = "AGRIREC_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,
}

impl ServeArgs {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Args)]
pub struct TrainArgs {
    #[arg(long)]
    pub crop_csv: Option<PathBuf>,

    #[arg(long)]
    pub fertilizer_csv: Option<PathBuf>,

    #[arg(long)]
    pub suitability_csv: Option<PathBuf>,

    #[arg(long, env = "AGRIREC_ARTIFACTS", default_value = "artifacts")]
    pub out_dir: PathBuf,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 0.2)]
    pub test_size: f64,

    /// Model family for every dataset, replacing the per-dataset default
    #[arg(long)]
    pub algorithm: Option<Algorithm>,

    /// Distance used by k-NN models (l1, l2 or linf)
    #[arg(long, env = "AGRIREC_KNN_METRIC", default_value_t = Metric::L2)]
    pub knn_metric: Metric,
}

impl TrainArgs {
    pub fn options(&self) -> TrainOptions {
        TrainOptions {
            seed: self.seed,
            test_size: self.test_size,
            algorithm: self.algorithm,
            knn_metric: self.knn_metric,
            ..TrainOptions::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DemoMode {
    #[default]
    Crop,
    Suitability,
}

#[derive(Debug, Clone, Args)]
pub struct DemoArgs {
    #[arg(value_enum, default_value_t = DemoMode::Crop)]
    pub mode: DemoMode,

    #[command(flatten)]
    pub artifacts: ArtifactArgs,
}
