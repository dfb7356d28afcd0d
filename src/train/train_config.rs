use serde::{Deserialize, Serialize};
use std::sync::mpsc;

use crate::activation::activation::ActivationFunction;
use crate::error::{MlpError, Result};
use crate::loss::loss_type::LossFunction;
use crate::optim::solver::Solver;
use crate::train::epoch_stats::EpochStats;

/// Hyperparameters of a fit.
///
/// Zero in `mini_batch_size`, `epochs` or `max_epoch_without_progress`
/// selects the default for the data being fitted: `min(n, 200)` samples per
/// batch, `10^6 / n` epochs and a patience of 10 epochs.
///
/// `progress_tx` is not serialized; when set, one `EpochStats` is sent per
/// completed epoch. A dropped receiver does not stop training.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub hidden_layer_sizes: Vec<usize>,
    pub activation: ActivationFunction,
    pub loss: LossFunction,
    pub solver: Solver,
    pub alpha: f64,
    pub l1_ratio: f64,
    pub weight_decay: f64,
    pub gradient_clipping: Option<f64>,
    pub mini_batch_size: usize,
    pub epochs: usize,
    pub shuffle: bool,
    pub early_stopping: bool,
    pub max_epoch_without_progress: usize,
    pub random_state: Option<u64>,
    /// Keep the current weights (and optimizer state) across `fit` calls
    /// when the shapes still match.
    pub warm_start: bool,
    #[serde(skip)]
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            hidden_layer_sizes: Vec::new(),
            activation: ActivationFunction::ReLU,
            loss: LossFunction::Square,
            solver: Solver::default(),
            alpha: 0.0,
            l1_ratio: 0.0,
            weight_decay: 0.0,
            gradient_clipping: None,
            mini_batch_size: 0,
            epochs: 0,
            shuffle: true,
            early_stopping: false,
            max_epoch_without_progress: 0,
            random_state: None,
            warm_start: false,
            progress_tx: None,
        }
    }
}

impl TrainConfig {
    pub const DEFAULT_PATIENCE: usize = 10;

    /// Checks every hyperparameter that can be checked without data.
    pub fn validate(&self) -> Result<()> {
        if let Some(pos) = self.hidden_layer_sizes.iter().position(|&h| h == 0) {
            return Err(MlpError::config(format!("hidden layer {pos} has no units")));
        }
        if !(self.alpha.is_finite() && self.alpha >= 0.0) {
            return Err(MlpError::config(format!("alpha must be >= 0, got {}", self.alpha)));
        }
        if !(0.0..=1.0).contains(&self.l1_ratio) {
            return Err(MlpError::config(format!(
                "l1_ratio must be in [0,1], got {}",
                self.l1_ratio
            )));
        }
        if !(0.0..1.0).contains(&self.weight_decay) {
            return Err(MlpError::config(format!(
                "weight_decay must be in [0,1), got {}",
                self.weight_decay
            )));
        }
        if let Some(clip) = self.gradient_clipping {
            if !(clip.is_finite() && clip > 0.0) {
                return Err(MlpError::config(format!(
                    "gradient_clipping must be > 0, got {clip}"
                )));
            }
        }
        self.solver.validate()
    }

    /// Epoch budget for `n_samples` rows (also the evaluation budget of a
    /// full-batch minimizer).
    pub fn epochs_for(&self, n_samples: usize) -> usize {
        if self.epochs > 0 {
            self.epochs
        } else {
            (1_000_000 / n_samples.max(1)).max(1)
        }
    }

    pub fn patience(&self) -> usize {
        if self.max_epoch_without_progress > 0 {
            self.max_epoch_without_progress
        } else {
            Self::DEFAULT_PATIENCE
        }
    }

    /// Writes the serializable part of the config as pretty-printed JSON.
    pub fn save_json(&self, path: &str) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Reads a config written by `save_json`. Missing fields take defaults.
    pub fn load_json(path: &str) -> std::io::Result<TrainConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}
