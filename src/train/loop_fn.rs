use std::ops::Range;
use std::time::Instant;

use log::{debug, warn};

use crate::error::{MlpError, Result};
use crate::math::matrix::Matrix;
use crate::network::{backprop::BackpropOptions, network::Network};
use crate::optim::minimize::{MinimizeStatus, Minimizer, Objective};
use crate::train::epoch_stats::EpochStats;
use crate::train::shuffle::{RowShuffler, ShuffledRows};
use crate::train::train_config::TrainConfig;

const DEFAULT_BATCH_SIZE: usize = 200;

/// Rows per minibatch: the configured size clamped to `n_samples`, or
/// `min(n_samples, 200)` when unset.
pub fn effective_batch_size(configured: usize, n_samples: usize) -> usize {
    let size = if configured == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        configured
    };
    size.min(n_samples).max(1)
}

/// Contiguous `[start, end)` row ranges; the last one holds the remainder.
pub fn minibatch_ranges(n_samples: usize, batch_size: usize) -> impl Iterator<Item = Range<usize>> {
    (0..n_samples)
        .step_by(batch_size.max(1))
        .map(move |start| start..(start + batch_size).min(n_samples))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochMode {
    /// Shuffle, decay, split into minibatches and let each layer's
    /// optimizer step after every batch.
    Minibatch,
    /// One batch of every row in stored order; weights are left alone.
    FullBatch,
}

/// How a fit went.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub epochs_run: usize,
    /// Objective evaluations; equal to `epochs_run` for minibatch solvers.
    pub evaluations: usize,
    /// Loss of the first epoch.
    pub j_first: f64,
    /// Final loss.
    pub j: f64,
    /// The no-progress patience was reached at least once.
    pub stalled: bool,
    pub stopped_early: bool,
}

/// Runs single epochs of one fit and keeps the bookkeeping every driver
/// shares: first and previous loss, the no-progress counter and progress
/// reporting.
pub struct EpochTrainer<'a> {
    pub network: &'a mut Network,
    pub config: &'a TrainConfig,
    x: &'a mut Matrix,
    y: &'a mut Matrix,
    shuffler: RowShuffler,
    total_epochs: usize,
    epochs_run: usize,
    j_first: Option<f64>,
    j_prev: f64,
    without_progress: usize,
}

impl<'a> EpochTrainer<'a> {
    pub fn new(
        network: &'a mut Network,
        config: &'a TrainConfig,
        x: &'a mut Matrix,
        y: &'a mut Matrix,
    ) -> Result<Self> {
        if x.rows != y.rows {
            return Err(MlpError::DimensionMismatch {
                what: "Y rows",
                got: y.rows,
                expected: x.rows,
            });
        }
        if x.rows == 0 {
            return Err(MlpError::config("cannot fit on zero samples"));
        }
        let total_epochs = config.epochs_for(x.rows);
        Ok(EpochTrainer {
            network,
            config,
            x,
            y,
            shuffler: RowShuffler::new(config.random_state),
            total_epochs,
            epochs_run: 0,
            j_first: None,
            j_prev: f64::INFINITY,
            without_progress: 0,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.x.rows
    }

    pub fn total_epochs(&self) -> usize {
        self.total_epochs
    }

    pub fn epochs_run(&self) -> usize {
        self.epochs_run
    }

    /// Consecutive epochs whose loss did not strictly decrease.
    pub fn without_progress(&self) -> usize {
        self.without_progress
    }

    /// One pass over every row. Returns the summed minibatch loss.
    pub fn run_epoch(&mut self, mode: EpochMode) -> Result<f64> {
        let started = Instant::now();
        let n_samples = self.x.rows;
        let minibatch = mode == EpochMode::Minibatch;

        if minibatch && self.config.weight_decay > 0.0 {
            self.network.decay_weights(self.config.weight_decay);
        }
        let batch_size = if minibatch {
            effective_batch_size(self.config.mini_batch_size, n_samples)
        } else {
            n_samples
        };
        let opts = BackpropOptions {
            loss: &self.config.loss,
            alpha: self.config.alpha,
            l1_ratio: self.config.l1_ratio,
            gradient_clipping: self.config.gradient_clipping,
            apply_updates: minibatch,
            epoch: self.epochs_run + 1,
        };

        let shuffler = (minibatch && self.config.shuffle).then_some(&mut self.shuffler);
        let rows = ShuffledRows::new(self.x, self.y, shuffler);
        let mut j = 0.0;
        for batch in minibatch_ranges(n_samples, batch_size) {
            self.network
                .forward(rows.x().rows_range(batch.start, batch.end), None)?;
            j += self
                .network
                .backprop(rows.y().rows_range(batch.start, batch.end), n_samples, &opts)?;
        }
        drop(rows);

        self.record(j, started);
        Ok(j)
    }

    fn record(&mut self, j: f64, started: Instant) {
        self.epochs_run += 1;
        self.j_first.get_or_insert(j);
        if j >= self.j_prev {
            self.without_progress += 1;
        } else {
            self.without_progress = 0;
        }
        self.j_prev = j;

        debug!(
            "epoch {}/{} loss {:.6} ({} without progress)",
            self.epochs_run, self.total_epochs, j, self.without_progress
        );
        if let Some(tx) = &self.config.progress_tx {
            let _ = tx.send(EpochStats {
                epoch: self.epochs_run,
                total_epochs: self.total_epochs,
                loss: j,
                epochs_without_progress: self.without_progress,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }
    }

    fn report(&self, j: f64, evaluations: usize) -> FitReport {
        FitReport {
            epochs_run: self.epochs_run,
            evaluations,
            j_first: self.j_first.unwrap_or(f64::NAN),
            j,
            stalled: false,
            stopped_early: false,
        }
    }
}

/// One way of driving a fit through `EpochTrainer::run_epoch`.
pub trait EpochRunner {
    fn run(&mut self, trainer: &mut EpochTrainer<'_>) -> Result<FitReport>;
}

/// Per-layer optimizers stepping after every minibatch.
#[derive(Debug, Default)]
pub struct MinibatchRunner;

impl EpochRunner for MinibatchRunner {
    fn run(&mut self, trainer: &mut EpochTrainer<'_>) -> Result<FitReport> {
        let patience = trainer.config.patience();
        let mut j = f64::INFINITY;
        let (mut stalled, mut stopped_early) = (false, false);

        for _ in 0..trainer.total_epochs() {
            j = trainer.run_epoch(EpochMode::Minibatch)?;
            if trainer.without_progress() == patience {
                warn!("{patience} epochs without progress at epoch {}", trainer.epochs_run());
                stalled = true;
                if trainer.config.early_stopping {
                    stopped_early = true;
                    break;
                }
            }
        }

        let mut report = trainer.report(j, trainer.epochs_run());
        report.stalled = stalled;
        report.stopped_early = stopped_early;
        Ok(report)
    }
}

/// Hands the flat parameter vector to a full-batch minimizer. Every
/// objective evaluation is one full-batch epoch.
#[derive(Debug)]
pub struct FullBatchRunner {
    minimizer: Box<dyn Minimizer>,
}

impl FullBatchRunner {
    pub fn new(minimizer: Box<dyn Minimizer>) -> Self {
        FullBatchRunner { minimizer }
    }
}

impl EpochRunner for FullBatchRunner {
    fn run(&mut self, trainer: &mut EpochTrainer<'_>) -> Result<FitReport> {
        let x0 = trainer.network.flat_theta().to_vec();
        let budget = trainer.total_epochs();
        let mut objective = EpochObjective {
            trainer: &mut *trainer,
            best: None,
        };
        let result = self.minimizer.minimize(&mut objective, &x0, budget);
        let best = objective.best.take();

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                let (f, x) = best.unwrap_or((f64::NAN, x0));
                warn!("full-batch fit aborted ({err}); restoring the point with loss {f}");
                trainer.network.flat_theta_mut().copy_from_slice(&x);
                return Err(err);
            }
        };

        let theta = trainer.network.flat_theta_mut();
        if outcome.x.len() != theta.len() {
            return Err(MlpError::DimensionMismatch {
                what: "minimizer solution",
                got: outcome.x.len(),
                expected: theta.len(),
            });
        }
        theta.copy_from_slice(&outcome.x);

        match outcome.status {
            MinimizeStatus::Failed(msg) => {
                warn!("minimizer failed after {} evaluations: {msg}", outcome.evaluations);
                Err(MlpError::ExternalOptimizer(msg))
            }
            MinimizeStatus::Converged | MinimizeStatus::BudgetExhausted => {
                Ok(trainer.report(outcome.f, outcome.evaluations))
            }
        }
    }
}

struct EpochObjective<'t, 'a> {
    trainer: &'t mut EpochTrainer<'a>,
    /// Lowest finite loss evaluated so far and its parameters.
    best: Option<(f64, Vec<f64>)>,
}

impl Objective for EpochObjective<'_, '_> {
    fn func(&mut self, x: &[f64]) -> Result<f64> {
        let theta = self.trainer.network.flat_theta_mut();
        if x.len() != theta.len() {
            return Err(MlpError::DimensionMismatch {
                what: "parameter vector",
                got: x.len(),
                expected: theta.len(),
            });
        }
        theta.copy_from_slice(x);
        let j = self.trainer.run_epoch(EpochMode::FullBatch)?;
        if self.best.as_ref().map_or(true, |(f, _)| j < *f) {
            self.best = Some((j, x.to_vec()));
        }
        Ok(j)
    }

    /// The gradient left in the arena by the preceding `func(x)`.
    fn grad(&mut self, _x: &[f64], grad: &mut [f64]) -> Result<()> {
        let flat = self.trainer.network.flat_grad();
        if grad.len() != flat.len() {
            return Err(MlpError::DimensionMismatch {
                what: "gradient vector",
                got: grad.len(),
                expected: flat.len(),
            });
        }
        grad.copy_from_slice(flat);
        Ok(())
    }
}
