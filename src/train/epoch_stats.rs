use serde::{Deserialize, Serialize};

/// Per-epoch training statistics.
///
/// When a `progress_tx` channel is configured in `TrainConfig`, the scheduler
/// sends one `EpochStats` at the end of every completed epoch (for a
/// full-batch solver, every objective evaluation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Epoch budget of this fit.
    pub total_epochs: usize,
    /// Summed minibatch loss of the epoch, penalties included.
    pub loss: f64,
    /// Consecutive epochs without a strict decrease in `loss`.
    pub epochs_without_progress: usize,
    /// Wall-clock duration of this epoch in milliseconds.
    pub elapsed_ms: u64,
}
