pub mod epoch_stats;
pub mod loop_fn;
pub mod shuffle;
pub mod train_config;
pub mod trainer;

pub use epoch_stats::EpochStats;
pub use loop_fn::{EpochMode, EpochRunner, EpochTrainer, FitReport, FullBatchRunner, MinibatchRunner};
pub use shuffle::{RowShuffler, ShuffledRows};
pub use train_config::TrainConfig;
pub use trainer::{MlpClassifier, MlpRegressor};
