use log::info;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    activation::activation::{Activation, ActivationFunction},
    error::{MlpError, Result},
    loss::loss_type::LossFunction,
    math::matrix::Matrix,
    metrics::{accuracy_score, r2_score},
    network::{backprop::BackpropOptions, network::Network},
    optim::solver::Solver,
    train::{
        loop_fn::{EpochRunner, EpochTrainer, FitReport, FullBatchRunner, MinibatchRunner},
        train_config::TrainConfig,
    },
};

fn threshold(p: f64) -> f64 {
    if p >= 0.5 {
        1.0
    } else {
        0.0
    }
}

/// Multilayer perceptron regressor.
///
/// ```no_run
/// use ferrite_mlp::{Matrix, MlpRegressor};
///
/// let mut x = Matrix::from_data(vec![vec![0.0], vec![1.0], vec![2.0]]);
/// let mut y = Matrix::from_data(vec![vec![1.0], vec![3.0], vec![5.0]]);
/// let mut regr = MlpRegressor::from_names(&[], "identity", "lbfgs", 0.0)?;
/// regr.fit(&mut x, &mut y)?;
/// let y_pred = regr.predict(&x)?;
/// # Ok::<(), ferrite_mlp::MlpError>(())
/// ```
#[derive(Debug, Default)]
pub struct MlpRegressor {
    pub config: TrainConfig,
    network: Option<Network>,
    report: Option<FitReport>,
}

impl MlpRegressor {
    pub fn new(hidden_layer_sizes: &[usize], activation: ActivationFunction, solver: Solver, alpha: f64) -> Self {
        MlpRegressor::with_config(TrainConfig {
            hidden_layer_sizes: hidden_layer_sizes.to_vec(),
            activation,
            solver,
            alpha,
            ..TrainConfig::default()
        })
    }

    /// Like `new`, resolving the activation and solver by name.
    pub fn from_names(hidden_layer_sizes: &[usize], activation: &str, solver: &str, alpha: f64) -> Result<Self> {
        Ok(MlpRegressor::new(
            hidden_layer_sizes,
            activation.parse()?,
            solver.parse()?,
            alpha,
        ))
    }

    pub fn with_config(config: TrainConfig) -> Self {
        MlpRegressor {
            config,
            network: None,
            report: None,
        }
    }

    pub fn network(&self) -> Option<&Network> {
        self.network.as_ref()
    }

    pub fn network_mut(&mut self) -> Option<&mut Network> {
        self.network.as_mut()
    }

    /// The outcome of the last successful `fit`.
    pub fn report(&self) -> Option<&FitReport> {
        self.report.as_ref()
    }

    /// Builds a freshly initialized network for `n_features -> n_outputs`,
    /// replacing any existing one. Set `warm_start` to have `fit` train the
    /// weights written into it instead of drawing new ones.
    pub fn allocate(&mut self, n_features: usize, n_outputs: usize) -> Result<&mut Network> {
        self.config.validate()?;
        let mut rng = match self.config.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let output_activation = self.output_activation();
        let network = Network::new(
            n_features,
            &self.config.hidden_layer_sizes,
            n_outputs,
            &self.config.activation,
            &output_activation,
            &self.config.solver,
            &mut rng,
        )?;
        Ok(self.network.insert(network))
    }

    fn output_activation(&self) -> ActivationFunction {
        if self.config.loss.requires_logistic_output() {
            ActivationFunction::Logistic
        } else {
            self.config.activation.clone()
        }
    }

    /// Whether `fit` keeps training the current network. With `warm_start`
    /// and matching layer shapes the network is reused with fresh optimizers
    /// for the configured solver.
    fn reuse(&mut self, n_features: usize, n_outputs: usize) -> Result<bool> {
        if !self.config.warm_start {
            return Ok(false);
        }
        let output_activation = self.output_activation();
        let Some(network) = self.network.as_mut() else {
            return Ok(false);
        };
        let hidden: Vec<usize> = network.layers()[..network.layers().len() - 1]
            .iter()
            .map(|l| l.outputs)
            .collect();
        if network.n_features() != n_features
            || network.n_outputs() != n_outputs
            || hidden != self.config.hidden_layer_sizes
        {
            return Ok(false);
        }

        let current = network
            .layers()
            .last()
            .map(|l| l.activation().name().to_string())
            .unwrap_or_default();
        if current != output_activation.name() {
            return Err(MlpError::config(format!(
                "warm start: output layer is {current} but {} loss needs {}",
                self.config.loss,
                output_activation.name()
            )));
        }
        network.reset_optimizers(&self.config.solver);
        Ok(true)
    }

    /// Trains on `x` (samples x features) against `y` (samples x outputs).
    ///
    /// Rows of `x` and `y` are shuffled in place during each epoch and put
    /// back before the epoch ends. The network is kept even when training
    /// fails, holding the last (or, for a failed minimizer, the best)
    /// weights.
    pub fn fit(&mut self, x: &mut Matrix, y: &mut Matrix) -> Result<FitReport> {
        self.config.validate()?;
        if !self.reuse(x.cols, y.cols)? {
            self.allocate(x.cols, y.cols)?;
        }
        let mut network = self
            .network
            .take()
            .ok_or_else(|| MlpError::config("network was not allocated"))?;

        info!(
            "fitting {} samples, {} -> {:?} -> {} with {} ({} weights)",
            x.rows,
            x.cols,
            self.config.hidden_layer_sizes,
            y.cols,
            self.config.solver,
            network.n_params()
        );
        let result = Self::run(&mut network, &self.config, x, y);
        self.network = Some(network);

        let report = result?;
        info!(
            "fit done after {} epochs ({} evaluations): loss {:.6} -> {:.6}",
            report.epochs_run, report.evaluations, report.j_first, report.j
        );
        self.report = Some(report.clone());
        Ok(report)
    }

    fn run(network: &mut Network, config: &TrainConfig, x: &mut Matrix, y: &mut Matrix) -> Result<FitReport> {
        let mut trainer = EpochTrainer::new(network, config, x, y)?;
        match config.solver.build_minimizer() {
            Some(minimizer) => FullBatchRunner::new(minimizer).run(&mut trainer),
            None => MinibatchRunner.run(&mut trainer),
        }
    }

    /// Loss of the current weights on `(x, y)` without touching them.
    pub fn evaluate(&mut self, x: &Matrix, y: &Matrix) -> Result<f64> {
        let config = &self.config;
        let network = self
            .network
            .as_mut()
            .ok_or_else(|| MlpError::config("network was not allocated"))?;
        network.forward(x.view(), None)?;
        network.backprop(
            y.view(),
            x.rows,
            &BackpropOptions {
                loss: &config.loss,
                alpha: config.alpha,
                l1_ratio: config.l1_ratio,
                gradient_clipping: None,
                apply_updates: false,
                epoch: 0,
            },
        )
    }

    pub fn predict(&mut self, x: &Matrix) -> Result<Matrix> {
        let network = self
            .network
            .as_mut()
            .ok_or_else(|| MlpError::config("predict called before fit"))?;
        let mut y_pred = Matrix::default();
        network.forward(x.view(), Some(&mut y_pred))?;
        Ok(y_pred)
    }

    /// R² of the predictions for `x` under the square loss. Any other loss
    /// trains logistic outputs, and the score is then the accuracy of the
    /// predictions thresholded at 0.5.
    pub fn score(&mut self, x: &Matrix, y: &Matrix) -> Result<f64> {
        let y_pred = self.predict(x)?;
        if matches!(self.config.loss, LossFunction::Square) {
            Ok(r2_score(y.view(), y_pred.view()))
        } else {
            let labels = y_pred.map(threshold);
            Ok(accuracy_score(y.view(), labels.view()))
        }
    }
}

/// Multilayer perceptron classifier over independent binary outputs.
///
/// Same engine as `MlpRegressor` with a log loss, which forces a logistic
/// output layer. Predictions are thresholded at 0.5.
#[derive(Debug, Default)]
pub struct MlpClassifier {
    inner: MlpRegressor,
}

impl MlpClassifier {
    pub fn new(hidden_layer_sizes: &[usize], activation: ActivationFunction, solver: Solver, alpha: f64) -> Self {
        let mut inner = MlpRegressor::new(hidden_layer_sizes, activation, solver, alpha);
        inner.config.loss = LossFunction::Log;
        MlpClassifier { inner }
    }

    pub fn from_names(hidden_layer_sizes: &[usize], activation: &str, solver: &str, alpha: f64) -> Result<Self> {
        Ok(MlpClassifier::new(
            hidden_layer_sizes,
            activation.parse()?,
            solver.parse()?,
            alpha,
        ))
    }

    pub fn with_config(config: TrainConfig) -> Self {
        MlpClassifier {
            inner: MlpRegressor::with_config(config),
        }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.inner.config
    }

    pub fn config_mut(&mut self) -> &mut TrainConfig {
        &mut self.inner.config
    }

    pub fn network(&self) -> Option<&Network> {
        self.inner.network()
    }

    pub fn network_mut(&mut self) -> Option<&mut Network> {
        self.inner.network_mut()
    }

    pub fn report(&self) -> Option<&FitReport> {
        self.inner.report()
    }

    pub fn allocate(&mut self, n_features: usize, n_outputs: usize) -> Result<&mut Network> {
        self.inner.allocate(n_features, n_outputs)
    }

    pub fn fit(&mut self, x: &mut Matrix, y: &mut Matrix) -> Result<FitReport> {
        self.inner.fit(x, y)
    }

    pub fn evaluate(&mut self, x: &Matrix, y: &Matrix) -> Result<f64> {
        self.inner.evaluate(x, y)
    }

    /// Output-layer probabilities.
    pub fn predict_proba(&mut self, x: &Matrix) -> Result<Matrix> {
        self.inner.predict(x)
    }

    pub fn predict(&mut self, x: &Matrix) -> Result<Matrix> {
        let proba = self.predict_proba(x)?;
        Ok(proba.map(threshold))
    }

    /// Fraction of rows predicted exactly.
    pub fn score(&mut self, x: &Matrix, y: &Matrix) -> Result<f64> {
        let y_pred = self.predict(x)?;
        Ok(accuracy_score(y.view(), y_pred.view()))
    }
}
