use std::sync::{mpsc, Arc, Mutex};

use rand::{rngs::StdRng, Rng, SeedableRng};

use ferrite_mlp::optim::{MinimizeOutcome, MinimizeStatus, MinimizerFactory, OptimizerFactory};
use ferrite_mlp::{
    ActivationFunction, LossFunction, Matrix, Minimizer, MlpClassifier, MlpError, MlpRegressor,
    Objective, Optimizer, Solver, TrainConfig,
};

/// `n` rows of `x` uniform in `[-1, 1)` and `y = x · theta`.
fn linear_data(n: usize, n_features: usize, n_outputs: usize, seed: u64) -> (Matrix, Matrix) {
    let mut rng = StdRng::seed_from_u64(seed);
    let theta = Matrix::random(n_features, n_outputs, &mut rng);
    let mut x = Matrix::zeros(n, n_features);
    x.data.iter_mut().for_each(|v| *v = rng.gen_range(-1.0..1.0));
    let y = &x * &theta;
    (x, y)
}

fn identity_config(solver: Solver, epochs: usize) -> TrainConfig {
    TrainConfig {
        activation: ActivationFunction::Identity,
        solver,
        epochs,
        random_state: Some(7),
        ..TrainConfig::default()
    }
}

#[test]
fn adam_halves_the_first_epoch_loss_on_a_linear_map() {
    let (mut x, mut y) = linear_data(2000, 3, 2, 11);
    let (x0, y0) = (x.clone(), y.clone());
    let (tx, rx) = mpsc::channel();
    let mut regr = MlpRegressor::with_config(TrainConfig {
        progress_tx: Some(tx),
        ..identity_config(Solver::default(), 40)
    });

    let report = regr.fit(&mut x, &mut y).unwrap();

    assert_eq!(report.epochs_run, 40);
    assert!(report.j <= 0.5 * report.j_first, "{report:?}");
    assert_eq!((x, y), (x0, y0), "rows must come back in their original order");

    let stats: Vec<_> = rx.try_iter().collect();
    assert_eq!(stats.len(), 40);
    assert_eq!(stats[0].epoch, 1);
    assert_eq!(stats[39].total_epochs, 40);
    assert_eq!(stats[39].loss, report.j);
}

#[test]
fn lbfgs_solves_a_linear_map() {
    let (mut x, mut y) = linear_data(200, 3, 2, 12);
    let mut regr = MlpRegressor::with_config(identity_config("lbfgs".parse().unwrap(), 200));

    let report = regr.fit(&mut x, &mut y).unwrap();

    assert!(report.evaluations <= 200);
    assert_eq!(report.epochs_run, report.evaluations);
    assert!(report.j < 1e-6, "{report:?}");
    assert!(regr.score(&x, &y).unwrap() > 0.9999);
}

#[test]
fn lbfgs_classifier_separates_a_threshold() {
    let mut x = Matrix::from_vec(40, 1, (0..40).map(|i| -1.0 + (i as f64 + 0.5) / 20.0).collect());
    let mut y = x.map(|v| if v > 0.0 { 1.0 } else { 0.0 });
    let mut clf = MlpClassifier::from_names(&[], "relu", "lbfgs", 0.0).unwrap();
    clf.config_mut().epochs = 100;
    clf.config_mut().random_state = Some(3);

    let report = clf.fit(&mut x, &mut y).unwrap();

    assert!(report.j < report.j_first);
    assert!(clf.score(&x, &y).unwrap() >= 0.95);
    let proba = clf.predict_proba(&x).unwrap();
    assert!(proba.data.iter().all(|&p| (0.0..=1.0).contains(&p)));
}

#[test]
fn every_solver_reduces_the_loss() {
    for name in ["sgd", "momentum", "agd", "adagrad", "rmsprop", "adadelta", "adam", "lbfgs"] {
        let (mut x, mut y) = linear_data(200, 3, 1, 13);
        let mut regr = MlpRegressor::with_config(identity_config(name.parse().unwrap(), 20));
        let report = regr.fit(&mut x, &mut y).unwrap();
        assert!(report.j <= report.j_first, "{name}: {report:?}");
        assert!(report.j.is_finite(), "{name}");
    }
}

#[test]
fn hidden_layers_train_with_minibatches() {
    let (mut x, mut y) = linear_data(300, 2, 1, 14);
    let mut regr = MlpRegressor::with_config(TrainConfig {
        hidden_layer_sizes: vec![8],
        activation: ActivationFunction::Tanh,
        mini_batch_size: 32,
        weight_decay: 1e-4,
        gradient_clipping: Some(10.0),
        alpha: 1e-3,
        epochs: 60,
        random_state: Some(1),
        ..TrainConfig::default()
    });
    // Square loss keeps the hidden activation on the output layer.
    let report = regr.fit(&mut x, &mut y).unwrap();
    assert!(report.j < report.j_first, "{report:?}");
    let net = regr.network().unwrap();
    assert_eq!(net.layer(1).activation().to_string(), "tanh");
    assert!(net.layer(0).diagnostic_loss() >= 0.0);
}

#[derive(Debug)]
struct Frozen;

impl Optimizer for Frozen {
    fn update(&mut self, _grad: &[f64], update: &mut [f64]) {
        update.fill(0.0);
    }
}

fn frozen_config(early_stopping: bool) -> TrainConfig {
    TrainConfig {
        solver: Solver::CustomOptimizer(OptimizerFactory::new(|| Box::new(Frozen))),
        activation: ActivationFunction::Identity,
        shuffle: false,
        epochs: 10,
        early_stopping,
        max_epoch_without_progress: 3,
        random_state: Some(2),
        ..TrainConfig::default()
    }
}

#[test]
fn early_stopping_ends_a_stalled_fit() {
    let (mut x, mut y) = linear_data(50, 2, 1, 15);
    let mut regr = MlpRegressor::with_config(frozen_config(true));
    let report = regr.fit(&mut x, &mut y).unwrap();
    assert_eq!(report.epochs_run, 4);
    assert!(report.stalled && report.stopped_early);
    assert_eq!(report.j, report.j_first);
}

#[test]
fn a_stall_without_early_stopping_is_only_reported() {
    let (mut x, mut y) = linear_data(50, 2, 1, 15);
    let mut regr = MlpRegressor::with_config(frozen_config(false));
    let report = regr.fit(&mut x, &mut y).unwrap();
    assert_eq!(report.epochs_run, 10);
    assert!(report.stalled);
    assert!(!report.stopped_early);
}

/// Evaluates the start point, then gives up reporting a made-up best point.
#[derive(Debug)]
struct GivesUp {
    evaluated: Arc<Mutex<Vec<f64>>>,
}

impl Minimizer for GivesUp {
    fn minimize(
        &mut self,
        objective: &mut dyn Objective,
        x0: &[f64],
        _max_evaluations: usize,
    ) -> ferrite_mlp::Result<MinimizeOutcome> {
        let f = objective.func(x0)?;
        let mut g = vec![0.0; x0.len()];
        objective.grad(x0, &mut g)?;
        *self.evaluated.lock().unwrap() = g;
        Ok(MinimizeOutcome {
            x: vec![0.25; x0.len()],
            f,
            evaluations: 1,
            status: MinimizeStatus::Failed("no descent direction".to_string()),
        })
    }
}

#[test]
fn failed_minimizer_keeps_its_best_point() {
    let evaluated = Arc::new(Mutex::new(Vec::new()));
    let shared = Arc::clone(&evaluated);
    let (mut x, mut y) = linear_data(30, 2, 1, 16);
    let mut regr = MlpRegressor::with_config(identity_config(
        Solver::CustomMinimizer(MinimizerFactory::new(move || {
            Box::new(GivesUp {
                evaluated: Arc::clone(&shared),
            })
        })),
        50,
    ));

    let err = regr.fit(&mut x, &mut y).unwrap_err();

    assert_eq!(err, MlpError::ExternalOptimizer("no descent direction".to_string()));
    let net = regr.network().unwrap();
    assert!(net.flat_theta().iter().all(|&t| t == 0.25));
    assert!(net.layers().iter().all(|l| !l.has_optimizer()));
    let g = evaluated.lock().unwrap();
    assert_eq!(g.len(), net.n_params());
    assert!(g.iter().any(|&v| v != 0.0));
}

#[test]
fn non_finite_data_fails_fast() {
    let (mut x, mut y) = linear_data(20, 2, 1, 17);
    x.set(3, 1, f64::NAN);
    let mut regr = MlpRegressor::with_config(identity_config(Solver::default(), 5));
    let err = regr.fit(&mut x, &mut y).unwrap_err();
    assert!(
        matches!(err, MlpError::NumericalInstability { epoch: 1, .. }),
        "{err}"
    );
    assert!(regr.network().is_some());
}

#[test]
fn bad_shapes_and_names_are_configuration_errors() {
    let (mut x, _) = linear_data(10, 3, 1, 18);
    let mut y = Matrix::zeros(9, 1);
    let mut regr = MlpRegressor::with_config(identity_config(Solver::default(), 5));
    assert_eq!(
        regr.fit(&mut x, &mut y),
        Err(MlpError::DimensionMismatch {
            what: "Y rows",
            got: 9,
            expected: 10,
        })
    );

    assert!(matches!(
        MlpRegressor::from_names(&[5], "swish", "adam", 0.0),
        Err(MlpError::Configuration(_))
    ));
    assert!(matches!(
        MlpRegressor::from_names(&[5], "relu", "newton", 0.0),
        Err(MlpError::Configuration(_))
    ));
    assert!(matches!(
        "hinge".parse::<LossFunction>(),
        Err(MlpError::Configuration(_))
    ));

    let mut untrained = MlpRegressor::default();
    assert!(matches!(
        untrained.predict(&x),
        Err(MlpError::Configuration(_))
    ));
}

#[test]
fn zero_weights_give_ln2_per_logistic_output() {
    let (x, _) = linear_data(25, 4, 3, 19);
    let y = Matrix::from_vec(25, 3, (0..75).map(|i| (i % 2) as f64).collect());
    let mut clf = MlpClassifier::with_config(TrainConfig {
        hidden_layer_sizes: vec![5],
        activation: ActivationFunction::Logistic,
        loss: LossFunction::CrossEntropy,
        ..TrainConfig::default()
    });
    clf.allocate(4, 3).unwrap().flat_theta_mut().fill(0.0);

    let j = clf.evaluate(&x, &y).unwrap();
    assert!((j - 3.0 * std::f64::consts::LN_2).abs() < 1e-12, "{j}");
}

#[test]
fn elastic_net_penalty_on_unit_weights() {
    let (x, y) = linear_data(4, 2, 2, 20);
    let mut regr = MlpRegressor::with_config(TrainConfig {
        hidden_layer_sizes: vec![3],
        activation: ActivationFunction::Tanh,
        ..TrainConfig::default()
    });
    regr.allocate(2, 2).unwrap().flat_theta_mut().fill(1.0);
    let plain = regr.evaluate(&x, &y).unwrap();

    // Twelve non-bias weights of 1 over four samples: 1/4 * 1/2 * 12.
    regr.config.alpha = 1.0;
    let l2 = regr.evaluate(&x, &y).unwrap();
    assert!((l2 - plain - 1.5).abs() < 1e-12);

    // 1/4 * (1/2 * 12 + 1/4 * 12)
    regr.config.l1_ratio = 0.5;
    let mixed = regr.evaluate(&x, &y).unwrap();
    assert!((mixed - plain - 2.25).abs() < 1e-12);
}

#[test]
fn warm_start_trains_the_weights_written_before_fit() {
    let (mut x, _) = linear_data(25, 4, 3, 21);
    let mut y = Matrix::from_vec(25, 3, (0..75).map(|i| (i % 3 == 0) as u8 as f64).collect());
    let mut clf = MlpClassifier::with_config(TrainConfig {
        hidden_layer_sizes: vec![5],
        activation: ActivationFunction::Logistic,
        loss: LossFunction::CrossEntropy,
        solver: "lbfgs".parse().unwrap(),
        epochs: 1,
        warm_start: true,
        ..TrainConfig::default()
    });
    clf.allocate(4, 3).unwrap().flat_theta_mut().fill(0.0);

    let report = clf.fit(&mut x, &mut y).unwrap();
    assert_eq!(report.evaluations, 1);
    assert!((report.j_first - 3.0 * std::f64::consts::LN_2).abs() < 1e-12);
}

#[test]
fn warm_start_after_a_solver_change_keeps_training() {
    let (mut x, mut y) = linear_data(200, 3, 2, 22);
    let mut regr = MlpRegressor::with_config(TrainConfig {
        warm_start: true,
        ..identity_config("lbfgs".parse().unwrap(), 3)
    });
    regr.fit(&mut x, &mut y).unwrap();
    assert!(regr.network().unwrap().layers().iter().all(|l| !l.has_optimizer()));
    let before = regr.network().unwrap().flat_theta().to_vec();

    regr.config.solver = Solver::default();
    regr.config.epochs = 30;
    let report = regr.fit(&mut x, &mut y).unwrap();

    let net = regr.network().unwrap();
    assert!(net.layers().iter().all(|l| l.has_optimizer()));
    assert_ne!(net.flat_theta(), &before[..]);
    assert!(report.j < report.j_first, "{report:?}");
}

#[test]
fn warm_start_rejects_an_output_layer_the_loss_cannot_use() {
    let (mut x, _) = linear_data(20, 2, 1, 23);
    let mut y = Matrix::from_vec(20, 1, (0..20).map(|i| (x.at(i, 0) > 0.0) as u8 as f64).collect());
    let mut regr = MlpRegressor::with_config(TrainConfig {
        warm_start: true,
        ..identity_config(Solver::default(), 2)
    });
    regr.allocate(2, 1).unwrap();

    regr.config.loss = LossFunction::CrossEntropy;
    assert!(matches!(
        regr.fit(&mut x, &mut y),
        Err(MlpError::Configuration(_))
    ));

    regr.config.warm_start = false;
    regr.fit(&mut x, &mut y).unwrap();
    assert_eq!(
        regr.network().unwrap().layer(0).activation().to_string(),
        "logistic"
    );
}

#[test]
fn full_batch_blow_up_restores_the_best_evaluated_weights() {
    let mut x = Matrix::from_data(vec![vec![1e100]]);
    let mut y = Matrix::from_data(vec![vec![0.0]]);
    let mut regr = MlpRegressor::with_config(TrainConfig {
        warm_start: true,
        ..identity_config("lbfgs".parse().unwrap(), 10)
    });
    let start = regr.allocate(1, 1).unwrap().flat_theta().to_vec();

    let err = regr.fit(&mut x, &mut y).unwrap_err();

    assert!(matches!(err, MlpError::NumericalInstability { .. }), "{err}");
    assert_eq!(regr.network().unwrap().flat_theta(), &start[..]);
}

#[test]
fn regressor_scores_accuracy_under_a_log_loss() {
    let mut x = Matrix::from_vec(40, 1, (0..40).map(|i| -1.0 + (i as f64 + 0.5) / 20.0).collect());
    let mut y = x.map(|v| if v > 0.0 { 1.0 } else { 0.0 });
    let mut regr = MlpRegressor::from_names(&[], "relu", "lbfgs", 0.0).unwrap();
    regr.config.loss = LossFunction::Log;
    regr.config.epochs = 100;
    regr.config.random_state = Some(3);
    regr.fit(&mut x, &mut y).unwrap();

    let labels = regr.predict(&x).unwrap().map(|p| if p >= 0.5 { 1.0 } else { 0.0 });
    let expected = ferrite_mlp::metrics::accuracy_score(y.view(), labels.view());
    let score = regr.score(&x, &y).unwrap();
    assert_eq!(score, expected);
    assert!(score >= 0.95);
}
