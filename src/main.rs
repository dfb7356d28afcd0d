use std::{env, error::Error, sync::mpsc, thread};

use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};

use ferrite_mlp::{EpochStats, Matrix, MlpRegressor, TrainConfig};

const N_SAMPLES: usize = 2000;

/// Fits `y = x · theta` on synthetic data. An optional first argument names
/// a JSON `TrainConfig`; run with `RUST_LOG=debug` to see every epoch.
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => TrainConfig::load_json(&path)?,
        None => TrainConfig {
            activation: "identity".parse()?,
            epochs: 40,
            random_state: Some(7),
            ..TrainConfig::default()
        },
    };

    let mut rng = StdRng::seed_from_u64(config.random_state.unwrap_or(0));
    let true_theta = Matrix::random(3, 2, &mut rng);
    let mut x = Matrix::zeros(N_SAMPLES, 3);
    x.data.iter_mut().for_each(|v| *v = rng.gen_range(-1.0..1.0));
    let mut y = &x * &true_theta;

    let (tx, rx) = mpsc::channel::<EpochStats>();
    let printer = thread::spawn(move || {
        for stats in rx {
            println!(
                "epoch {:>4}/{}: loss = {:.6} ({} ms)",
                stats.epoch, stats.total_epochs, stats.loss, stats.elapsed_ms
            );
        }
    });

    let mut regr = MlpRegressor::with_config(TrainConfig {
        progress_tx: Some(tx),
        ..config
    });
    let report = regr.fit(&mut x, &mut y);
    // Closes the channel so the printer thread ends.
    regr.config.progress_tx = None;
    let _ = printer.join();

    let report = report?;
    info!("training report: {report:?}");
    println!("R² on the training set: {:.4}", regr.score(&x, &y)?);
    Ok(())
}
