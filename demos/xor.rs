use ferrite_mlp::{Matrix, MlpClassifier, TrainConfig};

fn main() -> ferrite_mlp::Result<()> {
    env_logger::init();

    let mut inputs = Matrix::from_data(vec![
        vec![1.0, 0.0],
        vec![1.0, 1.0],
        vec![0.0, 1.0],
        vec![0.0, 0.0],
    ]);
    let mut expected_outputs = Matrix::from_data(vec![vec![1.0], vec![0.0], vec![1.0], vec![0.0]]);

    let mut clf = MlpClassifier::with_config(TrainConfig {
        hidden_layer_sizes: vec![4],
        activation: "tanh".parse()?,
        loss: "log".parse()?,
        solver: "lbfgs".parse()?,
        epochs: 500,
        random_state: Some(1),
        ..TrainConfig::default()
    });
    let report = clf.fit(&mut inputs, &mut expected_outputs)?;
    println!("loss {:.6} -> {:.6} in {} evaluations", report.j_first, report.j, report.evaluations);

    let proba = clf.predict_proba(&inputs)?;
    let predicted = clf.predict(&inputs)?;
    for i in 0..inputs.rows {
        println!(
            "Input: {:?} -> Output: {:.4} ({})",
            inputs.row(i),
            proba.at(i, 0),
            predicted.at(i, 0)
        );
    }
    println!("accuracy: {}", clf.score(&inputs, &expected_outputs)?);
    Ok(())
}
