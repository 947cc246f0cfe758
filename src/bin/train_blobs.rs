//! Train a small classifier on synthetic Gaussian blobs
//!
//! Usage: cargo run --bin train_blobs -- [--epochs 200] [--lr 0.05] [--seed 42]

use anyhow::Result;
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rust_nn_modules::nn::{
    BatchNormalization, ChannelwiseScaling, ClassNllCriterion, Criterion, Dropout, Linear,
    LogSoftMax, Module, ReLU, Sequential,
};
use rust_nn_modules::optim::Sgd;

/// Two Gaussian blobs in the plane with one-hot labels.
fn make_blobs(
    samples_per_class: usize,
    rng: &mut StdRng,
) -> (Array2<f64>, Array2<f64>) {
    let n = 2 * samples_per_class;
    let mut inputs = Array2::zeros((n, 2));
    let mut targets = Array2::zeros((n, 2));
    let spread = Normal::new(0.0, 0.8).expect("valid std");

    for class in 0..2 {
        let center = if class == 0 { (-1.5, -1.0) } else { (1.5, 1.0) };
        for i in 0..samples_per_class {
            let row = class * samples_per_class + i;
            inputs[[row, 0]] = center.0 + spread.sample(rng);
            inputs[[row, 1]] = center.1 + spread.sample(rng);
            targets[[row, class]] = 1.0;
        }
    }
    (inputs, targets)
}

fn accuracy(log_probs: &Array2<f64>, targets: &Array2<f64>) -> f64 {
    let mut correct = 0usize;
    for (pred_row, target_row) in log_probs.rows().into_iter().zip(targets.rows()) {
        let predicted = pred_row
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        if target_row[predicted] == 1.0 {
            correct += 1;
        }
    }
    correct as f64 / log_probs.nrows() as f64
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args: Vec<String> = std::env::args().collect();
    let mut epochs = 200usize;
    let mut learning_rate = 0.05f64;
    let mut seed = 42u64;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--epochs" | "-e" => {
                epochs = args.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(epochs);
                i += 2;
            }
            "--lr" => {
                learning_rate = args
                    .get(i + 1)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(learning_rate);
                i += 2;
            }
            "--seed" | "-s" => {
                seed = args.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(seed);
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let (train_x, train_y) = make_blobs(200, &mut rng);
    let (test_x, test_y) = make_blobs(50, &mut rng);
    info!(
        train = train_x.nrows(),
        test = test_x.nrows(),
        "generated blob dataset"
    );

    let mut model = Sequential::new()
        .add(Linear::new(2, 16))
        .add(ReLU::new())
        .add(BatchNormalization::new(16))
        .add(ChannelwiseScaling::new(16))
        .add(Dropout::with_seed(0.8, seed)?)
        .add(Linear::new(16, 2))
        .add(LogSoftMax::new());
    let mut criterion = ClassNllCriterion::new();
    let mut sgd = Sgd::new(learning_rate).with_momentum(0.9);

    let batch_size = 32usize;
    let n_samples = train_x.nrows();
    let mut indices: Vec<usize> = (0..n_samples).collect();

    model.train();
    for epoch in 0..epochs {
        indices.shuffle(&mut rng);
        let mut epoch_loss = 0.0;
        let mut batches = 0usize;

        for chunk in indices.chunks(batch_size) {
            let batch_x = train_x.select(Axis(0), chunk);
            let batch_y = train_y.select(Axis(0), chunk);

            model.zero_grad_parameters();
            let log_probs = model.forward(&batch_x)?;
            epoch_loss += criterion.forward(&log_probs, &batch_y)?;
            let grad = criterion.backward(&log_probs, &batch_y)?;
            model.backward(&batch_x, &grad)?;
            sgd.step(&mut model);
            batches += 1;
        }

        if (epoch + 1) % 20 == 0 {
            info!(
                epoch = epoch + 1,
                loss = epoch_loss / batches as f64,
                "training"
            );
        }
    }

    model.evaluate();
    let train_acc = accuracy(&model.forward(&train_x)?, &train_y);
    let test_acc = accuracy(&model.forward(&test_x)?, &test_y);
    info!(train_acc, test_acc, "final accuracy");

    Ok(())
}
