use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::data::dataset::Dataset;
use crate::error::{NnError, Result};
use crate::network::network::Network;
use crate::optim::sgd::Sgd;
use crate::train::epoch_stats::EpochStats;
use crate::train::evaluate::evaluate;
use crate::train::train_config::TrainConfig;
use crate::train::trainer::train_in_order;

/// Trains `network` for `config.epochs` epochs of online SGD and returns the
/// statistics of every epoch.
///
/// # Arguments
/// - `network`    — modified in place
/// - `train`      — training samples
/// - `validation` — optional held-out samples, evaluated after each epoch
/// - `config`     — epochs, learning rate, shuffling and seed
///
/// # Errors
/// Fails on an invalid config, an empty training set, or samples whose widths
/// do not match the network.
pub fn train_loop(
    network: &mut Network,
    train: &Dataset,
    validation: Option<&Dataset>,
    config: &TrainConfig,
) -> Result<Vec<EpochStats>> {
    config.validate()?;
    if train.is_empty() {
        return Err(NnError::InvalidData("training set is empty".to_owned()));
    }
    train.check_fits(network)?;
    if let Some(val) = validation {
        val.check_fits(network)?;
    }

    let optimizer = Sgd::new(config.learning_rate);
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut order: Vec<usize> = (0..train.len()).collect();
    let mut history = Vec::with_capacity(config.epochs);

    info!(
        samples = train.len(),
        epochs = config.epochs,
        learning_rate = config.learning_rate,
        shuffle = config.shuffle,
        "starting training"
    );

    for epoch in 1..=config.epochs {
        let t_start = Instant::now();

        if config.shuffle {
            order.shuffle(&mut rng);
        }
        let train_loss = train_in_order(network, train, order.iter().copied(), &optimizer)?;
        let elapsed_ms = t_start.elapsed().as_millis() as u64;

        let (val_loss, val_accuracy) = match validation {
            Some(val) if !val.is_empty() => {
                let report = evaluate(network, val)?;
                (Some(report.loss), Some(report.accuracy()))
            }
            _ => (None, None),
        };

        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss,
            val_loss,
            val_accuracy,
            elapsed_ms,
        };

        match (stats.val_loss, stats.val_accuracy) {
            (Some(vl), Some(va)) => info!(
                "epoch {}/{}: train loss {:.6}, val loss {:.6}, val accuracy {:.2}% ({} ms)",
                epoch, config.epochs, train_loss, vl, va * 100.0, elapsed_ms
            ),
            _ => info!(
                "epoch {}/{}: train loss {:.6} ({} ms)",
                epoch, config.epochs, train_loss, elapsed_ms
            ),
        }
        debug!(?stats, "epoch finished");
        history.push(stats);
    }

    Ok(history)
}
