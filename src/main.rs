//! dense-nn command-line interface.
//!
//! Trains a sigmoid network on MNIST-style IDX files, evaluates saved models,
//! classifies single images, and runs a tiny fixed-example demo.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use dense_nn::data::idx::load_idx_pair;
use dense_nn::data::image::image_file_to_input;
use dense_nn::train::{argmax, evaluate};
use dense_nn::{train_loop, ActivationFunction, ModelFormat, Network, NetworkSpec};

#[allow(clippy::approx_constant)]
const DEMO_INPUT: f64 = 3.14;
const DEMO_TARGET: f64 = 0.5;

#[derive(Parser)]
#[command(name = "dense-nn")]
#[command(about = "From-scratch sigmoid network for MNIST-style digit data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: Level,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new network on IDX image/label files
    Train {
        #[arg(long)]
        train_images: PathBuf,

        #[arg(long)]
        train_labels: PathBuf,

        /// Test images evaluated after every epoch and at the end
        #[arg(long, requires = "test_labels")]
        test_images: Option<PathBuf>,

        #[arg(long, requires = "test_images")]
        test_labels: Option<PathBuf>,

        /// JSON network config; defaults to 784,1000,100,10
        #[arg(long)]
        config: Option<PathBuf>,

        /// Comma-separated layer sizes, input first (overrides --config)
        #[arg(long, value_delimiter = ',')]
        layers: Option<Vec<usize>>,

        #[arg(long)]
        epochs: Option<usize>,

        #[arg(long)]
        learning_rate: Option<f64>,

        /// Seed for initialization and shuffling
        #[arg(long)]
        seed: Option<u64>,

        /// Shuffle sample order every epoch
        #[arg(long)]
        shuffle: bool,

        /// Use only the first N training (and test) samples
        #[arg(long)]
        limit: Option<usize>,

        /// Where to write the trained parameters
        #[arg(long, default_value = "weights_and_biases")]
        output: PathBuf,

        /// raw, binary or json (default: from the output extension)
        #[arg(long)]
        format: Option<ModelFormat>,
    },

    /// Report accuracy of a saved model on IDX files
    Eval {
        #[arg(long)]
        model: PathBuf,

        #[arg(long)]
        images: PathBuf,

        #[arg(long)]
        labels: PathBuf,

        /// Layer sizes; required for raw model files
        #[arg(long, value_delimiter = ',')]
        layers: Option<Vec<usize>>,

        #[arg(long)]
        format: Option<ModelFormat>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Classify a single image file with a saved model
    Predict {
        #[arg(long)]
        model: PathBuf,

        #[arg(long)]
        image: PathBuf,

        #[arg(long, default_value = "28")]
        width: u32,

        #[arg(long, default_value = "28")]
        height: u32,

        /// Treat the image as dark strokes on a light background
        #[arg(long)]
        invert: bool,

        #[arg(long, value_delimiter = ',')]
        layers: Option<Vec<usize>>,

        #[arg(long)]
        format: Option<ModelFormat>,
    },

    /// Fit a 4-3-4 network to one constant example and print the cost
    Demo {
        #[arg(long, default_value = "10000")]
        iterations: usize,

        #[arg(long, default_value = "0.001")]
        learning_rate: f64,

        #[arg(long, default_value = "69")]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Train {
            train_images,
            train_labels,
            test_images,
            test_labels,
            config,
            layers,
            epochs,
            learning_rate,
            seed,
            shuffle,
            limit,
            output,
            format,
        } => {
            let mut spec = match &config {
                Some(path) => NetworkSpec::load_json(path)
                    .with_context(|| format!("failed to load network config {}", path.display()))?,
                None => NetworkSpec::mnist(),
            };
            if let Some(layers) = layers {
                spec.layer_sizes = layers;
            }
            if let Some(epochs) = epochs {
                spec.train.epochs = epochs;
            }
            if let Some(lr) = learning_rate {
                spec.train.learning_rate = lr;
            }
            if seed.is_some() {
                spec.train.seed = seed;
            }
            spec.train.shuffle |= shuffle;
            spec.validate()?;

            let n_classes = spec.layer_sizes[spec.layer_sizes.len() - 1];
            let train = load_idx_pair(&train_images, &train_labels, n_classes, limit)
                .with_context(|| format!("failed to read training set {}", train_images.display()))?;
            let test = match (test_images, test_labels) {
                (Some(images), Some(labels)) => Some(
                    load_idx_pair(&images, &labels, n_classes, limit)
                        .with_context(|| format!("failed to read test set {}", images.display()))?,
                ),
                _ => None,
            };

            let mut network = spec.build()?;
            info!(
                name = %spec.name,
                layers = ?spec.layer_sizes,
                parameters = network.parameter_count(),
                "network ready"
            );

            let history = train_loop(&mut network, &train, test.as_ref(), &spec.train)?;
            if let Some(last) = history.last() {
                info!("final training loss {:.6}", last.train_loss);
            }

            if let Some(test) = &test {
                let report = evaluate(&mut network, test)?;
                println!(
                    "The network guessed correctly {} out of {} times, an accuracy of {:.2}%.",
                    report.correct,
                    report.total,
                    report.accuracy() * 100.0
                );
            }

            let format = format.unwrap_or_else(|| ModelFormat::from_path(&output));
            network
                .save_file(&output, format)
                .with_context(|| format!("failed to save model to {}", output.display()))?;
            info!("model saved to {} ({})", output.display(), format);
        }

        Commands::Eval { model, images, labels, layers, format, limit } => {
            let mut network = load_model(&model, format, layers.as_deref())?;
            let dataset = load_idx_pair(&images, &labels, network.output_size(), limit)
                .with_context(|| format!("failed to read {}", images.display()))?;
            let report = evaluate(&mut network, &dataset)?;
            println!(
                "Correct: {}/{}  accuracy: {:.2}%  mean loss: {:.6}",
                report.correct,
                report.total,
                report.accuracy() * 100.0,
                report.loss
            );
        }

        Commands::Predict { model, image, width, height, invert, layers, format } => {
            let mut network = load_model(&model, format, layers.as_deref())?;
            let pixels = width as usize * height as usize;
            if pixels != network.input_size() {
                bail!(
                    "a {}x{} image gives {} inputs but the model expects {}",
                    width,
                    height,
                    pixels,
                    network.input_size()
                );
            }
            let input = image_file_to_input(&image, width, height, invert)
                .with_context(|| format!("failed to read image {}", image.display()))?;
            let output = network.infer(&input)?;
            println!("Network predicts: {}", argmax(output));
            println!("Output scores (per class): {:?}", output);
        }

        Commands::Demo { iterations, learning_rate, seed } => {
            let mut network = Network::with_seed(&[4, 3, 4], ActivationFunction::Sigmoid, seed)?;
            let input = [DEMO_INPUT; 4];
            let target = [DEMO_TARGET; 4];

            println!("cost = {:.6}", network.loss(&input, &target)?);
            println!("---------- TRAINING ----------");
            for i in 0..iterations {
                let loss = network.train(&input, &target, learning_rate)?;
                if i % 1000 == 0 {
                    debug!("iteration {}: cost {:.6}", i, loss);
                }
            }
            println!("output = {:?}", network.infer(&input)?);
            println!("cost = {:.6}", network.loss(&input, &target)?);
        }
    }

    Ok(())
}

fn load_model(path: &Path, format: Option<ModelFormat>, layers: Option<&[usize]>) -> Result<Network> {
    let format = format.unwrap_or_else(|| ModelFormat::from_path(path));
    Network::load_file(path, format, layers)
        .with_context(|| format!("failed to load model {} as {}", path.display(), format))
}
