use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{NnError, Result};
use crate::network::network::Network;
use crate::train::train_config::TrainConfig;

/// A fully serializable description of a network architecture plus the
/// hyperparameters used to train it.
///
/// `NetworkSpec` can be saved to / loaded from JSON independently of the
/// trained weights, so a run can be described before training starts.
///
/// ```json
/// {
///   "name": "mnist",
///   "layer_sizes": [784, 1000, 100, 10],
///   "activation": "sigmoid",
///   "train": { "epochs": 20, "learning_rate": 0.01 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Human-readable name used as the default model file stem.
    pub name: String,
    /// Neuron counts per layer, input first.
    pub layer_sizes: Vec<usize>,
    #[serde(default)]
    pub activation: ActivationFunction,
    #[serde(default)]
    pub train: TrainConfig,
}

impl NetworkSpec {
    pub fn new(name: impl Into<String>, layer_sizes: Vec<usize>) -> NetworkSpec {
        NetworkSpec {
            name: name.into(),
            layer_sizes,
            activation: ActivationFunction::Sigmoid,
            train: TrainConfig::default(),
        }
    }

    /// 28×28 digits → 1000 → 100 → 10 classes.
    pub fn mnist() -> NetworkSpec {
        NetworkSpec::new("mnist", vec![28 * 28, 1000, 100, 10])
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(NnError::InvalidConfig("spec name must not be empty".to_owned()));
        }
        if self.layer_sizes.len() < 2 || self.layer_sizes.contains(&0) {
            return Err(NnError::InvalidConfig(format!(
                "layer_sizes must list at least two non-zero sizes, got {:?}",
                self.layer_sizes
            )));
        }
        self.train.validate()
    }

    /// Builds a freshly initialized network, seeded from `train.seed` when set.
    pub fn build(&self) -> Result<Network> {
        let mut rng = match self.train.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.build_with_rng(&mut rng)
    }

    pub fn build_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Network> {
        self.validate()?;
        Network::new(&self.layer_sizes, self.activation, rng)
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes and validates a `NetworkSpec` from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<NetworkSpec> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let spec: NetworkSpec = serde_json::from_reader(reader)?;
        spec.validate()?;
        Ok(spec)
    }
}
