//! dense-nn: a from-scratch fully-connected feed-forward network.
//!
//! The core is [`Matrix`], [`Layer`] and [`Network`]: forward inference,
//! backpropagation with plain SGD, and parameter persistence. [`data`] and
//! [`train`] add MNIST IDX loading, image preprocessing and an epoch driver
//! on top.
//!
//! ```
//! use dense_nn::{ActivationFunction, Network};
//!
//! let mut network = Network::with_seed(&[2, 3, 1], ActivationFunction::Sigmoid, 0)?;
//! let before = network.loss(&[1.0, 0.0], &[1.0])?;
//! for _ in 0..100 {
//!     network.train(&[1.0, 0.0], &[1.0], 0.5)?;
//! }
//! assert!(network.loss(&[1.0, 0.0], &[1.0])? < before);
//! # Ok::<(), dense_nn::NnError>(())
//! ```

pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod train;
pub mod data;
pub mod error;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::network::Network;
pub use network::persist::ModelFormat;
pub use network::spec::NetworkSpec;
pub use loss::mse::MseLoss;
pub use optim::sgd::Sgd;
pub use data::dataset::Dataset;
pub use train::{train_loop, train_network, EpochStats, EvalReport, TrainConfig};
pub use error::{NnError, Result};
