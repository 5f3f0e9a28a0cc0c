use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::{
    activation::activation::ActivationFunction,
    error::{NnError, Result},
    layers::dense::Layer,
    loss::mse::MseLoss,
    math::matrix::Matrix,
    optim::sgd::Sgd,
    train::evaluate::argmax,
};

/// Fully-connected feed-forward network.
///
/// `layer_sizes[0]` is the input width and `layer_sizes[L-1]` the output width.
/// `layers[i]` connects layer `i` to layer `i + 1`. The architecture is fixed
/// for the lifetime of the value.
///
/// Only whole operations are public (`infer`, `loss`, `train`); each one runs
/// the forward pass itself, so there is no call order for callers to get wrong.
#[derive(Debug, Clone)]
pub struct Network {
    layer_sizes: Vec<usize>,
    input: Matrix,
    layers: Vec<Layer>,
}

impl Network {
    /// Builds a network with weights and biases drawn uniformly from [-1, 1].
    pub fn new<R: Rng + ?Sized>(
        layer_sizes: &[usize],
        activator: ActivationFunction,
        rng: &mut R,
    ) -> Result<Network> {
        validate_layer_sizes(layer_sizes)?;
        let layers = layer_sizes
            .windows(2)
            .map(|pair| Layer::new(pair[0], pair[1], activator, rng))
            .collect();
        let network = Network::assemble(layer_sizes, layers);
        debug!(
            layer_sizes = ?network.layer_sizes,
            parameters = network.parameter_count(),
            "built network"
        );
        Ok(network)
    }

    /// Same as [`Network::new`] with a `StdRng` seeded from `seed`.
    pub fn with_seed(layer_sizes: &[usize], activator: ActivationFunction, seed: u64) -> Result<Network> {
        let mut rng = StdRng::seed_from_u64(seed);
        Network::new(layer_sizes, activator, &mut rng)
    }

    /// All parameters zero; used as the target of a load.
    pub(crate) fn zeroed(layer_sizes: &[usize], activator: ActivationFunction) -> Result<Network> {
        validate_layer_sizes(layer_sizes)?;
        let layers = layer_sizes
            .windows(2)
            .map(|pair| Layer::zeros(pair[0], pair[1], activator))
            .collect();
        Ok(Network::assemble(layer_sizes, layers))
    }

    fn assemble(layer_sizes: &[usize], layers: Vec<Layer>) -> Network {
        Network {
            layer_sizes: layer_sizes.to_vec(),
            input: Matrix::zeros(layer_sizes[0], 1),
            layers,
        }
    }

    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    pub fn input_size(&self) -> usize {
        self.layer_sizes[0]
    }

    pub fn output_size(&self) -> usize {
        self.layer_sizes[self.layer_sizes.len() - 1]
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn activator(&self) -> ActivationFunction {
        self.layers[0].activator
    }

    /// Total number of weights and biases.
    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights().len() + l.biases().len())
            .sum()
    }

    /// Output activations left by the most recent `infer`, `loss` or `train`.
    pub fn output(&self) -> &[f64] {
        self.output_layer().activations().as_slice()
    }

    fn output_layer(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }

    /// Runs a forward pass and returns the output activations.
    pub fn infer(&mut self, input: &[f64]) -> Result<&[f64]> {
        self.set_input(input)?;
        self.forward();
        Ok(self.output())
    }

    /// Index of the most activated output neuron for `input`.
    pub fn classify(&mut self, input: &[f64]) -> Result<usize> {
        Ok(argmax(self.infer(input)?))
    }

    /// Mean squared error of the network's output for `input` against `target`.
    pub fn loss(&mut self, input: &[f64], target: &[f64]) -> Result<f64> {
        self.check_target(target)?;
        let output = self.infer(input)?;
        Ok(MseLoss::loss(output, target))
    }

    /// One SGD step on a single example. Returns the loss measured before the update.
    pub fn train(&mut self, input: &[f64], target: &[f64], learning_rate: f64) -> Result<f64> {
        self.train_with(input, target, &Sgd::new(learning_rate))
    }

    pub fn train_with(&mut self, input: &[f64], target: &[f64], optimizer: &Sgd) -> Result<f64> {
        self.check_target(target)?;
        self.set_input(input)?;
        self.forward();
        let loss = MseLoss::loss(self.output(), target);
        self.backprop(target, optimizer);
        Ok(loss)
    }

    fn set_input(&mut self, input: &[f64]) -> Result<()> {
        if input.len() != self.input_size() {
            return Err(NnError::shape("input", self.input_size(), input.len()));
        }
        self.input.copy_from_slice(input);
        Ok(())
    }

    fn check_target(&self, target: &[f64]) -> Result<()> {
        if target.len() != self.output_size() {
            return Err(NnError::shape("target", self.output_size(), target.len()));
        }
        Ok(())
    }

    fn forward(&mut self) {
        for i in 0..self.layers.len() {
            let (done, rest) = self.layers.split_at_mut(i);
            let input = done.last().map_or(&self.input, |l| l.activations());
            rest[0].feed_from(input);
        }
    }

    /// Computes every delta and gradient from the current forward pass, then
    /// updates. Deltas are all computed before any weight changes.
    fn backprop(&mut self, target: &[f64], optimizer: &Sgd) {
        for layer in &mut self.layers {
            layer.clear_gradients();
        }

        let last = self.layers.len() - 1;
        let error = MseLoss::derivative(self.output(), target);
        self.layers[last].set_output_delta(&error);

        for i in (0..last).rev() {
            let (head, tail) = self.layers.split_at_mut(i + 1);
            head[i].set_hidden_delta(&tail[0]);
        }

        for i in 0..self.layers.len() {
            let (done, rest) = self.layers.split_at_mut(i);
            let input = done.last().map_or(&self.input, |l| l.activations());
            rest[0].compute_gradients(input);
        }

        for layer in &mut self.layers {
            optimizer.step(layer);
        }
    }
}

fn validate_layer_sizes(layer_sizes: &[usize]) -> Result<()> {
    if layer_sizes.len() < 2 {
        return Err(NnError::InvalidConfig(format!(
            "a network needs at least an input and an output layer, got {} layer(s)",
            layer_sizes.len()
        )));
    }
    if let Some(pos) = layer_sizes.iter().position(|&s| s == 0) {
        return Err(NnError::InvalidConfig(format!("layer {} has zero neurons", pos)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(sizes: &[usize], seed: u64) -> Network {
        Network::with_seed(sizes, ActivationFunction::Sigmoid, seed).unwrap()
    }

    #[test]
    fn construction_allocates_consistent_shapes() {
        let network = net(&[5, 4, 3, 2], 1);
        assert_eq!(network.layers().len(), 3);
        for (layer, pair) in network.layers().iter().zip(network.layer_sizes().windows(2)) {
            assert_eq!(layer.weights().shape(), (pair[1], pair[0]));
            assert_eq!(layer.biases().shape(), (pair[1], 1));
            assert_eq!(layer.activations().shape(), (pair[1], 1));
        }
        assert_eq!(network.parameter_count(), 5 * 4 + 4 + 4 * 3 + 3 + 3 * 2 + 2);
    }

    #[test]
    fn rejects_degenerate_architectures() {
        assert!(matches!(
            Network::with_seed(&[3], ActivationFunction::Sigmoid, 0),
            Err(NnError::InvalidConfig(_))
        ));
        assert!(matches!(
            Network::with_seed(&[3, 0, 2], ActivationFunction::Sigmoid, 0),
            Err(NnError::InvalidConfig(_))
        ));
    }

    #[test]
    fn same_seed_same_parameters() {
        let a = net(&[3, 4, 2], 99);
        let b = net(&[3, 4, 2], 99);
        for (la, lb) in a.layers().iter().zip(b.layers()) {
            assert_eq!(la.weights(), lb.weights());
            assert_eq!(la.biases(), lb.biases());
        }
    }

    #[test]
    fn infer_rejects_wrong_input_width() {
        let mut network = net(&[3, 2], 0);
        let err = network.infer(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, NnError::ShapeMismatch { what: "input", expected: 3, actual: 2 }));
    }

    #[test]
    fn train_rejects_wrong_target_width() {
        let mut network = net(&[3, 2], 0);
        let err = network.train(&[0.0; 3], &[1.0], 0.1).unwrap_err();
        assert!(matches!(err, NnError::ShapeMismatch { what: "target", expected: 2, actual: 1 }));
    }

    #[test]
    fn single_layer_forward_matches_hand_computation() {
        let mut network = Network::zeroed(&[2, 1], ActivationFunction::Sigmoid).unwrap();
        {
            let (w, b) = network.layers_mut()[0].parameters_mut();
            w.copy_from_slice(&[1.0, -1.0]);
            b.copy_from_slice(&[0.5]);
        }
        let out = network.infer(&[2.0, 1.0]).unwrap()[0];
        assert_eq!(out, crate::activation::sigmoid(1.5));
    }

    #[test]
    fn backprop_matches_numerical_gradient() {
        // Compare the weight update against a central finite difference of the
        // loss (scaled by n / 2 to match the folded MSE factor).
        let sizes = [3, 4, 2];
        let input = [0.2, -0.4, 0.9];
        let target = [1.0, 0.0];
        let n = target.len() as f64;
        let base = net(&sizes, 5);

        let lr = 1.0;
        let mut stepped = base.clone();
        stepped.train(&input, &target, lr).unwrap();

        let h = 1e-6;
        for layer_idx in 0..base.layers().len() {
            let (rows, cols) = base.layers()[layer_idx].weights().shape();
            for r in 0..rows {
                for c in 0..cols {
                    let mut plus = base.clone();
                    let mut minus = base.clone();
                    plus.layers_mut()[layer_idx].parameters_mut().0[(r, c)] += h;
                    minus.layers_mut()[layer_idx].parameters_mut().0[(r, c)] -= h;
                    let numeric = (plus.loss(&input, &target).unwrap()
                        - minus.loss(&input, &target).unwrap())
                        / (2.0 * h)
                        * n
                        / 2.0;
                    let analytic = base.layers()[layer_idx].weights()[(r, c)]
                        - stepped.layers()[layer_idx].weights()[(r, c)];
                    assert!(
                        (numeric - analytic).abs() < 1e-6,
                        "layer {layer_idx} ({r},{c}): numeric {numeric} vs analytic {analytic}"
                    );
                }
            }
        }
    }

    #[test]
    fn train_reports_loss_before_update() {
        let mut network = net(&[2, 3, 1], 4);
        let before = network.clone().loss(&[0.5, 0.5], &[1.0]).unwrap();
        let reported = network.train(&[0.5, 0.5], &[1.0], 0.5).unwrap();
        assert_eq!(before, reported);
        let after = network.loss(&[0.5, 0.5], &[1.0]).unwrap();
        assert!(after < before);
    }
}
