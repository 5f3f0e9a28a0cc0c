use rand::Rng;

use crate::{activation::activation::ActivationFunction, math::matrix::Matrix};

/// One fully-connected layer boundary.
///
/// Owns everything the forward and backward passes touch for this boundary:
/// parameters, the cached output activations, the error signal and the
/// parameter gradients. Shapes, for `input_size → size`:
///
/// - `weights`, `weights_grad`: `size × input_size`
/// - `biases`, `biases_grad`, `activations`, `delta`: `size × 1`
#[derive(Debug, Clone)]
pub struct Layer {
    weights: Matrix,
    biases: Matrix,
    activations: Matrix,
    delta: Matrix,
    weights_grad: Matrix,
    biases_grad: Matrix,
    pub activator: ActivationFunction,
}

impl Layer {
    /// Weights and biases uniform in [-1, 1]; everything else zeroed.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        size: usize,
        activator: ActivationFunction,
        rng: &mut R,
    ) -> Layer {
        let mut layer = Layer::zeros(input_size, size, activator);
        layer.weights = Matrix::random(size, input_size, rng);
        layer.biases = Matrix::random(size, 1, rng);
        layer
    }

    pub fn zeros(input_size: usize, size: usize, activator: ActivationFunction) -> Layer {
        Layer {
            weights: Matrix::zeros(size, input_size),
            biases: Matrix::zeros(size, 1),
            activations: Matrix::zeros(size, 1),
            delta: Matrix::zeros(size, 1),
            weights_grad: Matrix::zeros(size, input_size),
            biases_grad: Matrix::zeros(size, 1),
            activator,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.cols()
    }

    pub fn size(&self) -> usize {
        self.weights.rows()
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn biases(&self) -> &Matrix {
        &self.biases
    }

    pub fn activations(&self) -> &Matrix {
        &self.activations
    }

    pub fn delta(&self) -> &Matrix {
        &self.delta
    }

    pub fn weights_grad(&self) -> &Matrix {
        &self.weights_grad
    }

    pub fn biases_grad(&self) -> &Matrix {
        &self.biases_grad
    }

    pub(crate) fn parameters_mut(&mut self) -> (&mut Matrix, &mut Matrix) {
        (&mut self.weights, &mut self.biases)
    }

    /// `activations := f(weights · input + biases)`.
    pub fn feed_from(&mut self, input: &Matrix) {
        self.activations.multiply_into(&self.weights, input);
        self.activations += &self.biases;
        self.activator.apply(&mut self.activations);
    }

    /// Output layer: `delta := error ⊙ f'(activations)` where `error` is the
    /// loss gradient with respect to this layer's output.
    pub fn set_output_delta(&mut self, error: &[f64]) {
        self.delta.copy_from_slice(error);
        self.activator.scale_by_derivative(&mut self.delta, &self.activations);
    }

    /// Hidden layer: `delta := (nextᵀ.weights · next.delta) ⊙ f'(activations)`.
    ///
    /// `next` must still hold the weights used in the forward pass.
    pub fn set_hidden_delta(&mut self, next: &Layer) {
        self.delta.transpose_multiply_into(&next.weights, &next.delta);
        self.activator.scale_by_derivative(&mut self.delta, &self.activations);
    }

    /// `weights_grad := delta · inputᵀ`, `biases_grad := delta`.
    pub fn compute_gradients(&mut self, input: &Matrix) {
        self.weights_grad.multiply_into(&self.delta, &input.transpose());
        self.biases_grad.copy_from(&self.delta);
    }

    /// Applies the stored gradients scaled by `lr`. The gradients are left intact.
    pub fn apply_gradients(&mut self, lr: f64) {
        descend(&mut self.weights, &self.weights_grad, lr);
        descend(&mut self.biases, &self.biases_grad, lr);
    }

    pub fn clear_gradients(&mut self) {
        self.delta.fill(0.0);
        self.weights_grad.fill(0.0);
        self.biases_grad.fill(0.0);
    }
}

/// `params -= lr * grad`.
fn descend(params: &mut Matrix, grad: &Matrix, lr: f64) {
    assert_eq!(params.shape(), grad.shape(), "update: parameter and gradient shapes differ");
    for (p, g) in params.as_mut_slice().iter_mut().zip(grad.as_slice()) {
        *p -= lr * g;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::sigmoid;

    fn fixed_layer() -> Layer {
        let mut layer = Layer::zeros(2, 1, ActivationFunction::Sigmoid);
        let (w, b) = layer.parameters_mut();
        w.copy_from_slice(&[0.5, -0.25]);
        b.copy_from_slice(&[0.1]);
        layer
    }

    #[test]
    fn shapes_follow_sizes() {
        let layer = Layer::zeros(4, 3, ActivationFunction::Sigmoid);
        assert_eq!(layer.weights().shape(), (3, 4));
        assert_eq!(layer.biases().shape(), (3, 1));
        assert_eq!(layer.activations().shape(), (3, 1));
        assert_eq!(layer.weights_grad().shape(), (3, 4));
        assert_eq!(layer.biases_grad().shape(), (3, 1));
        assert_eq!((layer.input_size(), layer.size()), (4, 3));
    }

    #[test]
    fn feed_from_applies_affine_then_sigmoid() {
        let mut layer = fixed_layer();
        layer.feed_from(&Matrix::column(&[1.0, 2.0]));
        let z: f64 = 0.5 * 1.0 - 0.25 * 2.0 + 0.1;
        assert_eq!(layer.activations()[(0, 0)], sigmoid(z));
    }

    #[test]
    fn gradients_are_outer_product_of_delta_and_input() {
        let mut layer = fixed_layer();
        let input = Matrix::column(&[1.0, 2.0]);
        layer.feed_from(&input);
        layer.set_output_delta(&[1.0]);

        let a = layer.activations()[(0, 0)];
        let d = a * (1.0 - a);
        assert_eq!(layer.delta()[(0, 0)], d);

        layer.compute_gradients(&input);
        assert_eq!(layer.weights_grad().as_slice(), &[d, 2.0 * d]);
        assert_eq!(layer.biases_grad().as_slice(), &[d]);
    }

    #[test]
    fn apply_gradients_descends() {
        let mut layer = fixed_layer();
        let input = Matrix::column(&[1.0, 2.0]);
        layer.feed_from(&input);
        layer.set_output_delta(&[1.0]);
        layer.compute_gradients(&input);

        let before = layer.weights().clone();
        let grad = layer.weights_grad().clone();
        layer.apply_gradients(0.5);
        for ((w, w0), g) in layer.weights().as_slice().iter().zip(before.as_slice()).zip(grad.as_slice()) {
            assert_eq!(*w, w0 - 0.5 * g);
        }
        assert_eq!(layer.weights_grad(), &grad);
    }

    #[test]
    fn clear_gradients_zeroes_scratch() {
        let mut layer = fixed_layer();
        let input = Matrix::column(&[1.0, 2.0]);
        layer.feed_from(&input);
        layer.set_output_delta(&[1.0]);
        layer.compute_gradients(&input);
        layer.clear_gradients();
        assert!(layer.delta().as_slice().iter().all(|&x| x == 0.0));
        assert!(layer.weights_grad().as_slice().iter().all(|&x| x == 0.0));
        assert!(layer.biases_grad().as_slice().iter().all(|&x| x == 0.0));
    }
}
