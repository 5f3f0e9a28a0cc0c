use serde::{Deserialize, Serialize};

use crate::math::matrix::Matrix;

/// Logistic function `1 / (1 + e^-x)`.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Nonlinearity applied after each layer's affine transform.
///
/// Each variant pairs a forward function with its derivative so the backward
/// pass never needs to know which activation it is differentiating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    #[default]
    Sigmoid,
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => sigmoid(x),
        }
    }

    /// Derivative with respect to the pre-activation `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        self.derivative_from_output(self.function(x))
    }

    /// Derivative expressed through the cached output `y = f(x)`.
    ///
    /// For the logistic function `σ'(x) = σ(x)(1 - σ(x))`, so the backward pass
    /// can work from the stored activations alone.
    pub fn derivative_from_output(&self, y: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => y * (1.0 - y),
        }
    }

    /// Applies the activation to every element of `m` in place.
    pub fn apply(&self, m: &mut Matrix) {
        match self {
            ActivationFunction::Sigmoid => m.sigmoid(),
        }
    }

    /// `delta := delta ⊙ f'(output)`, using the cached outputs.
    pub fn scale_by_derivative(&self, delta: &mut Matrix, output: &Matrix) {
        assert_eq!(
            delta.shape(),
            output.shape(),
            "activation derivative: delta and output shapes differ"
        );
        for (d, &y) in delta.as_mut_slice().iter_mut().zip(output.as_slice()) {
            *d *= self.derivative_from_output(y);
        }
    }
}
