use crate::layers::dense::Layer;

/// Plain stochastic gradient descent: one example at a time, no momentum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }

    /// Applies one update to a layer from the gradients it already holds.
    pub fn step(&self, layer: &mut Layer) {
        layer.apply_gradients(self.learning_rate);
    }
}
