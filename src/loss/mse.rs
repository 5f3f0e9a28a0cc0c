pub struct MseLoss;

impl MseLoss {
    /// Scalar MSE: mean((expected - predicted)²)
    pub fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        assert_eq!(predicted.len(), expected.len(), "mse: length mismatch");
        let n = predicted.len() as f64;
        predicted.iter().zip(expected.iter())
            .map(|(p, e)| (e - p).powi(2))
            .sum::<f64>() / n
    }

    /// Per-output error fed into the output delta: predicted - expected.
    ///
    /// The constant factor 2/n of the exact gradient is folded into the
    /// learning rate.
    pub fn derivative(predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        assert_eq!(predicted.len(), expected.len(), "mse: length mismatch");
        predicted.iter().zip(expected.iter())
            .map(|(p, e)| p - e)
            .collect()
    }
}
