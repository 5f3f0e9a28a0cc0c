use crate::data::dataset::Dataset;
use crate::error::Result;
use crate::loss::mse::MseLoss;
use crate::network::network::Network;

/// Loss and classification accuracy of a network over a dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    /// Mean MSE over all samples.
    pub loss: f64,
    pub correct: usize,
    pub total: usize,
}

impl EvalReport {
    /// Fraction of samples whose argmax output matches the argmax target.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Runs inference over every sample without touching the parameters.
pub fn evaluate(network: &mut Network, dataset: &Dataset) -> Result<EvalReport> {
    dataset.check_fits(network)?;
    let mut total_loss = 0.0;
    let mut correct = 0;
    for (input, target) in dataset.iter() {
        let output = network.infer(input)?;
        total_loss += MseLoss::loss(output, target);
        if argmax(output) == argmax(target) {
            correct += 1;
        }
    }

    let total = dataset.len();
    Ok(EvalReport {
        loss: if total == 0 { 0.0 } else { total_loss / total as f64 },
        correct,
        total,
    })
}

/// Index of the first maximum element; `0` for an empty slice.
pub fn argmax(v: &[f64]) -> usize {
    let mut best = 0;
    for (i, &x) in v.iter().enumerate() {
        if x > v[best] {
            best = i;
        }
    }
    best
}
