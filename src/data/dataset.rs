use crate::error::{NnError, Result};
use crate::network::network::Network;

/// Paired training samples: `inputs[i]` is fed to the network and
/// `targets[i]` is the output it should produce.
///
/// All inputs share one width and all targets share another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    inputs: Vec<Vec<f64>>,
    targets: Vec<Vec<f64>>,
}

impl Dataset {
    pub fn new(inputs: Vec<Vec<f64>>, targets: Vec<Vec<f64>>) -> Result<Dataset> {
        if inputs.len() != targets.len() {
            return Err(NnError::InvalidData(format!(
                "{} inputs but {} targets",
                inputs.len(),
                targets.len()
            )));
        }
        check_uniform(&inputs, "input")?;
        check_uniform(&targets, "target")?;
        Ok(Dataset { inputs, targets })
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn input_size(&self) -> Option<usize> {
        self.inputs.first().map(Vec::len)
    }

    pub fn target_size(&self) -> Option<usize> {
        self.targets.first().map(Vec::len)
    }

    pub fn inputs(&self) -> &[Vec<f64>] {
        &self.inputs
    }

    pub fn targets(&self) -> &[Vec<f64>] {
        &self.targets
    }

    pub fn get(&self, index: usize) -> Option<(&[f64], &[f64])> {
        Some((self.inputs.get(index)?.as_slice(), self.targets.get(index)?.as_slice()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[f64], &[f64])> + '_ {
        self.inputs
            .iter()
            .zip(&self.targets)
            .map(|(i, t)| (i.as_slice(), t.as_slice()))
    }

    /// Checks that the samples can be fed to `network`.
    pub fn check_fits(&self, network: &Network) -> Result<()> {
        if let Some(width) = self.input_size() {
            if width != network.input_size() {
                return Err(NnError::shape("dataset input", network.input_size(), width));
            }
        }
        if let Some(width) = self.target_size() {
            if width != network.output_size() {
                return Err(NnError::shape("dataset target", network.output_size(), width));
            }
        }
        Ok(())
    }
}

fn check_uniform(rows: &[Vec<f64>], what: &str) -> Result<()> {
    if let Some(first) = rows.first() {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != first.len()) {
            return Err(NnError::InvalidData(format!(
                "{} {} has {} values, expected {}",
                what,
                i,
                row.len(),
                first.len()
            )));
        }
    }
    Ok(())
}

/// Vector of `n_classes` zeros with a 1 at `label`.
pub fn one_hot(label: usize, n_classes: usize) -> Vec<f64> {
    let mut v = vec![0.0; n_classes];
    if label < n_classes {
        v[label] = 1.0;
    }
    v
}
