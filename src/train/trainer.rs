use crate::{data::dataset::Dataset, error::Result, network::network::Network, optim::sgd::Sgd};

/// One in-order pass over `dataset`, one SGD step per sample.
///
/// Returns the mean loss measured before each sample's update.
pub fn train_network(network: &mut Network, dataset: &Dataset, optimizer: &Sgd) -> Result<f64> {
    train_in_order(network, dataset, 0..dataset.len(), optimizer)
}

/// Trains on the samples at `order`, in that order.
pub(crate) fn train_in_order<I>(
    network: &mut Network,
    dataset: &Dataset,
    order: I,
    optimizer: &Sgd,
) -> Result<f64>
where
    I: IntoIterator<Item = usize>,
{
    dataset.check_fits(network)?;
    let mut total_loss = 0.0;
    let mut seen = 0usize;

    for idx in order {
        let (input, target) = (&dataset.inputs()[idx], &dataset.targets()[idx]);
        total_loss += network.train_with(input, target, optimizer)?;
        seen += 1;
    }

    Ok(if seen == 0 { 0.0 } else { total_loss / seen as f64 })
}
