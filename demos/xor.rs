use dense_nn::{train_network, ActivationFunction, Dataset, Network, Sgd};

fn main() -> dense_nn::Result<()> {
    let mut network = Network::with_seed(&[2, 3, 1], ActivationFunction::Sigmoid, 7)?;

    let dataset = Dataset::new(
        vec![
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 1.0],
            vec![0.0, 0.0],
        ],
        vec![vec![1.0], vec![0.0], vec![1.0], vec![0.0]],
    )?;

    let optimizer = Sgd::new(0.5);
    let epochs = 10000;

    for epoch in 0..epochs {
        let loss = train_network(&mut network, &dataset, &optimizer)?;
        if epoch % 1000 == 0 {
            println!("Epoch {epoch}: loss = {loss:.6}");
        }
    }

    for (input, _) in dataset.iter() {
        println!("Input: {:?} -> Output: {:.4}", input, network.infer(input)?[0]);
    }
    Ok(())
}
