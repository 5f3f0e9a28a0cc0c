pub mod network;
pub mod persist;
pub mod spec;

pub use network::Network;
pub use persist::{ModelFile, ModelFormat};
pub use spec::NetworkSpec;
