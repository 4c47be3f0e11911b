pub mod classifier;
pub mod quantizer;
pub mod types;
