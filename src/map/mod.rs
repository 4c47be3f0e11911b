pub mod gesture;
pub mod position;
pub mod viewport;
