pub mod corpus;
pub mod midi;
