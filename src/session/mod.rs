pub mod oracle;
pub mod playback;
pub mod requests;
pub mod store;
pub mod workspace;

pub use oracle::AnalysisOracle;
pub use store::{CorpusStore, MemoryStore};
pub use workspace::{Session, SessionSettings};
