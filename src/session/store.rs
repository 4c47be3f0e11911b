use std::collections::BTreeMap;

use crate::error::MapError;
use crate::io::corpus::Corpus;

/// Key-value persistence of corpora, keyed by corpus name.
pub trait CorpusStore {
    fn put(&mut self, corpus: &Corpus) -> Result<(), MapError>;

    fn get(&self, name: &str) -> Result<Option<Corpus>, MapError>;

    fn list_names(&self) -> Result<Vec<String>, MapError>;
}

/// Store kept in memory for the lifetime of the session. Entries are held
/// as serialized JSON so a read always hands back an independent copy.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CorpusStore for MemoryStore {
    fn put(&mut self, corpus: &Corpus) -> Result<(), MapError> {
        let json =
            serde_json::to_string(corpus).map_err(|e| MapError::StoreFailure(e.to_string()))?;
        self.entries.insert(corpus.name.clone(), json);
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<Corpus>, MapError> {
        self.entries
            .get(name)
            .map(|json| serde_json::from_str(json).map_err(|e| MapError::StoreFailure(e.to_string())))
            .transpose()
    }

    fn list_names(&self) -> Result<Vec<String>, MapError> {
        Ok(self.entries.keys().cloned().collect())
    }
}
