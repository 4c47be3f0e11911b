use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::notes::types::Song;

/// A named collection of analysed songs.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Corpus {
    pub name: String,
    pub songs: Vec<Song>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CorpusDocument {
    Named { name: String, songs: Vec<Song> },
    Bare(Vec<Song>),
}

/// Parse an uploaded corpus document: either `{name, songs}` or a bare
/// array of songs, which takes `fallback_name`. Nothing is returned unless
/// every song is well formed.
pub fn parse_corpus(json: &str, fallback_name: &str) -> Result<Corpus, MapError> {
    let doc: CorpusDocument = serde_json::from_str(json)
        .map_err(|e| MapError::FormatError(format!("corpus JSON: {}", e)))?;

    let corpus = match doc {
        CorpusDocument::Named { name, songs } => Corpus { name, songs },
        CorpusDocument::Bare(songs) => Corpus {
            name: fallback_name.to_string(),
            songs,
        },
    };
    validate_corpus(&corpus)?;
    Ok(corpus)
}

pub fn validate_corpus(corpus: &Corpus) -> Result<(), MapError> {
    if corpus.name.trim().is_empty() {
        return Err(MapError::FormatError("corpus has no name".to_string()));
    }

    let mut seen = HashSet::new();
    for song in &corpus.songs {
        if !seen.insert(song.id.as_str()) {
            return Err(MapError::FormatError(format!(
                "duplicate song id: {}",
                song.id
            )));
        }
        if let Some(bad) = song.melody.iter().chain(&song.harmony).find(|n| !n.is_valid()) {
            return Err(MapError::FormatError(format!(
                "song {} has an invalid note at {}s (pitch {})",
                song.id, bad.start_time, bad.pitch
            )));
        }
    }
    Ok(())
}

pub fn corpus_to_json(corpus: &Corpus) -> Result<String, MapError> {
    Ok(serde_json::to_string_pretty(corpus)?)
}
