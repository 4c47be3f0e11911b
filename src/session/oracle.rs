use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::map::position::MapPosition;
use crate::notes::quantizer::QuantizeGrid;
use crate::notes::types::{AnalysisResult, Note, NoteSet, Song};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub melody: NoteSet,
    pub harmony: NoteSet,
    pub tempo: f64,
    pub time_signature: String,
    /// `None` when the performance was left unquantized.
    pub quantization: Option<QuantizeGrid>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VariationRequest {
    pub original_melody: NoteSet,
    pub original_harmony: NoteSet,
    pub original_position: MapPosition,
    pub target_position: MapPosition,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct VariationResponse {
    pub melody: Vec<Note>,
    #[serde(default)]
    pub harmony: Vec<Note>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlacementSong {
    pub id: String,
    pub key: String,
    pub mode: String,
    pub harmonic_complexity: String,
}

impl PlacementSong {
    /// Only analysed songs can be placed.
    pub fn from_song(song: &Song) -> Option<Self> {
        song.analysis.as_ref().map(|a| PlacementSong {
            id: song.id.clone(),
            key: a.key.clone(),
            mode: a.mode.clone(),
            harmonic_complexity: a.harmonic_complexity.clone(),
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlacementRequest {
    pub songs: Vec<PlacementSong>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlacedSong {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PlacementResponse {
    pub positions: Vec<PlacedSong>,
}

/// The external analysis/generation service.
///
/// Implementations own their transport and any prompt templates; callers
/// only see these three typed operations.
pub trait AnalysisOracle {
    fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, MapError>;

    fn vary(&self, request: &VariationRequest) -> Result<VariationResponse, MapError>;

    fn place(&self, request: &PlacementRequest) -> Result<PlacementResponse, MapError>;
}

/// Decode a raw oracle reply. Generative models often wrap JSON in a
/// Markdown code fence, so one surrounding fence is stripped first.
pub fn decode_reply<T: DeserializeOwned>(raw: &str) -> Result<T, MapError> {
    let body = strip_code_fence(raw);
    serde_json::from_str(body).map_err(|e| MapError::OracleFailure(format!("unparseable reply: {}", e)))
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip an info string such as ```json
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Check a variation reply before it is allowed to replace anything.
pub fn validate_variation(response: &VariationResponse) -> Result<(), MapError> {
    if response.melody.is_empty() {
        return Err(MapError::OracleFailure("variation has no melody".to_string()));
    }
    if let Some(bad) = response.melody.iter().chain(&response.harmony).find(|n| !n.is_valid()) {
        return Err(MapError::OracleFailure(format!(
            "variation contains an invalid note (pitch {}, start {}, duration {})",
            bad.pitch, bad.start_time, bad.duration
        )));
    }
    Ok(())
}
