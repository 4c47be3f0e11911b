use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::notes::types::Note;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum QuantizeGrid {
    /// Four subdivisions per beat.
    #[default]
    Sixteenth,
    /// Three subdivisions per beat.
    EighthTriplet,
}

impl QuantizeGrid {
    pub fn subdivisions(self) -> f64 {
        match self {
            QuantizeGrid::Sixteenth => 4.0,
            QuantizeGrid::EighthTriplet => 3.0,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "16th" | "sixteenth" => Some(QuantizeGrid::Sixteenth),
            "8th-triplet" | "eighth-triplet" | "eighthtriplet" | "triplet" => {
                Some(QuantizeGrid::EighthTriplet)
            }
            _ => None,
        }
    }

    /// Grid step in seconds at the given tempo.
    pub fn unit_secs(self, bpm: f64) -> Result<f64, MapError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(MapError::InvalidTempo(bpm));
        }
        Ok(60.0 / bpm / self.subdivisions())
    }
}

/// Snap onsets and durations to the grid. Durations never drop below one
/// grid unit. Order, pitch and velocity are untouched.
pub fn quantize(notes: &[Note], bpm: f64, grid: QuantizeGrid) -> Result<Vec<Note>, MapError> {
    let unit = grid.unit_secs(bpm)?;
    log::debug!("quantizing {} notes to {:?} at {} bpm", notes.len(), grid, bpm);

    Ok(notes
        .iter()
        .map(|note| Note {
            start_time: (note.start_time / unit).round() * unit,
            duration: ((note.duration / unit).round() * unit).max(unit),
            ..note.clone()
        })
        .collect())
}
