use serde::{Deserialize, Serialize};

use crate::map::position::MapPosition;

/// Identifier reserved for the user's in-progress song.
pub const USER_SONG_ID: &str = "user-melody";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub pitch: u8,
    pub start_time: f64, // seconds
    pub duration: f64,   // seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>, // 0-1
}

impl Note {
    pub fn new(pitch: u8, start_time: f64, duration: f64) -> Self {
        Note {
            pitch,
            start_time,
            duration,
            velocity: None,
        }
    }

    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = Some(velocity.clamp(0.0, 1.0));
        self
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Structural sanity: MIDI range, finite non-negative onset, positive length.
    pub fn is_valid(&self) -> bool {
        self.pitch <= 127
            && self.start_time.is_finite()
            && self.start_time >= 0.0
            && self.duration.is_finite()
            && self.duration > 0.0
            && self.velocity.map_or(true, |v| (0.0..=1.0).contains(&v))
    }
}

/// Notes in no particular order. Consumers sort before use.
pub type NoteSet = Vec<Note>;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ClassifiedPerformance {
    pub melody: NoteSet,
    pub harmony: NoteSet,
}

/// Scores returned by the analysis oracle. Only the three numeric
/// richness/complexity fields feed the map position.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub rhythmic_character: String,
    #[serde(default)]
    pub interval_character: String,
    #[serde(default)]
    pub harmonic_complexity: String,
    #[serde(default)]
    pub chord_changes: u32,
    #[serde(default)]
    pub melodic_repetitions: u32,
    pub melodic_complexity: f64, // 0-100
    pub harmonic_richness: f64,  // 0-100
    pub melodic_richness: f64,   // 0-100
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    pub name: String,
    pub melody: NoteSet,
    #[serde(default)]
    pub harmony: NoteSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_position: Option<MapPosition>,
}

impl Song {
    pub fn new(id: &str, name: &str, performance: ClassifiedPerformance) -> Self {
        Song {
            id: id.to_string(),
            name: name.to_string(),
            melody: performance.melody,
            harmony: performance.harmony,
            analysis: None,
            map_position: None,
        }
    }
}
