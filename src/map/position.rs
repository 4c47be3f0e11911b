use serde::{Deserialize, Serialize};

use crate::notes::types::AnalysisResult;

/// Lower bound of both map axes.
pub const MAP_MIN: f64 = 0.0;
/// Upper bound of both map axes.
pub const MAP_MAX: f64 = 100.0;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct MapPosition {
    pub x: f64,
    pub y: f64,
}

impl MapPosition {
    pub fn new(x: f64, y: f64) -> Self {
        MapPosition { x, y }
    }

    /// Both axes pulled into `[0, 100]`.
    pub fn clamped(self) -> Self {
        MapPosition {
            x: self.x.clamp(MAP_MIN, MAP_MAX),
            y: self.y.clamp(MAP_MIN, MAP_MAX),
        }
    }
}

/// Place an analysed song on the map.
///
/// x weighs melodic complexity 1/3 and melodic richness 2/3 and is clamped.
/// y is harmonic richness as reported; display code clamps it.
pub fn derive_position(analysis: &AnalysisResult) -> MapPosition {
    let x = analysis.melodic_complexity / 3.0 + analysis.melodic_richness * 2.0 / 3.0;
    MapPosition {
        x: x.clamp(MAP_MIN, MAP_MAX),
        y: analysis.harmonic_richness,
    }
}
