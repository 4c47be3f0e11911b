use serde::Serialize;
use wasm_bindgen::prelude::*;

pub mod error;
pub mod io;
pub mod map;
pub mod notes;
pub mod session;

pub use error::MapError;

use map::gesture::MapView;
use map::position::MapPosition;
use map::viewport::PlotRect;
use notes::quantizer::QuantizeGrid;
use notes::types::{AnalysisResult, Note, Song};
use session::oracle::{decode_reply, PlacementResponse, VariationResponse};
use session::playback::PlaybackToken;
use session::requests::RequestId;
use session::{MemoryStore, Session, SessionSettings};

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(js_err)
}

fn pair(a: f64, b: f64) -> js_sys::Float64Array {
    let arr = js_sys::Float64Array::new_with_length(2);
    arr.set_index(0, a);
    arr.set_index(1, b);
    arr
}

/// Split notes into `{melody, harmony}`.
#[wasm_bindgen]
pub fn classify_notes(notes_js: JsValue) -> Result<JsValue, JsValue> {
    let notes: Vec<Note> = serde_wasm_bindgen::from_value(notes_js).map_err(js_err)?;
    to_js(&notes::classifier::classify(&notes))
}

/// Snap notes to a "16th" or "8th-triplet" grid at `bpm`.
#[wasm_bindgen]
pub fn quantize_notes(notes_js: JsValue, bpm: f64, grid: &str) -> Result<JsValue, JsValue> {
    let notes: Vec<Note> = serde_wasm_bindgen::from_value(notes_js).map_err(js_err)?;
    let grid = QuantizeGrid::from_name(grid)
        .ok_or_else(|| JsValue::from_str(&format!("Unknown grid: {}", grid)))?;
    let quantized = notes::quantizer::quantize(&notes, bpm, grid).map_err(js_err)?;
    to_js(&quantized)
}

/// Map position for an analysis record.
#[wasm_bindgen]
pub fn map_position(analysis_js: JsValue) -> Result<JsValue, JsValue> {
    let analysis: AnalysisResult = serde_wasm_bindgen::from_value(analysis_js).map_err(js_err)?;
    to_js(&map::position::derive_position(&analysis))
}

/// Decode a Standard MIDI File into a flat note list.
#[wasm_bindgen]
pub fn import_midi(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let notes = io::midi::import_midi(bytes).map_err(js_err)?;
    to_js(&notes)
}

/// Encode a song's melody and harmony as a two-track MIDI file.
#[wasm_bindgen]
pub fn export_midi(song_js: JsValue) -> Result<Vec<u8>, JsValue> {
    let song: Song = serde_wasm_bindgen::from_value(song_js).map_err(js_err)?;
    io::midi::export_midi(&song).map_err(js_err)
}

/// Parse an uploaded corpus document (`Song[]` or `{name, songs}`).
#[wasm_bindgen]
pub fn parse_corpus(json: &str, fallback_name: &str) -> Result<JsValue, JsValue> {
    let corpus = io::corpus::parse_corpus(json, fallback_name).map_err(js_err)?;
    to_js(&corpus)
}

/// Pan/zoom state and pointer handling for the map plot.
#[wasm_bindgen]
pub struct MapController {
    view: MapView,
}

#[wasm_bindgen]
impl MapController {
    #[wasm_bindgen(constructor)]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> MapController {
        MapController {
            view: MapView::new(PlotRect::new(x, y, width, height)),
        }
    }

    pub fn set_plot(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.view.set_plot(PlotRect::new(x, y, width, height));
    }

    /// Pass the user's point as `own_x/own_y` when the press landed on it.
    /// When that press returns true, call `Workspace::begin_drag` as well.
    pub fn pointer_down(&mut self, px: f64, py: f64, own_x: Option<f64>, own_y: Option<f64>) -> bool {
        let own = match (own_x, own_y) {
            (Some(x), Some(y)) => Some(MapPosition::new(x, y)),
            _ => None,
        };
        self.view.pointer_down(px, py, own)
    }

    /// Returns `[x, y]` of the dragged point, or undefined when not dragging.
    pub fn pointer_move(&mut self, px: f64, py: f64) -> Option<js_sys::Float64Array> {
        self.view.pointer_move(px, py).map(|p| pair(p.x, p.y))
    }

    pub fn pointer_up(&mut self) -> Result<JsValue, JsValue> {
        to_js(&self.view.pointer_up())
    }

    pub fn cancel(&mut self) {
        self.view.cancel();
    }

    pub fn hit_test(&self, px: f64, py: f64, x: f64, y: f64, radius_px: f64) -> bool {
        self.view.hit_test(px, py, MapPosition::new(x, y), radius_px)
    }

    pub fn zoom(&mut self, factor: f64) {
        self.view.viewport.zoom(factor);
    }

    pub fn reset(&mut self) {
        self.view.viewport.reset();
    }

    /// Whether a map point is inside the visible window.
    pub fn is_visible(&self, x: f64, y: f64) -> bool {
        self.view.viewport.contains(MapPosition::new(x, y))
    }

    pub fn viewport(&self) -> Result<JsValue, JsValue> {
        to_js(&self.view.viewport)
    }

    pub fn screen_to_data(&self, px: f64, py: f64) -> js_sys::Float64Array {
        let p = self.view.viewport.screen_to_data(px, py, &self.view.plot);
        pair(p.x, p.y)
    }

    pub fn data_to_screen(&self, x: f64, y: f64) -> js_sys::Float64Array {
        let (sx, sy) = self
            .view
            .viewport
            .data_to_screen(MapPosition::new(x, y), &self.view.plot);
        pair(sx, sy)
    }
}

#[derive(Serialize)]
struct Pending<T> {
    id: RequestId,
    request: T,
}

/// Browser-side session. Oracle replies are passed back as raw text and
/// decoded here; a `false` result means the reply arrived too late.
#[wasm_bindgen]
pub struct Workspace {
    session: Session<MemoryStore>,
}

#[wasm_bindgen]
impl Workspace {
    #[wasm_bindgen(constructor)]
    pub fn new(settings_js: JsValue) -> Result<Workspace, JsValue> {
        let settings: SessionSettings = if settings_js.is_null() || settings_js.is_undefined() {
            SessionSettings::default()
        } else {
            serde_wasm_bindgen::from_value(settings_js).map_err(js_err)?
        };
        Ok(Workspace {
            session: Session::initialize(MemoryStore::new(), settings),
        })
    }

    pub fn dispose(&mut self) {
        self.session.dispose();
    }

    pub fn settings(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.settings())
    }

    /// Applies to the next recording and oracle request.
    pub fn set_settings(&mut self, settings_js: JsValue) -> Result<(), JsValue> {
        let settings: SessionSettings = serde_wasm_bindgen::from_value(settings_js).map_err(js_err)?;
        self.session.set_settings(settings);
        Ok(())
    }

    pub fn record(&mut self, notes_js: JsValue) -> Result<JsValue, JsValue> {
        let notes: Vec<Note> = serde_wasm_bindgen::from_value(notes_js).map_err(js_err)?;
        let song = self.session.record(&notes).map_err(js_err)?;
        to_js(song)
    }

    pub fn import_midi(&mut self, bytes: &[u8]) -> Result<JsValue, JsValue> {
        let song = self.session.import_midi(bytes).map_err(js_err)?;
        to_js(song)
    }

    pub fn export_midi(&self) -> Result<Vec<u8>, JsValue> {
        self.session.export_user_midi().map_err(js_err)
    }

    pub fn user_song(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.user_song())
    }

    pub fn history(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.history())
    }

    pub fn plotted_songs(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.plotted_songs())
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
    }

    pub fn begin_analysis(&mut self) -> Result<JsValue, JsValue> {
        let pending = self
            .session
            .begin_analysis()
            .map(|(id, request)| Pending { id, request });
        to_js(&pending)
    }

    pub fn complete_analysis(&mut self, id: f64, reply: &str) -> Result<bool, JsValue> {
        let reply = decode_reply::<AnalysisResult>(reply);
        self.session
            .complete_analysis(RequestId(id as u64), reply)
            .map_err(js_err)
    }

    pub fn fail_analysis(&mut self, id: f64, message: &str) -> Result<bool, JsValue> {
        self.session
            .complete_analysis(RequestId(id as u64), Err(MapError::OracleFailure(message.to_string())))
            .map_err(js_err)
    }

    pub fn begin_drag(&mut self) {
        self.session.begin_drag();
    }

    pub fn begin_variation(&mut self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        let pending = self
            .session
            .begin_variation(MapPosition::new(x, y))
            .map(|(id, request)| Pending { id, request });
        to_js(&pending)
    }

    pub fn complete_variation(&mut self, id: f64, reply: &str) -> Result<bool, JsValue> {
        let reply = decode_reply::<VariationResponse>(reply);
        self.session
            .complete_variation(RequestId(id as u64), reply)
            .map_err(js_err)
    }

    pub fn fail_variation(&mut self, id: f64, message: &str) -> Result<bool, JsValue> {
        self.session
            .complete_variation(RequestId(id as u64), Err(MapError::OracleFailure(message.to_string())))
            .map_err(js_err)
    }

    pub fn load_corpus_json(&mut self, json: &str, fallback_name: &str) -> Result<(), JsValue> {
        let corpus = io::corpus::parse_corpus(json, fallback_name).map_err(js_err)?;
        self.session.load_corpus(corpus).map_err(js_err)
    }

    pub fn open_corpus(&mut self, name: &str) -> Result<bool, JsValue> {
        self.session.open_corpus(name).map_err(js_err)
    }

    pub fn export_corpus_json(&self) -> Result<String, JsValue> {
        self.session.export_corpus().map_err(js_err)
    }

    pub fn corpus_names(&self) -> Result<JsValue, JsValue> {
        let names = self.session.corpus_names().map_err(js_err)?;
        to_js(&names)
    }

    pub fn begin_placement(&mut self) -> Result<JsValue, JsValue> {
        let pending = self
            .session
            .begin_placement()
            .map(|(id, request)| Pending { id, request });
        to_js(&pending)
    }

    pub fn complete_placement(&mut self, id: f64, reply: &str) -> Result<bool, JsValue> {
        let reply = decode_reply::<PlacementResponse>(reply);
        self.session
            .complete_placement(RequestId(id as u64), reply)
            .map_err(js_err)
    }

    pub fn fail_placement(&mut self, id: f64, message: &str) -> Result<bool, JsValue> {
        self.session
            .complete_placement(RequestId(id as u64), Err(MapError::OracleFailure(message.to_string())))
            .map_err(js_err)
    }

    /// Starts a playback run and returns its token.
    pub fn start_playback(&mut self) -> f64 {
        self.session.playback().start().0 as f64
    }

    pub fn stop_playback(&mut self) {
        self.session.playback().stop();
    }

    pub fn note_on(&mut self, token: f64, pitch: u8) -> bool {
        self.session.playback().note_on(PlaybackToken(token as u64), pitch)
    }

    pub fn note_off(&mut self, token: f64, pitch: u8) -> bool {
        self.session.playback().note_off(PlaybackToken(token as u64), pitch)
    }

    pub fn finish_playback(&mut self, token: f64) {
        self.session.playback().finish(PlaybackToken(token as u64));
    }

    pub fn active_pitches(&mut self) -> Vec<u8> {
        self.session.playback().active_pitches()
    }
}
