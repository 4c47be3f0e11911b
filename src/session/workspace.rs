use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::io::corpus::{corpus_to_json, validate_corpus, Corpus};
use crate::io::midi;
use crate::map::position::{derive_position, MapPosition};
use crate::notes::classifier::classify;
use crate::notes::quantizer::{quantize, QuantizeGrid};
use crate::notes::types::{AnalysisResult, ClassifiedPerformance, Note, Song, USER_SONG_ID};
use crate::session::oracle::{
    validate_variation, AnalysisOracle, AnalysisRequest, PlacementRequest, PlacementResponse,
    PlacementSong, VariationRequest, VariationResponse,
};
use crate::session::playback::PlaybackState;
use crate::session::requests::{RequestId, RequestSlot};
use crate::session::store::CorpusStore;

const USER_SONG_NAME: &str = "My melody";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSettings {
    pub tempo: f64,
    pub time_signature: String,
    pub quantize: bool,
    pub grid: QuantizeGrid,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            tempo: 120.0,
            time_signature: "4/4".to_string(),
            quantize: true,
            grid: QuantizeGrid::Sixteenth,
        }
    }
}

/// Everything one user session owns: the corpus store, the user's song and
/// its variation history, the loaded corpus, and the request slots that keep
/// late oracle replies from clobbering newer state.
///
/// Oracle calls are split in two. `begin_*` hands out a typed request tagged
/// with a `RequestId` (or nothing while the slot is busy); `complete_*`
/// applies the reply only if that id is still current. The `*_with` helpers
/// run both halves against a synchronous `AnalysisOracle`.
pub struct Session<S: CorpusStore> {
    store: S,
    settings: SessionSettings,
    user_song: Option<Song>,
    history: Vec<Song>,
    corpus: Option<Corpus>,
    analysis: RequestSlot,
    variation: RequestSlot,
    placement: RequestSlot,
    pending_target: Option<MapPosition>,
    playback: PlaybackState,
    variations_accepted: u32,
}

impl<S: CorpusStore> Session<S> {
    pub fn initialize(store: S, settings: SessionSettings) -> Self {
        log::info!("session initialized ({} bpm, {})", settings.tempo, settings.time_signature);
        Session {
            store,
            settings,
            user_song: None,
            history: Vec::new(),
            corpus: None,
            analysis: RequestSlot::new(),
            variation: RequestSlot::new(),
            placement: RequestSlot::new(),
            pending_target: None,
            playback: PlaybackState::new(),
            variations_accepted: 0,
        }
    }

    /// Drop all in-flight work and session state, keeping the store.
    pub fn dispose(&mut self) {
        self.analysis.invalidate();
        self.variation.invalidate();
        self.placement.invalidate();
        self.pending_target = None;
        self.playback.stop();
        self.user_song = None;
        self.history.clear();
        self.corpus = None;
        log::info!("session disposed");
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SessionSettings) {
        self.settings = settings;
    }

    pub fn user_song(&self) -> Option<&Song> {
        self.user_song.as_ref()
    }

    pub fn history(&self) -> &[Song] {
        &self.history
    }

    pub fn corpus(&self) -> Option<&Corpus> {
        self.corpus.as_ref()
    }

    pub fn playback(&mut self) -> &mut PlaybackState {
        &mut self.playback
    }

    pub fn is_busy(&self) -> bool {
        self.analysis.is_busy() || self.variation.is_busy() || self.placement.is_busy()
    }

    /// Every song that currently has a place on the map: corpus, retired
    /// variations, then the user's own song.
    pub fn plotted_songs(&self) -> Vec<&Song> {
        self.corpus
            .iter()
            .flat_map(|c| c.songs.iter())
            .chain(self.history.iter())
            .chain(self.user_song.iter())
            .filter(|s| s.map_position.is_some())
            .collect()
    }

    fn prepare(&self, notes: &[Note]) -> Result<ClassifiedPerformance, MapError> {
        if let Some(bad) = notes.iter().find(|n| !n.is_valid()) {
            return Err(MapError::FormatError(format!(
                "recorded note is invalid (pitch {}, start {}, duration {})",
                bad.pitch, bad.start_time, bad.duration
            )));
        }
        let notes = if self.settings.quantize {
            quantize(notes, self.settings.tempo, self.settings.grid)?
        } else {
            notes.to_vec()
        };
        let performance = classify(&notes);
        if performance.melody.is_empty() {
            return Err(MapError::InputMissing);
        }
        Ok(performance)
    }

    /// Install a new performance as the user's song. Any analysis or
    /// variation still in flight for the old one is abandoned.
    pub fn record(&mut self, notes: &[Note]) -> Result<&Song, MapError> {
        let performance = self.prepare(notes)?;
        self.analysis.invalidate();
        self.variation.invalidate();
        self.pending_target = None;

        log::info!(
            "recorded performance: {} melody, {} harmony notes",
            performance.melody.len(),
            performance.harmony.len()
        );
        Ok(&*self
            .user_song
            .insert(Song::new(USER_SONG_ID, USER_SONG_NAME, performance)))
    }

    pub fn import_midi(&mut self, bytes: &[u8]) -> Result<&Song, MapError> {
        let notes = midi::import_midi(bytes)?;
        self.record(&notes)
    }

    pub fn export_user_midi(&self) -> Result<Vec<u8>, MapError> {
        let song = self.user_song.as_ref().ok_or(MapError::InputMissing)?;
        midi::export_midi(song)
    }

    pub fn begin_analysis(&mut self) -> Option<(RequestId, AnalysisRequest)> {
        let song = self.user_song.as_ref()?;
        let request = AnalysisRequest {
            melody: song.melody.clone(),
            harmony: song.harmony.clone(),
            tempo: self.settings.tempo,
            time_signature: self.settings.time_signature.clone(),
            quantization: self.settings.quantize.then_some(self.settings.grid),
        };
        let id = self.analysis.begin()?;
        Some((id, request))
    }

    /// Apply an analysis reply. `Ok(false)` means the reply was stale and
    /// ignored; an error reply leaves the song untouched.
    pub fn complete_analysis(
        &mut self,
        id: RequestId,
        reply: Result<AnalysisResult, MapError>,
    ) -> Result<bool, MapError> {
        if !self.analysis.finish(id) {
            return Ok(false);
        }
        let analysis = reply?;
        let Some(song) = self.user_song.as_mut() else {
            return Ok(false);
        };
        song.map_position = Some(derive_position(&analysis));
        song.analysis = Some(analysis);
        Ok(true)
    }

    /// A new drag supersedes any variation still being generated.
    pub fn begin_drag(&mut self) {
        self.variation.invalidate();
        self.pending_target = None;
    }

    /// Ask for a variation toward `target`. Ignored while one is already in
    /// flight or before the user's song has been placed.
    pub fn begin_variation(&mut self, target: MapPosition) -> Option<(RequestId, VariationRequest)> {
        let song = self.user_song.as_ref()?;
        let original_position = song.map_position?;
        let target = target.clamped();
        let request = VariationRequest {
            original_melody: song.melody.clone(),
            original_harmony: song.harmony.clone(),
            original_position,
            target_position: target,
        };
        let id = self.variation.begin()?;
        self.pending_target = Some(target);
        Some((id, request))
    }

    /// Accept a variation: the current song is retired into history under a
    /// fresh id and the reply becomes the user's song at the target position.
    pub fn complete_variation(
        &mut self,
        id: RequestId,
        reply: Result<VariationResponse, MapError>,
    ) -> Result<bool, MapError> {
        if !self.variation.finish(id) {
            return Ok(false);
        }
        let target = self.pending_target.take();
        let response = reply?;
        validate_variation(&response)?;

        let Some(target) = target else {
            return Ok(false);
        };
        let Some(previous) = self.user_song.take() else {
            return Ok(false);
        };
        let id = self.next_retired_id();
        let n = self.variations_accepted;
        self.history.push(Song {
            id,
            name: format!("{} (take {})", previous.name, n),
            ..previous
        });

        let mut song = Song::new(
            USER_SONG_ID,
            USER_SONG_NAME,
            ClassifiedPerformance {
                melody: response.melody,
                harmony: response.harmony,
            },
        );
        song.map_position = Some(target);
        self.user_song = Some(song);
        log::info!("accepted variation {} at ({:.1}, {:.1})", n, target.x, target.y);
        Ok(true)
    }

    /// Next `user-melody-<n>` id not already taken by history or the corpus.
    fn next_retired_id(&mut self) -> String {
        loop {
            self.variations_accepted += 1;
            let id = format!("{}-{}", USER_SONG_ID, self.variations_accepted);
            let taken = self
                .corpus
                .iter()
                .flat_map(|c| c.songs.iter())
                .chain(self.history.iter())
                .any(|s| s.id == id);
            if !taken {
                return id;
            }
        }
    }

    /// Install a corpus and persist it. A store failure is reported, but the
    /// corpus stays loaded for this session.
    pub fn load_corpus(&mut self, corpus: Corpus) -> Result<(), MapError> {
        validate_corpus(&corpus)?;
        self.placement.invalidate();
        self.variation.invalidate();
        self.pending_target = None;

        let stored = self.store.put(&corpus);
        log::info!("loaded corpus {} ({} songs)", corpus.name, corpus.songs.len());
        self.corpus = Some(corpus);
        if let Err(e) = &stored {
            log::warn!("corpus kept in memory only: {}", e);
        }
        stored
    }

    /// Load a previously stored corpus by name. `Ok(false)` if unknown.
    pub fn open_corpus(&mut self, name: &str) -> Result<bool, MapError> {
        let Some(corpus) = self.store.get(name)? else {
            return Ok(false);
        };
        self.placement.invalidate();
        self.variation.invalidate();
        self.pending_target = None;
        self.corpus = Some(corpus);
        Ok(true)
    }

    /// The loaded corpus, including any placed positions, as a JSON document.
    pub fn export_corpus(&self) -> Result<String, MapError> {
        let corpus = self.corpus.as_ref().ok_or(MapError::InputMissing)?;
        corpus_to_json(corpus)
    }

    pub fn corpus_names(&self) -> Result<Vec<String>, MapError> {
        self.store.list_names()
    }

    pub fn begin_placement(&mut self) -> Option<(RequestId, PlacementRequest)> {
        let corpus = self.corpus.as_ref()?;
        let songs: Vec<PlacementSong> = corpus.songs.iter().filter_map(PlacementSong::from_song).collect();
        if songs.is_empty() {
            return None;
        }
        let id = self.placement.begin()?;
        Some((id, PlacementRequest { songs }))
    }

    pub fn complete_placement(
        &mut self,
        id: RequestId,
        reply: Result<PlacementResponse, MapError>,
    ) -> Result<bool, MapError> {
        if !self.placement.finish(id) {
            return Ok(false);
        }
        let response = reply?;
        let Some(corpus) = self.corpus.as_mut() else {
            return Ok(false);
        };
        for placed in &response.positions {
            match corpus.songs.iter_mut().find(|s| s.id == placed.id) {
                Some(song) => {
                    song.map_position = Some(MapPosition::new(placed.x, placed.y).clamped())
                }
                None => log::debug!("placement for unknown song {}", placed.id),
            }
        }
        // Positions are part of the corpus; a failed write keeps them in memory.
        if let Err(e) = self.store.put(corpus) {
            log::warn!("placed positions not persisted: {}", e);
        }
        Ok(true)
    }

    pub fn analyze_with(&mut self, oracle: &dyn AnalysisOracle) -> Result<bool, MapError> {
        let Some((id, request)) = self.begin_analysis() else {
            return Ok(false);
        };
        let reply = oracle.analyze(&request);
        self.complete_analysis(id, reply)
    }

    pub fn vary_with(
        &mut self,
        oracle: &dyn AnalysisOracle,
        target: MapPosition,
    ) -> Result<bool, MapError> {
        let Some((id, request)) = self.begin_variation(target) else {
            return Ok(false);
        };
        let reply = oracle.vary(&request);
        self.complete_variation(id, reply)
    }

    pub fn place_with(&mut self, oracle: &dyn AnalysisOracle) -> Result<bool, MapError> {
        let Some((id, request)) = self.begin_placement() else {
            return Ok(false);
        };
        let reply = oracle.place(&request);
        self.complete_placement(id, reply)
    }
}
