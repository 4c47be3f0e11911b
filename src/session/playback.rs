use std::collections::BTreeSet;

/// Handle for one playback run. Updates carrying an older token are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackToken(pub u64);

/// Which pitches are lit up by the audio engine right now.
///
/// The engine schedules its own note-on/off callbacks; a stop or a new start
/// bumps the generation so callbacks scheduled for an earlier run cannot
/// leave pitches highlighted.
#[derive(Clone, Debug, Default)]
pub struct PlaybackState {
    generation: u64,
    playing: bool,
    active: BTreeSet<u8>,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) -> PlaybackToken {
        self.stop();
        self.playing = true;
        PlaybackToken(self.generation)
    }

    pub fn stop(&mut self) {
        self.generation += 1;
        self.playing = false;
        self.active.clear();
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    fn is_live(&self, token: PlaybackToken) -> bool {
        self.playing && token.0 == self.generation
    }

    pub fn note_on(&mut self, token: PlaybackToken, pitch: u8) -> bool {
        if !self.is_live(token) {
            return false;
        }
        self.active.insert(pitch);
        true
    }

    pub fn note_off(&mut self, token: PlaybackToken, pitch: u8) -> bool {
        if !self.is_live(token) {
            return false;
        }
        self.active.remove(&pitch)
    }

    /// Playback reached its end on its own.
    pub fn finish(&mut self, token: PlaybackToken) {
        if self.is_live(token) {
            self.stop();
        }
    }

    pub fn active_pitches(&self) -> Vec<u8> {
        self.active.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notes_light_up_and_clear() {
        let mut pb = PlaybackState::new();
        let token = pb.start();
        assert!(pb.note_on(token, 60));
        assert!(pb.note_on(token, 64));
        assert!(pb.note_off(token, 60));
        assert_eq!(pb.active_pitches(), vec![64]);
    }

    #[test]
    fn test_stale_note_off_after_restart_is_ignored() {
        let mut pb = PlaybackState::new();
        let first = pb.start();
        pb.note_on(first, 72);
        let second = pb.start();
        assert!(pb.active_pitches().is_empty());
        assert!(!pb.note_on(first, 72));
        assert!(pb.note_on(second, 60));
        assert!(!pb.note_off(first, 60));
        assert_eq!(pb.active_pitches(), vec![60]);
    }

    #[test]
    fn test_stop_clears_everything() {
        let mut pb = PlaybackState::new();
        let token = pb.start();
        pb.note_on(token, 55);
        pb.stop();
        assert!(!pb.is_playing());
        assert!(pb.active_pitches().is_empty());
        assert!(!pb.note_on(token, 55));
    }

    #[test]
    fn test_finish_with_stale_token_keeps_current_run() {
        let mut pb = PlaybackState::new();
        let old = pb.start();
        let current = pb.start();
        pb.finish(old);
        assert!(pb.is_playing());
        pb.finish(current);
        assert!(!pb.is_playing());
    }
}
