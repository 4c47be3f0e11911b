// Standard MIDI File import and export.
//
// Import flattens every track into one NoteSet timed in seconds, following
// the file's tempo map. Export writes a Format 1 file with a melody track
// and a harmony track at a fixed 120 bpm in 4/4.

use std::collections::HashMap;

use midly::{
    num::{u15, u24, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};

use crate::error::MapError;
use crate::notes::types::{Note, NoteSet, Song};

const EXPORT_TICKS_PER_QUARTER: u16 = 480;
const EXPORT_BPM: f64 = 120.0;
const DEFAULT_TEMPO_MICROS: u32 = 500_000;
const DEFAULT_VELOCITY: u8 = 80;
// Largest delta a variable-length quantity can hold.
const MAX_DELTA_TICKS: u64 = (1 << 28) - 1;

/// Tempo change in microseconds per quarter note at an absolute tick.
#[derive(Clone, Copy, Debug)]
struct TempoChange {
    tick: u64,
    micros_per_quarter: u32,
}

/// Converts absolute ticks to seconds, honouring tempo changes.
struct TickClock {
    timing: Timing,
    tempo_map: Vec<TempoChange>,
}

impl TickClock {
    fn new(timing: Timing, mut tempo_map: Vec<TempoChange>) -> Self {
        tempo_map.sort_by_key(|t| t.tick);
        if tempo_map.first().map_or(true, |t| t.tick > 0) {
            tempo_map.insert(
                0,
                TempoChange {
                    tick: 0,
                    micros_per_quarter: DEFAULT_TEMPO_MICROS,
                },
            );
        }
        TickClock { timing, tempo_map }
    }

    fn seconds(&self, tick: u64) -> f64 {
        match self.timing {
            Timing::Metrical(ppq) => {
                let ppq = ppq.as_int().max(1) as f64;
                let mut secs = 0.0;
                for (i, change) in self.tempo_map.iter().enumerate() {
                    if change.tick >= tick {
                        break;
                    }
                    let segment_end = self
                        .tempo_map
                        .get(i + 1)
                        .map_or(tick, |next| next.tick.min(tick));
                    let ticks = (segment_end - change.tick) as f64;
                    secs += ticks / ppq * change.micros_per_quarter as f64 / 1_000_000.0;
                }
                secs
            }
            Timing::Timecode(fps, subframes) => {
                let ticks_per_sec = fps.as_f32() as f64 * subframes.max(1) as f64;
                tick as f64 / ticks_per_sec
            }
        }
    }
}

/// Decode a Standard MIDI File into a flat NoteSet sorted by onset.
///
/// Note-on with velocity 0 ends a note. Notes still sounding when their
/// track ends are closed at the track's last tick; zero-length notes are
/// dropped.
pub fn import_midi(bytes: &[u8]) -> Result<NoteSet, MapError> {
    let smf = Smf::parse(bytes)?;

    let mut tempo_map = Vec::new();
    for track in &smf.tracks {
        let mut tick = 0u64;
        for event in track {
            tick += event.delta.as_int() as u64;
            if let TrackEventKind::Meta(MetaMessage::Tempo(t)) = event.kind {
                tempo_map.push(TempoChange {
                    tick,
                    micros_per_quarter: t.as_int(),
                });
            }
        }
    }
    let clock = TickClock::new(smf.header.timing, tempo_map);

    let mut notes = Vec::new();
    for track in &smf.tracks {
        // (channel, key) -> stack of (start tick, velocity)
        let mut open: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();
        let mut spans: Vec<(u8, u64, u64, u8)> = Vec::new();
        let mut tick = 0u64;

        for event in track {
            tick += event.delta.as_int() as u64;
            if let TrackEventKind::Midi { channel, message } = event.kind {
                let ch = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        open.entry((ch, key.as_int()))
                            .or_default()
                            .push((tick, vel.as_int()));
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        if let Some((start, vel)) =
                            open.get_mut(&(ch, key.as_int())).and_then(|s| s.pop())
                        {
                            spans.push((key.as_int(), start, tick, vel));
                        }
                    }
                    _ => {}
                }
            }
        }

        for ((_, key), stack) in open {
            for (start, vel) in stack {
                spans.push((key, start, tick, vel));
            }
        }

        for (key, start, end, vel) in spans {
            let start_time = clock.seconds(start);
            let duration = clock.seconds(end) - start_time;
            if duration <= 0.0 {
                continue;
            }
            notes.push(Note::new(key, start_time, duration).with_velocity(vel as f64 / 127.0));
        }
    }

    notes.sort_by(|a, b| {
        a.start_time
            .total_cmp(&b.start_time)
            .then(a.pitch.cmp(&b.pitch))
    });
    log::info!(
        "imported {} notes from {} MIDI tracks",
        notes.len(),
        smf.tracks.len()
    );
    Ok(notes)
}

fn seconds_to_ticks(secs: f64) -> u64 {
    let ticks_per_sec = EXPORT_BPM / 60.0 * EXPORT_TICKS_PER_QUARTER as f64;
    (secs.max(0.0) * ticks_per_sec).round() as u64
}

fn midi_velocity(note: &Note) -> u8 {
    note.velocity
        .map_or(DEFAULT_VELOCITY, |v| (v * 127.0).round().clamp(1.0, 127.0) as u8)
}

fn push(track: &mut Track<'static>, delta: u32, kind: TrackEventKind<'static>) {
    track.push(TrackEvent {
        delta: u28::new(delta),
        kind,
    });
}

fn note_track(
    name: &'static [u8],
    channel: u4,
    notes: &[Note],
    header: bool,
) -> Result<Track<'static>, MapError> {
    let mut track: Track<'static> = Vec::new();

    if header {
        let micros = (60_000_000.0 / EXPORT_BPM) as u32;
        push(&mut track, 0, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros))));
        push(&mut track, 0, TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8)));
    }
    push(&mut track, 0, TrackEventKind::Meta(MetaMessage::TrackName(name)));

    // (tick, is_on, pitch, velocity); note-offs sort before note-ons on the same tick
    let mut events: Vec<(u64, bool, u8, u8)> = Vec::with_capacity(notes.len() * 2);
    for note in notes {
        let pitch = note.pitch.min(127);
        let start = seconds_to_ticks(note.start_time);
        let end = start
            .checked_add(1)
            .map(|min_end| seconds_to_ticks(note.end_time()).max(min_end))
            .ok_or_else(|| out_of_range(note))?;
        events.push((start, true, pitch, midi_velocity(note)));
        events.push((end, false, pitch, 0));
    }
    events.sort_by_key(|&(tick, is_on, pitch, _)| (tick, is_on, pitch));

    let mut last_tick = 0u64;
    for (tick, is_on, pitch, vel) in events {
        let delta = tick - last_tick;
        if delta > MAX_DELTA_TICKS {
            return Err(MapError::FormatError(format!(
                "gap of {} ticks before pitch {} does not fit a MIDI delta",
                delta, pitch
            )));
        }
        let message = if is_on {
            MidiMessage::NoteOn {
                key: u7::new(pitch),
                vel: u7::new(vel),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(pitch),
                vel: u7::new(0),
            }
        };
        push(&mut track, delta as u32, TrackEventKind::Midi { channel, message });
        last_tick = tick;
    }

    push(&mut track, 0, TrackEventKind::Meta(MetaMessage::EndOfTrack));
    Ok(track)
}

fn out_of_range(note: &Note) -> MapError {
    MapError::FormatError(format!(
        "note at {}s is beyond the exportable range",
        note.start_time
    ))
}

/// Encode a song as a two-track SMF (melody, then harmony).
pub fn export_midi(song: &Song) -> Result<Vec<u8>, MapError> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(EXPORT_TICKS_PER_QUARTER)),
    ));
    smf.tracks
        .push(note_track(b"Melody", u4::new(0), &song.melody, true)?);
    smf.tracks
        .push(note_track(b"Harmony", u4::new(1), &song.harmony, false)?);

    let mut buf = Vec::new();
    smf.write(&mut buf)
        .map_err(|e| MapError::FormatError(format!("MIDI write: {}", e)))?;
    log::debug!("exported song {} as {} bytes of MIDI", song.id, buf.len());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::types::ClassifiedPerformance;
    use approx::assert_relative_eq;

    fn song(melody: Vec<Note>, harmony: Vec<Note>) -> Song {
        Song::new("s1", "Test", ClassifiedPerformance { melody, harmony })
    }

    #[test]
    fn test_export_then_import_keeps_notes() {
        let s = song(
            vec![
                Note::new(72, 0.0, 0.5).with_velocity(1.0),
                Note::new(74, 0.5, 0.5),
            ],
            vec![Note::new(60, 0.0, 1.0), Note::new(64, 0.0, 1.0)],
        );
        let bytes = export_midi(&s).unwrap();
        let notes = import_midi(&bytes).unwrap();

        assert_eq!(notes.len(), 4);
        let pitches: Vec<u8> = notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 64, 72, 74]);
        let d = notes.iter().find(|n| n.pitch == 74).unwrap();
        assert_relative_eq!(d.start_time, 0.5, epsilon = 1e-6);
        assert_relative_eq!(d.duration, 0.5, epsilon = 1e-6);
        let c = notes.iter().find(|n| n.pitch == 72).unwrap();
        assert_relative_eq!(c.velocity.unwrap(), 1.0);
    }

    #[test]
    fn test_export_rejects_onsets_past_delta_range() {
        // 300000 s is 288M ticks, past the 28-bit delta limit
        let late = song(vec![Note::new(60, 300_000.0, 1.0)], vec![]);
        assert!(matches!(export_midi(&late), Err(MapError::FormatError(_))));

        let later = song(vec![Note::new(60, 1.0e9, 1.0)], vec![]);
        assert!(matches!(export_midi(&later), Err(MapError::FormatError(_))));

        let saturated = song(vec![], vec![Note::new(60, 1.0e20, 1.0)]);
        assert!(matches!(export_midi(&saturated), Err(MapError::FormatError(_))));
    }

    #[test]
    fn test_export_keeps_long_but_representable_onsets() {
        let s = song(vec![Note::new(60, 200_000.0, 1.0)], vec![]);
        let notes = import_midi(&export_midi(&s).unwrap()).unwrap();
        assert_eq!(notes.len(), 1);
        assert_relative_eq!(notes[0].start_time, 200_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_export_has_two_tracks() {
        let bytes = export_midi(&song(vec![Note::new(67, 0.0, 1.0)], vec![])).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.tracks.len(), 2);
        assert!(smf.tracks[0].iter().any(|e| matches!(
            e.kind,
            TrackEventKind::Meta(MetaMessage::Tempo(t)) if t.as_int() == 500_000
        )));
        assert!(smf.tracks[0].iter().any(|e| matches!(
            e.kind,
            TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, _, _))
        )));
    }

    fn build_smf(tracks: Vec<Track<'static>>, ppq: u16) -> Vec<u8> {
        let mut smf = Smf::new(Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(ppq)),
        ));
        smf.tracks = tracks;
        let mut buf = Vec::new();
        smf.write(&mut buf).unwrap();
        buf
    }

    fn ev(delta: u32, kind: TrackEventKind<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind,
        }
    }

    fn on(key: u8, vel: u8) -> TrackEventKind<'static> {
        TrackEventKind::Midi {
            channel: u4::new(0),
            message: MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(vel),
            },
        }
    }

    #[test]
    fn test_import_follows_tempo_changes() {
        // 96 ppq; quarter at 120 bpm then quarters at 60 bpm
        let tempo_track = vec![
            ev(0, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000)))),
            ev(96, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(1_000_000)))),
            ev(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
        ];
        let notes_track = vec![
            ev(0, on(60, 100)),
            ev(96, on(60, 0)),
            ev(0, on(62, 100)),
            ev(96, on(62, 0)),
            ev(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
        ];
        let notes = import_midi(&build_smf(vec![tempo_track, notes_track], 96)).unwrap();
        assert_eq!(notes.len(), 2);
        assert_relative_eq!(notes[0].duration, 0.5);
        assert_relative_eq!(notes[1].start_time, 0.5);
        assert_relative_eq!(notes[1].duration, 1.0);
    }

    #[test]
    fn test_import_closes_dangling_notes() {
        let track = vec![
            ev(0, on(65, 64)),
            ev(480, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
        ];
        let notes = import_midi(&build_smf(vec![track], 480)).unwrap();
        assert_eq!(notes.len(), 1);
        assert_relative_eq!(notes[0].duration, 0.5);
    }

    #[test]
    fn test_import_rejects_garbage() {
        assert!(matches!(
            import_midi(b"not a midi file"),
            Err(MapError::FormatError(_))
        ));
    }
}
