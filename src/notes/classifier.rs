use crate::notes::types::{ClassifiedPerformance, Note};

/// Onsets closer than this to the first note of a group sound together.
pub const SIMULTANEITY_THRESHOLD_SECS: f64 = 0.02;

/// Split a performance into a single-voice melody and the accompaniment.
///
/// Notes are grouped greedily by onset: a group keeps growing while the next
/// note starts less than 20 ms after the group's *first* note. The highest
/// note of each group is the melody note (first one wins on equal pitch),
/// everything else in the group is harmony. Both outputs stay in
/// chronological order.
pub fn classify(notes: &[Note]) -> ClassifiedPerformance {
    let mut sorted: Vec<&Note> = notes.iter().collect();
    sorted.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let mut melody = Vec::new();
    let mut harmony = Vec::new();

    let mut i = 0;
    while i < sorted.len() {
        let group_start = sorted[i].start_time;
        let mut end = i + 1;
        while end < sorted.len()
            && sorted[end].start_time - group_start < SIMULTANEITY_THRESHOLD_SECS
        {
            end += 1;
        }

        let group = &sorted[i..end];
        let mut top = 0;
        for (idx, note) in group.iter().enumerate().skip(1) {
            if note.pitch > group[top].pitch {
                top = idx;
            }
        }

        for (idx, note) in group.iter().enumerate() {
            if idx == top {
                melody.push((*note).clone());
            } else {
                harmony.push((*note).clone());
            }
        }

        i = end;
    }

    log::debug!(
        "classified {} notes: {} melody, {} harmony",
        notes.len(),
        melody.len(),
        harmony.len()
    );

    ClassifiedPerformance { melody, harmony }
}
