//! Pass 4: Duration Estimation
//!
//! A note lasts until the next onset in the same voice, snapped to one of
//! the canonical lengths below. The last note of a voice gets the default.

use crate::analysis::NoteEvent;
use crate::config::DurationConfig;

/// Canonical note lengths in beats with their inclusive upper gap bounds
const DURATION_CATEGORIES: [(f32, f32); 3] = [
    (0.75, 0.5), // eighth
    (1.5, 1.0),  // quarter
    (3.0, 2.0),  // half
];
const LONGEST_CATEGORY: f32 = 4.0; // whole

/// Snap a gap measured in beats to a canonical length
pub fn quantize_duration(gap_beats: f32) -> f32 {
    DURATION_CATEGORIES
        .iter()
        .find(|(upper, _)| gap_beats <= *upper)
        .map(|&(_, beats)| beats)
        .unwrap_or(LONGEST_CATEGORY)
}

/// Fill `duration_beats` for the events of one voice
pub fn estimate_voice(
    mut events: Vec<NoteEvent>,
    tempo_bpm: f32,
    config: &DurationConfig,
) -> Vec<NoteEvent> {
    events.sort_by(|a, b| a.onset_sec.total_cmp(&b.onset_sec));

    let beats_per_sec = tempo_bpm / 60.0;
    let next_onsets: Vec<Option<f32>> = (0..events.len())
        .map(|i| events.get(i + 1).map(|e| e.onset_sec))
        .collect();

    for (event, next) in events.iter_mut().zip(next_onsets) {
        let beats = match next {
            Some(next_sec) => quantize_duration((next_sec - event.onset_sec) * beats_per_sec),
            None => config.default_duration_beats,
        };
        event.duration_beats = Some(beats);
    }

    events
}

/// Estimate durations for both voices independently
pub fn run(
    treble: Vec<NoteEvent>,
    bass: Vec<NoteEvent>,
    tempo_bpm: f32,
    config: &DurationConfig,
) -> (Vec<NoteEvent>, Vec<NoteEvent>) {
    log::info!("Pass 4: Duration Estimation");
    let treble = estimate_voice(treble, tempo_bpm, config);
    let bass = estimate_voice(bass, tempo_bpm, config);
    log::info!("  ✓ Durations assigned at {:.1} BPM", tempo_bpm);
    (treble, bass)
}
