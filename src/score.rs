//! Measure layout handed to the notation layer
//!
//! Every measure is filled from beat 0 to the bar line with notes and
//! explicit rests, so no beat slot is ever left unaccounted for.

use crate::analysis::{KeySignature, NoteEvent, Pitch, Transcription, Voice};
use crate::config::ScoreConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScoreElement {
    Note {
        pitch: Pitch,
        offset_beats: f32,
        length_beats: f32,
        onset_sec: f32,
    },
    Rest {
        offset_beats: f32,
        length_beats: f32,
    },
}

impl ScoreElement {
    pub fn offset_beats(&self) -> f32 {
        match self {
            ScoreElement::Note { offset_beats, .. } | ScoreElement::Rest { offset_beats, .. } => {
                *offset_beats
            }
        }
    }

    pub fn length_beats(&self) -> f32 {
        match self {
            ScoreElement::Note { length_beats, .. } | ScoreElement::Rest { length_beats, .. } => {
                *length_beats
            }
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, ScoreElement::Rest { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    /// 1-based measure number
    pub number: u32,
    pub elements: Vec<ScoreElement>,
}

impl Measure {
    pub fn total_beats(&self) -> f32 {
        self.elements.iter().map(ScoreElement::length_beats).sum()
    }

    pub fn notes(&self) -> impl Iterator<Item = &ScoreElement> {
        self.elements.iter().filter(|e| !e.is_rest())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub voice: Voice,
    pub measures: Vec<Measure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreLayout {
    pub key_signature: KeySignature,
    pub tempo_bpm: f32,
    pub beats_per_measure: u32,
    pub treble: Part,
    pub bass: Part,
}

/// Number of measures covering `duration_sec`, at least one
pub fn measure_count(duration_sec: f32, config: &ScoreConfig) -> u32 {
    let measures = (duration_sec / config.seconds_per_measure()).ceil();
    if measures.is_finite() && measures >= 1.0 {
        measures as u32
    } else {
        1
    }
}

/// Beat position of an onset snapped to the grid, clamped into the piece
fn snapped_beat(onset_sec: f32, total_beats: f32, config: &ScoreConfig) -> f32 {
    let raw = onset_sec / config.seconds_per_beat();
    let beat = (raw / config.grid_beats).round() * config.grid_beats;
    beat.clamp(0.0, total_beats - config.grid_beats)
}

fn layout_part(voice: Voice, notes: &[NoteEvent], n_measures: u32, config: &ScoreConfig) -> Part {
    let beats_per_measure = config.beats_per_measure as f32;
    let total_beats = beats_per_measure * n_measures as f32;

    let mut placed: Vec<(f32, &NoteEvent)> = notes
        .iter()
        .map(|n| (snapped_beat(n.onset_sec, total_beats, config), n))
        .collect();
    placed.sort_by(|a, b| a.0.total_cmp(&b.0));

    // One note per grid slot within a voice
    let mut unique: Vec<(f32, &NoteEvent)> = Vec::with_capacity(placed.len());
    for (beat, note) in placed {
        if unique.last().is_some_and(|(prev, _)| *prev == beat) {
            log::warn!(
                "  {} note {} at {:.3}s shares beat {} with an earlier note, dropped",
                voice.name(),
                note.pitch.name(),
                note.onset_sec,
                beat
            );
            continue;
        }
        unique.push((beat, note));
    }

    let mut measures = Vec::with_capacity(n_measures as usize);
    let mut cursor_idx = 0;

    for m in 0..n_measures {
        let start = m as f32 * beats_per_measure;
        let end = start + beats_per_measure;
        let mut elements = Vec::new();
        let mut cursor = start;

        while cursor_idx < unique.len() && unique[cursor_idx].0 < end {
            let (beat, note) = unique[cursor_idx];
            cursor_idx += 1;

            if beat > cursor {
                elements.push(ScoreElement::Rest {
                    offset_beats: cursor - start,
                    length_beats: beat - cursor,
                });
            }

            let next_boundary = unique
                .get(cursor_idx)
                .map(|(next, _)| *next)
                .filter(|next| *next < end)
                .unwrap_or(end);
            let wanted = note.duration_beats.unwrap_or(config.grid_beats);
            let length = wanted.min(next_boundary - beat);

            elements.push(ScoreElement::Note {
                pitch: note.pitch,
                offset_beats: beat - start,
                length_beats: length,
                onset_sec: note.onset_sec,
            });
            cursor = beat + length;
        }

        if cursor < end {
            elements.push(ScoreElement::Rest {
                offset_beats: cursor - start,
                length_beats: end - cursor,
            });
        }

        measures.push(Measure {
            number: m + 1,
            elements,
        });
    }

    Part { voice, measures }
}

/// Partition both voices into measures
pub fn assemble(transcription: &Transcription, config: &ScoreConfig) -> ScoreLayout {
    log::info!("Score layout");

    let n_measures = measure_count(transcription.duration_sec, config);
    let treble = layout_part(Voice::Treble, &transcription.treble, n_measures, config);
    let bass = layout_part(Voice::Bass, &transcription.bass, n_measures, config);

    log::info!(
        "  ✓ {} measures of {} beats at {:.1} BPM",
        n_measures,
        config.beats_per_measure,
        config.tempo_bpm
    );

    ScoreLayout {
        key_signature: transcription.key_signature,
        tempo_bpm: config.tempo_bpm,
        beats_per_measure: config.beats_per_measure,
        treble,
        bass,
    }
}
