//! Transcription data model and analysis export

use crate::error::{Result, TranscribeError};
use serde::{Deserialize, Serialize};
use std::path::Path;

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Candidate note start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Onset {
    /// Time in seconds
    pub time_sec: f32,
    /// Sample index the time was derived from
    pub sample_idx: usize,
    /// STFT frame the onset was picked at
    pub frame_idx: usize,
    /// Onset detection function value at the picked frame
    pub strength: f32,
}

/// Positive-frequency magnitude spectrum of one analysis window
#[derive(Debug, Clone)]
pub struct SpectralFrame {
    pub freqs: Vec<f32>,
    pub magnitudes: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyPeak {
    pub frequency_hz: f32,
    pub magnitude: f32,
}

/// Semitone-quantized pitch in MIDI numbering (60 = middle C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pitch(pub u8);

impl Pitch {
    pub const MIDDLE_C: Pitch = Pitch(60);

    pub fn midi(self) -> u8 {
        self.0
    }

    pub fn pitch_class(self) -> u8 {
        self.0 % 12
    }

    /// Scientific pitch octave (middle C is octave 4)
    pub fn octave(self) -> i8 {
        (self.0 / 12) as i8 - 1
    }

    /// Sharp spelling, e.g. `C#4`
    pub fn name(self) -> String {
        format!("{}{}", SHARP_NAMES[self.pitch_class() as usize], self.octave())
    }

    /// Equal-tempered frequency relative to `reference_hz` for A4
    pub fn frequency_hz(self, reference_hz: f32) -> f32 {
        reference_hz * 2.0f32.powf((self.0 as f32 - 69.0) / 12.0)
    }
}

/// One of the two concurrent melodic lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Treble,
    Bass,
}

impl Voice {
    pub fn name(&self) -> &'static str {
        match self {
            Voice::Treble => "treble",
            Voice::Bass => "bass",
        }
    }
}

/// Canonical output unit of the transcription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub onset_sec: f32,
    pub pitch: Pitch,
    pub voice: Voice,
    /// Filled in by the duration pass
    pub duration_beats: Option<f32>,
    pub source_frequency_hz: f32,
    pub magnitude: f32,
}

/// Major key signature in circle-of-fifths encoding (sharps > 0, flats < 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeySignature(pub i8);

impl KeySignature {
    pub fn sharps(self) -> i8 {
        self.0
    }

    /// Pitch class of the major tonic
    pub fn tonic_pitch_class(self) -> u8 {
        (self.0 as i32 * 7).rem_euclid(12) as u8
    }

    pub fn name(self) -> String {
        let tonic = match self.0 {
            -1 => "F",
            -2 => "Bb",
            -3 => "Eb",
            -4 => "Ab",
            -5 => "Db",
            -6 => "Gb",
            -7 => "Cb",
            _ => SHARP_NAMES[self.tonic_pitch_class() as usize],
        };
        format!("{} major", tonic)
    }
}

/// Why a spectral peak did not become a note
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PeakRejection {
    FrequencyOutOfRange { frequency_hz: f32 },
    PitchOutOfRange { frequency_hz: f32, semitone: i32 },
    VoiceAlreadyFilled { frequency_hz: f32, pitch: Pitch, voice: Voice },
}

/// Accept/reject decision for one onset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DetectionOutcome {
    /// At least one note was produced
    Accepted {
        pitches: Vec<Pitch>,
        rejections: Vec<PeakRejection>,
    },
    /// Window was empty after clipping to the buffer
    EmptyWindow,
    /// No spectral peak above the magnitude threshold
    NoPeaks,
    /// Peaks were found but none mapped to a usable pitch
    NoValidPitch { rejections: Vec<PeakRejection> },
}

impl DetectionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, DetectionOutcome::Accepted { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnsetDiagnostic {
    pub onset_sec: f32,
    pub outcome: DetectionOutcome,
}

/// Everything handed to the notation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    pub treble: Vec<NoteEvent>,
    pub bass: Vec<NoteEvent>,
    pub key_signature: KeySignature,
    pub duration_sec: f32,
    pub sample_rate: u32,
    pub diagnostics: Vec<OnsetDiagnostic>,
}

impl Transcription {
    pub fn note_count(&self) -> usize {
        self.treble.len() + self.bass.len()
    }

    /// Both voices merged in onset order
    pub fn all_notes(&self) -> Vec<&NoteEvent> {
        let mut notes: Vec<&NoteEvent> = self.treble.iter().chain(self.bass.iter()).collect();
        notes.sort_by(|a, b| a.onset_sec.total_cmp(&b.onset_sec));
        notes
    }

    pub fn detection_misses(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| !d.outcome.is_accepted())
            .count()
    }
}

/// Write the transcription as pretty JSON
pub fn export_analysis<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| export_error(path, e))?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|e| export_error(path, e))?;
    Ok(())
}

fn export_error(path: &Path, err: std::io::Error) -> TranscribeError {
    TranscribeError::ExportError(format!("{}: {}", path.display(), err))
}
