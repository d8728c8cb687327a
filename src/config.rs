//! Configuration system for the piano-to-score transcriber

use crate::error::{Result, TranscribeError};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub audio: AudioConfig,
    pub onset: OnsetConfig,
    pub spectral: SpectralConfig,
    pub pitch: PitchConfig,
    pub duration: DurationConfig,
    pub score: ScoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            audio: AudioConfig::default(),
            onset: OnsetConfig::default(),
            spectral: SpectralConfig::default(),
            pitch: PitchConfig::default(),
            duration: DurationConfig::default(),
            score: ScoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Rate every decoded buffer is resampled to
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { sample_rate: 22050 }
    }
}

/// Spectral-flux onset detection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OnsetConfig {
    pub frame_length: usize,
    pub hop_length: usize,
    /// Fraction of the global flux maximum a peak must exceed
    pub relative_threshold: f32,
    /// Multiplier on the local mean flux
    pub adaptive_k: f32,
    pub adaptive_window_sec: f32,
    /// Flux below this is never an onset (silence guard)
    pub absolute_floor: f32,
    /// Refractory period between accepted onsets
    pub min_spacing_sec: f32,
    /// Backtracking: samples below `ratio * local peak` count as quiet
    pub backtrack_ratio: f32,
    pub backtrack_quiet_run: usize,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            frame_length: 1024,
            hop_length: 256,
            relative_threshold: 0.1,
            adaptive_k: 1.5,
            adaptive_window_sec: 0.5,
            absolute_floor: 1e-3,
            min_spacing_sec: 0.1,
            backtrack_ratio: 0.02,
            backtrack_quiet_run: 8,
        }
    }
}

/// Per-onset spectral window and peak extraction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpectralConfig {
    /// How far before the onset the window starts
    pub pre_onset_sec: f32,
    pub window_sec: f32,
    /// Minimum peak magnitude (linear amplitude units)
    pub min_magnitude: f32,
    pub min_separation_hz: f32,
    pub max_peaks: usize,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            pre_onset_sec: 0.05,
            window_sec: 0.3,
            min_magnitude: 0.05,
            min_separation_hz: 20.0,
            max_peaks: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PitchConfig {
    /// Frequencies at or below this are rejected
    pub low_cutoff_hz: f32,
    /// Frequencies above this are rejected
    pub high_cutoff_hz: f32,
    /// Lowest accepted pitch (A0 on a piano)
    pub min_pitch: u8,
    /// Highest accepted pitch (C8 on a piano)
    pub max_pitch: u8,
    /// Concert pitch for A4
    pub reference_hz: f32,
    /// Pitches at or above go to the treble voice (middle C)
    pub split_pitch: u8,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            low_cutoff_hz: 20.0,
            high_cutoff_hz: 4000.0,
            min_pitch: 21,
            max_pitch: 108,
            reference_hz: 440.0,
            split_pitch: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DurationConfig {
    /// Beats given to the last note of a voice
    pub default_duration_beats: f32,
}

impl Default for DurationConfig {
    fn default() -> Self {
        Self {
            default_duration_beats: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoreConfig {
    pub tempo_bpm: f32,
    pub beats_per_measure: u32,
    /// Beat positions are snapped to multiples of this
    pub grid_beats: f32,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            tempo_bpm: 120.0,
            beats_per_measure: 4,
            grid_beats: 0.5,
        }
    }
}

impl ScoreConfig {
    pub fn seconds_per_beat(&self) -> f32 {
        60.0 / self.tempo_bpm
    }

    pub fn seconds_per_measure(&self) -> f32 {
        self.seconds_per_beat() * self.beats_per_measure as f32
    }
}

fn invalid(msg: impl Into<String>) -> TranscribeError {
    TranscribeError::InvalidConfigParameter(msg.into())
}

/// Upper bound for every time span given in seconds
const MAX_SPAN_SEC: f32 = 10.0;

/// Upper bound for the score tempo
const MAX_TEMPO_BPM: f32 = 1000.0;

fn check_span(name: &str, value: f32, allow_zero: bool) -> Result<()> {
    let lower_ok = if allow_zero { value >= 0.0 } else { value > 0.0 };
    if !lower_ok || !(value <= MAX_SPAN_SEC) {
        let lower = if allow_zero { "[0" } else { "(0" };
        return Err(invalid(format!(
            "{} must be within {}, {}] seconds, got {}",
            name, lower, MAX_SPAN_SEC, value
        )));
    }
    Ok(())
}

fn check_ratio(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{} must be within [0, 1], got {}", name, value)));
    }
    Ok(())
}

/// Validate a configuration before any audio is processed
pub fn validate_config(config: &Config) -> Result<()> {
    let sr = config.audio.sample_rate;
    if !(8000..=192000).contains(&sr) {
        return Err(invalid(format!(
            "audio.sample_rate must be within 8000..=192000 Hz, got {}",
            sr
        )));
    }

    // Onset detection
    let onset = &config.onset;
    if onset.frame_length < 16 {
        return Err(invalid(format!(
            "onset.frame_length must be at least 16, got {}",
            onset.frame_length
        )));
    }
    if onset.hop_length == 0 || onset.hop_length > onset.frame_length {
        return Err(invalid(format!(
            "onset.hop_length must be within 1..={}, got {}",
            onset.frame_length, onset.hop_length
        )));
    }
    check_ratio("onset.relative_threshold", onset.relative_threshold)?;
    check_ratio("onset.backtrack_ratio", onset.backtrack_ratio)?;
    if !(onset.adaptive_k >= 0.0) {
        return Err(invalid("onset.adaptive_k must be >= 0"));
    }
    check_span("onset.adaptive_window_sec", onset.adaptive_window_sec, false)?;
    if !(onset.absolute_floor >= 0.0) {
        return Err(invalid("onset.absolute_floor must be >= 0"));
    }
    check_span("onset.min_spacing_sec", onset.min_spacing_sec, true)?;
    if onset.backtrack_quiet_run == 0 {
        return Err(invalid("onset.backtrack_quiet_run must be > 0"));
    }

    // Spectral window
    let spectral = &config.spectral;
    check_span("spectral.window_sec", spectral.window_sec, false)?;
    if !(spectral.pre_onset_sec >= 0.0) || spectral.pre_onset_sec >= spectral.window_sec {
        return Err(invalid(format!(
            "spectral.pre_onset_sec must be within [0, window_sec), got {}",
            spectral.pre_onset_sec
        )));
    }
    if !(spectral.min_magnitude >= 0.0) {
        return Err(invalid(format!(
            "spectral.min_magnitude must be >= 0, got {}",
            spectral.min_magnitude
        )));
    }
    if !(spectral.min_separation_hz >= 0.0) {
        return Err(invalid("spectral.min_separation_hz must be >= 0"));
    }
    if spectral.max_peaks == 0 {
        return Err(invalid("spectral.max_peaks must be > 0"));
    }

    // Pitch mapping
    let pitch = &config.pitch;
    let nyquist = sr as f32 / 2.0;
    if !(pitch.low_cutoff_hz >= 0.0) || !(pitch.low_cutoff_hz < pitch.high_cutoff_hz) {
        return Err(invalid(format!(
            "pitch cutoffs must satisfy 0 <= low < high, got {} / {}",
            pitch.low_cutoff_hz, pitch.high_cutoff_hz
        )));
    }
    if pitch.high_cutoff_hz > nyquist {
        return Err(invalid(format!(
            "pitch.high_cutoff_hz {} exceeds Nyquist frequency {}",
            pitch.high_cutoff_hz, nyquist
        )));
    }
    if pitch.min_pitch > pitch.max_pitch || pitch.max_pitch > 127 {
        return Err(invalid(format!(
            "pitch range must satisfy min <= max <= 127, got {}..={}",
            pitch.min_pitch, pitch.max_pitch
        )));
    }
    if !(pitch.reference_hz > 0.0) {
        return Err(invalid("pitch.reference_hz must be > 0"));
    }
    if !(pitch.min_pitch..=pitch.max_pitch).contains(&pitch.split_pitch) {
        return Err(invalid(format!(
            "pitch.split_pitch {} lies outside the pitch range",
            pitch.split_pitch
        )));
    }

    // Durations and layout
    if !(config.duration.default_duration_beats > 0.0) {
        return Err(invalid("duration.default_duration_beats must be > 0"));
    }
    let score = &config.score;
    if !(score.tempo_bpm > 0.0) || !(score.tempo_bpm <= MAX_TEMPO_BPM) {
        return Err(invalid(format!(
            "score.tempo_bpm must be within (0, {}], got {}",
            MAX_TEMPO_BPM, score.tempo_bpm
        )));
    }
    if score.beats_per_measure == 0 {
        return Err(invalid("score.beats_per_measure must be > 0"));
    }
    if !(score.grid_beats > 0.0) {
        return Err(invalid("score.grid_beats must be > 0"));
    }
    let slots = score.beats_per_measure as f32 / score.grid_beats;
    if (slots - slots.round()).abs() > 1e-4 {
        return Err(invalid(format!(
            "score.grid_beats {} does not divide a {}-beat measure",
            score.grid_beats, score.beats_per_measure
        )));
    }

    Ok(())
}

/// Load configuration from JSON file
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| TranscribeError::ConfigIo(format!("{}: {}", path.display(), e)))?;
    let config: Config = serde_json::from_str(&content)
        .map_err(|e| TranscribeError::ConfigIo(format!("{}: {}", path.display(), e)))?;
    validate_config(&config)?;
    Ok(config)
}

/// Save configuration to JSON file
pub fn save_config<P: AsRef<std::path::Path>>(config: &Config, path: P) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| TranscribeError::ConfigIo(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_hop_longer_than_frame_rejected() {
        let mut config = Config::default();
        config.onset.hop_length = config.onset.frame_length + 1;
        let err = validate_config(&config).unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("hop_length"));
    }

    #[test]
    fn test_ratio_out_of_range_rejected() {
        let mut config = Config::default();
        config.onset.relative_threshold = 1.5;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.spectral.min_magnitude = -0.1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_min_spacing_upper_bound() {
        let mut config = Config::default();
        config.onset.min_spacing_sec = 1e30;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("min_spacing_sec"));

        config.onset.min_spacing_sec = f32::INFINITY;
        assert!(validate_config(&config).is_err());
        config.onset.min_spacing_sec = 10.0;
        assert!(validate_config(&config).is_ok());
        config.onset.min_spacing_sec = 0.0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_adaptive_window_upper_bound() {
        let mut config = Config::default();
        config.onset.adaptive_window_sec = 1e30;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("adaptive_window_sec"));

        config.onset.adaptive_window_sec = f32::NAN;
        assert!(validate_config(&config).is_err());
        config.onset.adaptive_window_sec = 0.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_analysis_window_upper_bound() {
        let mut config = Config::default();
        config.spectral.window_sec = 1e30;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("window_sec"));
    }

    #[test]
    fn test_tempo_upper_bound() {
        let mut config = Config::default();
        config.score.tempo_bpm = 1e30;
        assert!(validate_config(&config).is_err());
        config.score.tempo_bpm = f32::INFINITY;
        assert!(validate_config(&config).is_err());
        config.score.tempo_bpm = 240.0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_cutoff_above_nyquist_rejected() {
        let mut config = Config::default();
        config.pitch.high_cutoff_hz = 12000.0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("Nyquist"));
    }

    #[test]
    fn test_grid_must_divide_measure() {
        let mut config = Config::default();
        config.score.grid_beats = 0.75;
        assert!(validate_config(&config).is_err());
        config.score.grid_beats = 0.25;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{"score": {"tempo_bpm": 90.0}}"#).unwrap();
        assert_eq!(config.score.tempo_bpm, 90.0);
        assert_eq!(config.score.beats_per_measure, 4);
        assert_eq!(config.audio.sample_rate, 22050);
    }
}
