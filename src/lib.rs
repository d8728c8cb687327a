//! Piano-to-Score Transcription System
//!
//! A deterministic, non-ML pipeline that turns a short recorded piano
//! performance into two voices of discrete notes (onset, pitch, duration)
//! plus a key signature estimate, ready for a notation layer.

pub mod analysis;
pub mod audio;
pub mod cancel;
pub mod config;
pub mod error;
pub mod passes;
pub mod score;
pub mod spectral;

pub use analysis::{KeySignature, NoteEvent, Pitch, Transcription, Voice};
pub use audio::AudioBuffer;
pub use cancel::CancellationToken;
pub use config::Config;
pub use error::{Result, TranscribeError};
pub use passes::pass_3::{FixedSplit, VoiceClassifier};
pub use score::ScoreLayout;

use passes::pass_5::KeySignatureTable;
use std::path::Path;

/// Main processing pipeline for audio-to-score transcription
pub struct Transcriber {
    config: Config,
    key_table: KeySignatureTable,
    voices: Box<dyn VoiceClassifier + Send + Sync>,
}

impl Transcriber {
    /// Create a transcriber, rejecting invalid configuration up front
    pub fn new(config: Config) -> Result<Self> {
        config::validate_config(&config)?;
        let voices = FixedSplit::new(Pitch(config.pitch.split_pitch));
        Ok(Self {
            config,
            key_table: KeySignatureTable::default(),
            voices: Box::new(voices),
        })
    }

    /// Replace the fixed-split voice policy
    pub fn with_voice_classifier<C>(mut self, classifier: C) -> Self
    where
        C: VoiceClassifier + Send + Sync + 'static,
    {
        self.voices = Box::new(classifier);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load an audio file and transcribe it
    pub fn transcribe_file<P: AsRef<Path>>(
        &self,
        input_path: P,
        cancel: &CancellationToken,
    ) -> Result<Transcription> {
        let buffer = AudioBuffer::load(input_path, &self.config)?;
        self.transcribe_buffer(&buffer, cancel)
    }

    /// Transcribe an already decoded buffer. Buffers at another sample rate
    /// are resampled to the configured one first.
    pub fn transcribe_buffer(
        &self,
        buffer: &AudioBuffer,
        cancel: &CancellationToken,
    ) -> Result<Transcription> {
        if buffer.sample_rate() != self.config.audio.sample_rate && !buffer.is_empty() {
            let resampled = AudioBuffer::new(
                audio::resample_linear(
                    buffer.samples(),
                    buffer.sample_rate(),
                    self.config.audio.sample_rate,
                ),
                self.config.audio.sample_rate,
            );
            return self.run_pipeline(&resampled, cancel);
        }
        self.run_pipeline(buffer, cancel)
    }

    /// Transcribe and lay out measures in one call
    pub fn transcribe_to_score(
        &self,
        buffer: &AudioBuffer,
        cancel: &CancellationToken,
    ) -> Result<(Transcription, ScoreLayout)> {
        let transcription = self.transcribe_buffer(buffer, cancel)?;
        check_cancelled(cancel, "score layout")?;
        let layout = self.assemble_score(&transcription);
        Ok((transcription, layout))
    }

    pub fn assemble_score(&self, transcription: &Transcription) -> ScoreLayout {
        score::assemble(transcription, &self.config.score)
    }

    /// Execute the complete multi-pass pipeline
    fn run_pipeline(&self, buffer: &AudioBuffer, cancel: &CancellationToken) -> Result<Transcription> {
        let config = &self.config;

        // Pass 0: Preflight
        check_cancelled(cancel, "preflight")?;
        let report = passes::pass_0::run(buffer, config)?;

        // Pass 1: Onset Detection
        check_cancelled(cancel, "onset detection")?;
        let onsets = passes::pass_1::run(buffer, &config.onset);

        // Pass 2: Spectral Window Analysis & Peak Extraction
        check_cancelled(cancel, "spectral analysis")?;
        let onset_peaks = passes::pass_2::run(buffer, &onsets, &config.spectral);

        // Pass 3: Pitch Mapping & Voice Classification
        check_cancelled(cancel, "pitch mapping")?;
        let voiced = passes::pass_3::run(&onset_peaks, &config.pitch, self.voices.as_ref());

        // Pass 4: Duration Estimation
        check_cancelled(cancel, "duration estimation")?;
        let (treble, bass) = passes::pass_4::run(
            voiced.treble,
            voiced.bass,
            config.score.tempo_bpm,
            &config.duration,
        );

        // Pass 5: Key Signature Estimation
        check_cancelled(cancel, "key estimation")?;
        let key_signature = passes::pass_5::run(
            treble.iter().chain(bass.iter()).map(|n| n.pitch),
            &self.key_table,
        );

        let transcription = Transcription {
            treble,
            bass,
            key_signature,
            duration_sec: report.duration_sec,
            sample_rate: buffer.sample_rate(),
            diagnostics: voiced.diagnostics,
        };

        if transcription.detection_misses() > 0 {
            log::warn!(
                "{} of {} onsets produced no note",
                transcription.detection_misses(),
                transcription.diagnostics.len()
            );
        }

        Ok(transcription)
    }
}

fn check_cancelled(cancel: &CancellationToken, stage: &str) -> Result<()> {
    if cancel.is_cancelled() {
        log::info!("Cancelled before {}", stage);
        return Err(TranscribeError::Cancelled(stage.to_string()));
    }
    Ok(())
}

/// Validate configuration and input file
pub fn validate_input<P: AsRef<Path>>(input_path: P, config: &Config) -> Result<()> {
    let path = input_path.as_ref();
    if !audio::is_supported_audio(path) {
        return Err(TranscribeError::UnsupportedAudioFormat(format!(
            "{} is not a decodable audio file",
            path.display()
        )));
    }
    if !path.exists() {
        return Err(TranscribeError::AudioLoadFailed(format!(
            "Audio file does not exist: {}",
            path.display()
        )));
    }

    config::validate_config(config)?;

    Ok(())
}
