//! Audio loading and buffer utilities

use crate::config::Config;
use crate::error::{Result, TranscribeError};
use hound::WavReader;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Extensions the loader accepts. WAV is read with hound, the compressed
/// containers with symphonia.
const DECODABLE_EXTENSIONS: [&str; 7] = ["wav", "mp3", "flac", "ogg", "m4a", "mp4", "aac"];

/// Mono recording at a fixed sample rate, samples in [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Load a file, downmix to mono and resample to the configured rate
    pub fn load<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self> {
        let (samples, sr) = load_audio_file(path)?;
        let samples = resample_linear(&samples, sr, config.audio.sample_rate);
        if samples.is_empty() {
            return Err(TranscribeError::EmptyAudio);
        }
        Ok(Self::new(samples, config.audio.sample_rate))
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_sec(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn rms(&self) -> f32 {
        rms(&self.samples)
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }
}

/// Whether the path looks like an audio file the loader can decode
pub fn is_supported_audio<P: AsRef<Path>>(path: P) -> bool {
    DECODABLE_EXTENSIONS.contains(&extension_of(path.as_ref()).as_str())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Load audio file and return mono samples with their native sample rate
pub fn load_audio_file<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, u32)> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(TranscribeError::AudioLoadFailed(format!(
            "Audio file does not exist: {}",
            path.display()
        )));
    }

    let extension = extension_of(path);
    match extension.as_str() {
        "wav" => load_wav_file(path),
        ext if DECODABLE_EXTENSIONS.contains(&ext) => decode_with_symphonia(path),
        _ => Err(TranscribeError::UnsupportedAudioFormat(format!(
            "Unrecognised audio extension: '{}'",
            extension
        ))),
    }
}

/// Load WAV file
fn load_wav_file(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(TranscribeError::AudioLoadFailed(
            "WAV header declares zero channels".to_string(),
        ));
    }

    if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
        return Err(TranscribeError::UnsupportedAudioFormat(format!(
            "Unsupported bit depth: {}",
            spec.bits_per_sample
        )));
    }

    let sr = spec.sample_rate;
    let mut interleaved: Vec<f32> = Vec::with_capacity(reader.len() as usize);

    match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            for sample in reader.samples::<i32>() {
                interleaved.push(sample? as f32 / max_value);
            }
        }
        hound::SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                interleaved.push(sample?);
            }
        }
    }

    finish_decode(&interleaved, spec.channels as usize, sr)
}

/// Decode any container/codec symphonia recognises (MP3, FLAC, Ogg Vorbis,
/// AAC/ALAC in MP4, WAV)
pub fn decode_with_symphonia<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, u32)> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| {
            TranscribeError::UnsupportedAudioFormat(format!("No container recognised: {}", e))
        })?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| {
            TranscribeError::UnsupportedAudioFormat(format!(
                "{} has no decodable audio track",
                path.display()
            ))
        })?;
    let track_id = track.id;
    let sr = track.codec_params.sample_rate.ok_or_else(|| {
        TranscribeError::AudioLoadFailed(format!(
            "{} does not declare a sample rate",
            path.display()
        ))
    })?;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut channels = 1usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::warn!("Skipping undecodable packet in {}: {}", path.display(), msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(buf.samples());
    }

    finish_decode(&interleaved, channels, sr)
}

/// Downmix decoded samples and reject empty streams
fn finish_decode(interleaved: &[f32], channels: usize, sr: u32) -> Result<(Vec<f32>, u32)> {
    let samples = downmix_to_mono(interleaved, channels);
    if samples.is_empty() {
        return Err(TranscribeError::EmptyAudio);
    }

    let peak = samples.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
    if peak > 0.99 {
        log::warn!("Audio file may be clipped (peak = {:.3})", peak);
    }

    Ok((samples, sr))
}

/// Average interleaved channels into one
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = ((samples.len() as f64) * ratio).round().max(1.0) as usize;
    let last = samples.len() - 1;

    (0..new_len)
        .map(|i| {
            let pos = i as f64 / ratio;
            let idx = pos.floor() as usize;
            if idx >= last {
                return samples[last];
            }
            let frac = (pos - idx as f64) as f32;
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        })
        .collect()
}

/// Root mean square level
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
}
