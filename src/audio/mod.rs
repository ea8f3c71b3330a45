//! Audio graph construction and analysis

mod analyser;
mod capture;
mod file;
mod source;
mod sources;
mod tone;

pub use analyser::{Analyser, AudioBuffer};
pub use file::{decode_wav, DecodedAudio, PlaybackCursor};
pub use source::{
    artifact_file_name, GraphError, PlaybackOutcome, Player, RecordingArtifact, SourceSpec,
};
pub use sources::{list_sources, probe, AudioSource, Capabilities, SourceError, SourceType};
pub use tone::ToneGenerator;

/// Sample rate assumed when sizing analysis windows before a device is open.
pub const ANALYSIS_SAMPLE_RATE: u32 = 44_100;

/// Audio analysis configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Preferred sample rate in Hz (replaced by the device rate at build)
    pub sample_rate: u32,

    /// FFT window size (power of two, at least 32)
    pub fft_size: usize,

    /// Exponential smoothing applied to the magnitude spectrum (0-1)
    pub smoothing: f32,

    /// Magnitude mapped to byte 0 in frequency snapshots
    pub min_decibels: f32,

    /// Magnitude mapped to byte 255 in frequency snapshots
    pub max_decibels: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: ANALYSIS_SAMPLE_RATE,
            fft_size: 256,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AudioConfig {
    /// Validate the configuration, returning a description of the first
    /// problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.fft_size < 32 || !self.fft_size.is_power_of_two() {
            return Err(format!(
                "fft_size must be a power of two >= 32, got {}",
                self.fft_size
            ));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(format!("smoothing must be in [0, 1), got {}", self.smoothing));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels, self.max_decibels
            ));
        }
        Ok(())
    }
}

/// Number of cycles of the target frequency an analysis window should cover.
const WINDOW_CYCLES: f32 = 8.0;

/// Smallest power-of-two FFT size (floor 32) whose window covers
/// [`WINDOW_CYCLES`] cycles of `freq` at the analysis sample rate.
///
/// Low tones need wide windows (440 Hz -> 1024); ultrasonic tones fit in the
/// floor (18 kHz -> 32).
pub fn fft_size_for_frequency(freq: f32) -> usize {
    let window = WINDOW_CYCLES / freq * ANALYSIS_SAMPLE_RATE as f32;
    let mut size = 32usize;
    while (size as f32) < window {
        size *= 2;
    }
    size
}
