//! Tone generation on the output device, with an optional recording tap

use super::source::{
    artifact_file_name, run_graph_loop, GraphCommand, GraphError, GraphParts, RecordingArtifact,
};
use super::{Analyser, AudioConfig};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

/// Peak amplitude of generated tones. Kept well below full scale so a
/// mistyped frequency cannot produce a painful burst.
const TONE_AMPLITUDE: f32 = 0.5;

/// Sine generator that stops itself after a sample-counted duration.
pub struct ToneGenerator {
    freq: f32,
    sample_rate: f32,
    produced: u64,
    total: u64,
}

impl ToneGenerator {
    pub fn new(freq: f32, duration_secs: f32, sample_rate: f32) -> Self {
        Self {
            freq,
            sample_rate,
            produced: 0,
            total: (duration_secs * sample_rate).round() as u64,
        }
    }

    /// Next sample, or `None` once the configured duration has elapsed.
    pub fn next_sample(&mut self) -> Option<f32> {
        if self.produced >= self.total {
            return None;
        }
        let t = self.produced as f32;
        self.produced += 1;
        Some(TONE_AMPLITUDE * (2.0 * std::f32::consts::PI * self.freq * t / self.sample_rate).sin())
    }

    pub fn is_finished(&self) -> bool {
        self.produced >= self.total
    }
}

/// WAV tap over the generated samples, finalized into the named artifact.
struct Recorder {
    writer: hound::WavWriter<std::io::BufWriter<std::fs::File>>,
    path: PathBuf,
}

impl Recorder {
    fn create(dir: &Path, freq: f32, duration: f32, sample_rate: u32) -> Result<Self, GraphError> {
        std::fs::create_dir_all(dir).map_err(|e| GraphError::Record(e.to_string()))?;
        let path = dir.join(artifact_file_name(freq, duration));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let writer =
            hound::WavWriter::create(&path, spec).map_err(|e| GraphError::Record(e.to_string()))?;
        Ok(Self { writer, path })
    }

    fn write(&mut self, sample: f32) {
        let _ = self.writer.write_sample(sample);
    }

    fn finish(self) -> Result<RecordingArtifact, GraphError> {
        let path = self.path.clone();
        self.writer
            .finalize()
            .map_err(|e| GraphError::Record(e.to_string()))?;
        Ok(RecordingArtifact { path })
    }
}

pub(super) fn spawn(
    freq: f32,
    duration: f32,
    record_dir: Option<PathBuf>,
    config: &AudioConfig,
) -> Result<GraphParts, GraphError> {
    let analyser = Arc::new(Mutex::new(Analyser::new(config, config.sample_rate)));
    let (command_tx, command_rx) = mpsc::channel();
    let (ready_tx, ready_rx) = oneshot::channel();
    let (ended_tx, ended_rx) = oneshot::channel();
    let (artifact_tx, artifact_rx) = if record_dir.is_some() {
        let (tx, rx) = oneshot::channel();
        (Some(tx), Some(rx))
    } else {
        (None, None)
    };

    let config = config.clone();
    let analyser_clone = analyser.clone();
    let thread = thread::Builder::new()
        .name("tone-playback".to_string())
        .spawn(move || {
            run_tone_thread(
                freq,
                duration,
                record_dir,
                config,
                analyser_clone,
                command_rx,
                ready_tx,
                ended_tx,
                artifact_tx,
            )
        })
        .map_err(|e| GraphError::Thread(e.to_string()))?;

    Ok(GraphParts {
        analyser,
        command_tx,
        thread,
        ready_rx,
        ended_rx,
        artifact_rx,
    })
}

#[allow(clippy::too_many_arguments)]
fn run_tone_thread(
    freq: f32,
    duration: f32,
    record_dir: Option<PathBuf>,
    config: AudioConfig,
    analyser: Arc<Mutex<Analyser>>,
    command_rx: Receiver<GraphCommand>,
    ready_tx: oneshot::Sender<Result<(), GraphError>>,
    ended_tx: oneshot::Sender<super::PlaybackOutcome>,
    artifact_tx: Option<oneshot::Sender<Result<RecordingArtifact, GraphError>>>,
) {
    let started = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));
    let recorder = Arc::new(Mutex::new(None));

    let stream = match init_tone(
        freq,
        duration,
        record_dir.as_deref(),
        &config,
        &analyser,
        &started,
        &finished,
        &recorder,
    ) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let _ = ready_tx.send(Ok(()));

    let outcome = run_graph_loop(&command_rx, &started, &finished);

    // Drop the stream before finalizing so the callback cannot race the
    // recorder hand-off.
    drop(stream);
    log::info!("tone playback {:?} ({} Hz)", outcome, freq);

    let _ = ended_tx.send(outcome);

    if let Some(tx) = artifact_tx {
        if outcome == super::PlaybackOutcome::Finished {
            let result = match recorder.lock().take() {
                Some(recorder) => recorder.finish(),
                None => Err(GraphError::Record("recorder was never created".into())),
            };
            let _ = tx.send(result);
        }
        // On Stopped the sender drops and the caller observes no artifact.
    }
}

#[allow(clippy::too_many_arguments)]
fn init_tone(
    freq: f32,
    duration: f32,
    record_dir: Option<&Path>,
    config: &AudioConfig,
    analyser: &Arc<Mutex<Analyser>>,
    started: &Arc<AtomicBool>,
    finished: &Arc<AtomicBool>,
    recorder: &Arc<Mutex<Option<Recorder>>>,
) -> Result<Stream, GraphError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(GraphError::NoOutputDevice)?;
    let device_config = device
        .default_output_config()
        .map_err(|e| GraphError::Config(e.to_string()))?;

    let sample_rate = device_config.sample_rate().0;
    let channels = device_config.channels() as usize;
    log::info!(
        "tone playback: {} Hz tone for {}s at {} Hz, {} channels",
        freq,
        duration,
        sample_rate,
        channels
    );

    // Re-key the shared analyser to the actual device rate.
    *analyser.lock() = Analyser::new(config, sample_rate);

    if let Some(dir) = record_dir {
        *recorder.lock() = Some(Recorder::create(dir, freq, duration, sample_rate)?);
    }

    let generator = ToneGenerator::new(freq, duration, sample_rate as f32);

    let stream = match device_config.sample_format() {
        SampleFormat::F32 => build_output::<f32>(
            &device,
            &device_config.into(),
            generator,
            channels,
            started.clone(),
            finished.clone(),
            analyser.clone(),
            recorder.clone(),
        ),
        SampleFormat::I16 => build_output::<i16>(
            &device,
            &device_config.into(),
            generator,
            channels,
            started.clone(),
            finished.clone(),
            analyser.clone(),
            recorder.clone(),
        ),
        SampleFormat::U16 => build_output::<u16>(
            &device,
            &device_config.into(),
            generator,
            channels,
            started.clone(),
            finished.clone(),
            analyser.clone(),
            recorder.clone(),
        ),
        other => return Err(GraphError::UnsupportedFormat(format!("{other:?}"))),
    }
    .map_err(|e| GraphError::Stream(e.to_string()))?;

    // The stream runs from the start; until Play arrives the callback emits
    // silence, so start() errors surface at build time.
    stream.play().map_err(|e| GraphError::Play(e.to_string()))?;

    Ok(stream)
}

#[allow(clippy::too_many_arguments)]
fn build_output<T>(
    device: &Device,
    stream_config: &StreamConfig,
    mut generator: ToneGenerator,
    channels: usize,
    started: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    analyser: Arc<Mutex<Analyser>>,
    recorder: Arc<Mutex<Option<Recorder>>>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = channels.max(1);
    device.build_output_stream(
        stream_config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels;
            let mut mono = Vec::with_capacity(frames);
            let playing = started.load(Ordering::Acquire);
            let mut tap = recorder.lock();

            for frame in 0..frames {
                let mut generated = None;
                if playing {
                    match generator.next_sample() {
                        Some(s) => generated = Some(s),
                        None => finished.store(true, Ordering::Release),
                    }
                }

                let sample = generated.unwrap_or(0.0);
                let value = T::from_sample(sample);
                for ch in 0..channels {
                    data[frame * channels + ch] = value;
                }
                mono.push(sample);

                // Record exactly the generated samples, not trailing silence.
                if let (Some(s), Some(recorder)) = (generated, tap.as_mut()) {
                    recorder.write(s);
                }
            }

            drop(tap);
            analyser.lock().push_samples(&mono);
        },
        |err| {
            log::error!("tone stream error: {}", err);
        },
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_emits_exactly_the_configured_duration() {
        let mut generator = ToneGenerator::new(440.0, 0.01, 48_000.0);

        let mut count = 0;
        while generator.next_sample().is_some() {
            count += 1;
        }

        assert_eq!(count, 480);
        assert!(generator.is_finished());
        // Completion is terminal.
        assert!(generator.next_sample().is_none());
    }

    #[test]
    fn generator_starts_at_zero_and_stays_amplitude_limited() {
        let mut generator = ToneGenerator::new(1000.0, 0.005, 44_100.0);

        let first = generator.next_sample().unwrap();
        assert!(first.abs() < 1e-6);

        while let Some(sample) = generator.next_sample() {
            assert!(sample.abs() <= TONE_AMPLITUDE + 1e-6);
        }
    }

    #[test]
    fn generator_with_zero_duration_is_immediately_finished() {
        let mut generator = ToneGenerator::new(440.0, 0.0, 44_100.0);
        assert!(generator.is_finished());
        assert!(generator.next_sample().is_none());
    }

    #[test]
    fn recorder_writes_named_wav_artifact() {
        let dir = std::env::temp_dir().join(format!("wavescope-rec-{}", std::process::id()));
        let mut recorder = Recorder::create(&dir, 440.0, 3.0, 48_000).unwrap();

        let mut generator = ToneGenerator::new(440.0, 0.002, 48_000.0);
        let mut written = 0;
        while let Some(sample) = generator.next_sample() {
            recorder.write(sample);
            written += 1;
        }

        let artifact = recorder.finish().unwrap();
        assert_eq!(
            artifact.path.file_name().unwrap().to_str().unwrap(),
            "440-3-sinwave.wav"
        );

        let reader = hound::WavReader::open(&artifact.path).unwrap();
        assert_eq!(reader.spec().sample_rate, 48_000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len() as usize, written);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
