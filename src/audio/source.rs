//! Audio source variants behind a uniform build/play/analyse contract

use super::{capture, file, tone, Analyser, AudioConfig};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

/// How long `Player::build` waits for the audio thread to report readiness
/// before giving up on the backend.
const BUILD_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll period of the audio-thread command loop.
pub(super) const COMMAND_POLL: Duration = Duration::from_millis(10);

/// Audio graph errors
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("no audio output device available")]
    NoOutputDevice,

    #[error("no audio input device available")]
    NoInputDevice,

    #[error("audio device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to query device config: {0}")]
    Config(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to build audio stream: {0}")]
    Stream(String),

    #[error("failed to start audio stream: {0}")]
    Play(String),

    #[error("failed to decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("failed to write recording: {0}")]
    Record(String),

    #[error("audio thread error: {0}")]
    Thread(String),

    #[error("audio backend did not become ready within {}s", BUILD_TIMEOUT.as_secs())]
    BuildTimeout,

    #[error("audio graph was torn down before it became ready")]
    BuildAborted,
}

/// The closed set of source variants.
#[derive(Debug, Clone)]
pub enum SourceSpec {
    /// Sine tone on the default output device, stopping after `duration`
    /// seconds.
    Tone { freq: f32, duration: f32 },

    /// Same tone, with every generated sample also written to a WAV artifact
    /// in `output_dir`.
    ToneRecorder {
        freq: f32,
        duration: f32,
        output_dir: PathBuf,
    },

    /// Decoded WAV file played on the default output device.
    File { path: PathBuf },

    /// Live input-device capture feeding the analyser only.
    LiveCapture { device: Option<String> },
}

/// How a playback run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The source ran to its natural end.
    Finished,

    /// The graph was stopped or superseded first.
    Stopped,
}

/// Recorded WAV file produced by the tone+recorder variant.
#[derive(Debug, Clone)]
pub struct RecordingArtifact {
    pub path: PathBuf,
}

/// Commands sent to an audio graph thread
pub(super) enum GraphCommand {
    Play,
    Stop,
}

/// Everything a variant builder hands back to [`Player::build`].
pub(super) struct GraphParts {
    pub analyser: Arc<Mutex<Analyser>>,
    pub command_tx: mpsc::Sender<GraphCommand>,
    pub thread: JoinHandle<()>,
    pub ready_rx: oneshot::Receiver<Result<(), GraphError>>,
    pub ended_rx: oneshot::Receiver<PlaybackOutcome>,
    pub artifact_rx: Option<oneshot::Receiver<Result<RecordingArtifact, GraphError>>>,
}

/// Command loop shared by the graph threads: reacts to `Play`/`Stop` and
/// watches the stream callback's finished flag.
pub(super) fn run_graph_loop(
    command_rx: &mpsc::Receiver<GraphCommand>,
    started: &AtomicBool,
    finished: &AtomicBool,
) -> PlaybackOutcome {
    loop {
        match command_rx.try_recv() {
            Ok(GraphCommand::Play) => started.store(true, Ordering::Release),
            Ok(GraphCommand::Stop) | Err(TryRecvError::Disconnected) => {
                return PlaybackOutcome::Stopped;
            }
            Err(TryRecvError::Empty) => {}
        }

        if finished.load(Ordering::Acquire) {
            return PlaybackOutcome::Finished;
        }

        std::thread::sleep(COMMAND_POLL);
    }
}

/// A built audio graph (Send + Sync safe).
///
/// The platform stream is owned by a dedicated thread; this handle carries
/// the command channel, the shared analyser, and the completion futures. A
/// `Player` only exists once its graph is ready, so `play()` before the
/// graph is built is unrepresentable. Dropping the player stops the thread.
pub struct Player {
    analyser: Arc<Mutex<Analyser>>,
    command_tx: mpsc::Sender<GraphCommand>,
    thread: Option<JoinHandle<()>>,
    ended_rx: Option<oneshot::Receiver<PlaybackOutcome>>,
    artifact_rx: Option<oneshot::Receiver<Result<RecordingArtifact, GraphError>>>,
}

impl Player {
    /// Build the graph for `spec` and wait until it is ready for playback.
    ///
    /// Device acquisition and file decoding happen off the calling task;
    /// readiness is awaited with a timeout so an unresponsive backend
    /// surfaces as [`GraphError::BuildTimeout`] instead of hanging.
    pub async fn build(spec: SourceSpec, config: AudioConfig) -> Result<Self, GraphError> {
        config.validate().map_err(GraphError::Config)?;

        let parts = match spec {
            SourceSpec::Tone { freq, duration } => tone::spawn(freq, duration, None, &config)?,
            SourceSpec::ToneRecorder {
                freq,
                duration,
                output_dir,
            } => tone::spawn(freq, duration, Some(output_dir), &config)?,
            SourceSpec::File { path } => file::spawn(path, &config).await?,
            SourceSpec::LiveCapture { device } => capture::spawn(device, &config)?,
        };

        let GraphParts {
            analyser,
            command_tx,
            thread,
            ready_rx,
            ended_rx,
            artifact_rx,
        } = parts;

        match tokio::time::timeout(BUILD_TIMEOUT, ready_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => {
                // The thread reported the failure and is exiting.
                let _ = thread.join();
                return Err(e);
            }
            Ok(Err(_)) => {
                let _ = thread.join();
                return Err(GraphError::BuildAborted);
            }
            Err(_) => {
                // Ask the thread to wind down but do not wait on a backend
                // that already failed to answer once.
                let _ = command_tx.send(GraphCommand::Stop);
                return Err(GraphError::BuildTimeout);
            }
        }

        Ok(Self {
            analyser,
            command_tx,
            thread: Some(thread),
            ended_rx: Some(ended_rx),
            artifact_rx,
        })
    }

    /// Start the built graph. Tone variants begin their sample-counted run;
    /// live capture is already flowing and treats this as a no-op.
    pub fn play(&self) -> Result<(), GraphError> {
        self.command_tx
            .send(GraphCommand::Play)
            .map_err(|_| GraphError::Thread("audio thread exited before play".into()))
    }

    /// Shared analysis node, for binding a renderer.
    pub fn analyser(&self) -> Arc<Mutex<Analyser>> {
        self.analyser.clone()
    }

    /// Resolves once, when playback completes or the graph is torn down.
    pub async fn ended(&mut self) -> PlaybackOutcome {
        match self.ended_rx.take() {
            Some(rx) => rx.await.unwrap_or(PlaybackOutcome::Stopped),
            None => PlaybackOutcome::Stopped,
        }
    }

    /// Recording variant only: future resolving to the recorded artifact.
    /// Resolves after `ended`.
    pub fn take_artifact(
        &mut self,
    ) -> Option<oneshot::Receiver<Result<RecordingArtifact, GraphError>>> {
        self.artifact_rx.take()
    }

    /// Stop the graph and join its thread.
    pub fn stop(&mut self) {
        let _ = self.command_tx.send(GraphCommand::Stop);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
    }
}

fn format_trigger_value(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// File name of a recorded tone artifact: `{frequency}-{duration}-sinwave.wav`.
pub fn artifact_file_name(freq: f32, duration: f32) -> String {
    format!(
        "{}-{}-sinwave.wav",
        format_trigger_value(freq),
        format_trigger_value(duration)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_name_uses_integer_forms_when_whole() {
        assert_eq!(artifact_file_name(440.0, 3.0), "440-3-sinwave.wav");
        assert_eq!(artifact_file_name(18_000.0, 3.0), "18000-3-sinwave.wav");
    }

    #[test]
    fn artifact_name_keeps_fractional_values() {
        assert_eq!(artifact_file_name(18_000.0, 2.5), "18000-2.5-sinwave.wav");
    }

    #[test]
    fn graph_loop_stops_on_command() {
        let (tx, rx) = mpsc::channel();
        let started = AtomicBool::new(false);
        let finished = AtomicBool::new(false);

        tx.send(GraphCommand::Play).unwrap();
        tx.send(GraphCommand::Stop).unwrap();

        let outcome = run_graph_loop(&rx, &started, &finished);
        assert_eq!(outcome, PlaybackOutcome::Stopped);
        assert!(started.load(Ordering::Acquire));
    }

    #[test]
    fn graph_loop_reports_natural_finish() {
        let (_tx, rx) = mpsc::channel();
        let started = AtomicBool::new(false);
        let finished = AtomicBool::new(true);

        let outcome = run_graph_loop(&rx, &started, &finished);
        assert_eq!(outcome, PlaybackOutcome::Finished);
    }

    #[test]
    fn graph_loop_treats_disconnect_as_stop() {
        let (tx, rx) = mpsc::channel::<GraphCommand>();
        drop(tx);
        let started = AtomicBool::new(false);
        let finished = AtomicBool::new(false);

        let outcome = run_graph_loop(&rx, &started, &finished);
        assert_eq!(outcome, PlaybackOutcome::Stopped);
    }
}
