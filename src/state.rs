//! Application state and trigger handling

use crate::audio::{
    fft_size_for_frequency, AudioConfig, GraphError, PlaybackOutcome, Player, RecordingArtifact,
    SourceSpec,
};
use crate::render::{self, Canvas, RenderMode, Visualizer};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Trigger errors
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("another playback is already running")]
    Busy,

    #[error("no file selected")]
    NoFileSelected,

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Widget-equivalent state
pub struct AppState {
    /// Tone frequency in Hz
    pub freq: f32,

    /// Tone duration in seconds
    pub duration: f32,

    /// File chosen for playback
    pub selected_file: Option<PathBuf>,

    /// Directory recording artifacts land in
    pub output_dir: PathBuf,

    /// A playback trigger is running
    pub busy: bool,

    /// Most recent recording artifact
    pub last_recording: Option<RecordingArtifact>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            freq: 18_000.0,
            duration: 3.0,
            selected_file: None,
            output_dir: PathBuf::from("."),
            busy: false,
            last_recording: None,
        }
    }
}

/// Owns the trigger logic: builds the right source variant, binds a
/// visualizer to its analyser, and keeps the handles so a new trigger
/// supersedes the previous graph and render task.
///
/// Overlapping playback triggers are refused with [`ControlError::Busy`].
pub struct Controller {
    state: Arc<Mutex<AppState>>,
    config: AudioConfig,
    canvas: Arc<Mutex<Canvas>>,
    capture_canvas: Arc<Mutex<Canvas>>,
    visualizer: Mutex<Option<Visualizer>>,
    capture: Mutex<Option<(Player, Visualizer)>>,
}

impl Controller {
    pub fn new(width: usize, height: usize, config: AudioConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(AppState::default())),
            config,
            canvas: Arc::new(Mutex::new(Canvas::new(width, height))),
            capture_canvas: Arc::new(Mutex::new(Canvas::new(width, height))),
            visualizer: Mutex::new(None),
            capture: Mutex::new(None),
        }
    }

    pub fn state(&self) -> Arc<Mutex<AppState>> {
        self.state.clone()
    }

    /// Playback panel surface.
    pub fn canvas(&self) -> Arc<Mutex<Canvas>> {
        self.canvas.clone()
    }

    /// Live-capture panel surface.
    pub fn capture_canvas(&self) -> Arc<Mutex<Canvas>> {
        self.capture_canvas.clone()
    }

    /// Play a tone at the configured frequency and duration, optionally
    /// recording it, and wait for it to end.
    pub async fn play_tone(&self, record: bool) -> Result<PlaybackOutcome, ControlError> {
        let (freq, duration, output_dir) = {
            let mut state = self.state.lock();
            if state.busy {
                return Err(ControlError::Busy);
            }
            state.busy = true;
            (state.freq, state.duration, state.output_dir.clone())
        };
        // Lock dropped; clear busy on every exit path below.

        let result = self.run_tone(freq, duration, record, output_dir).await;
        self.state.lock().busy = false;
        result
    }

    async fn run_tone(
        &self,
        freq: f32,
        duration: f32,
        record: bool,
        output_dir: PathBuf,
    ) -> Result<PlaybackOutcome, ControlError> {
        let mut config = self.config.clone();
        config.fft_size = fft_size_for_frequency(freq);

        let spec = if record {
            SourceSpec::ToneRecorder {
                freq,
                duration,
                output_dir,
            }
        } else {
            SourceSpec::Tone { freq, duration }
        };

        let mut player = Player::build(spec, config).await?;
        self.replace_visualizer(render::spawn(
            player.analyser(),
            self.canvas.clone(),
            RenderMode::Waveform,
        ))
        .await;

        let artifact_rx = player.take_artifact();
        player.play()?;
        let outcome = player.ended().await;

        if let Some(rx) = artifact_rx {
            match rx.await {
                Ok(Ok(artifact)) => {
                    log::info!("recorded {}", artifact.path.display());
                    self.state.lock().last_recording = Some(artifact);
                }
                Ok(Err(e)) => log::warn!("recording failed: {}", e),
                Err(_) => log::warn!("recording abandoned before the tone finished"),
            }
        }

        Ok(outcome)
    }

    /// Play the selected file and wait for it to end.
    pub async fn play_file(&self) -> Result<PlaybackOutcome, ControlError> {
        let path = {
            let mut state = self.state.lock();
            if state.busy {
                return Err(ControlError::Busy);
            }
            let path = state
                .selected_file
                .clone()
                .ok_or(ControlError::NoFileSelected)?;
            state.busy = true;
            path
        };

        let result = self.run_file(path).await;
        self.state.lock().busy = false;
        result
    }

    async fn run_file(&self, path: PathBuf) -> Result<PlaybackOutcome, ControlError> {
        let mut player = Player::build(SourceSpec::File { path }, self.config.clone()).await?;
        self.replace_visualizer(render::spawn(
            player.analyser(),
            self.canvas.clone(),
            RenderMode::Waveform,
        ))
        .await;

        player.play()?;
        Ok(player.ended().await)
    }

    /// Start live capture on its own panel. Runs until [`stop_capture`] or a
    /// later capture supersedes it.
    ///
    /// [`stop_capture`]: Controller::stop_capture
    pub async fn start_capture(
        &self,
        device: Option<String>,
        mode: RenderMode,
    ) -> Result<(), ControlError> {
        self.stop_capture().await;

        let player = Player::build(SourceSpec::LiveCapture { device }, self.config.clone()).await?;
        let visualizer = render::spawn(player.analyser(), self.capture_canvas.clone(), mode);
        *self.capture.lock() = Some((player, visualizer));
        Ok(())
    }

    /// Tear down the live-capture graph and its render task.
    pub async fn stop_capture(&self) {
        let previous = self.capture.lock().take();
        if let Some((mut player, mut visualizer)) = previous {
            visualizer.stop().await;
            player.stop();
        }
    }

    /// Cancel every retained render task and graph.
    pub async fn shutdown(&self) {
        let previous = self.visualizer.lock().take();
        if let Some(mut visualizer) = previous {
            visualizer.stop().await;
        }
        self.stop_capture().await;
    }

    async fn replace_visualizer(&self, next: Visualizer) {
        let previous = self.visualizer.lock().replace(next);
        if let Some(mut visualizer) = previous {
            visualizer.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_matches_the_demo_defaults() {
        let state = AppState::default();

        assert_eq!(state.freq, 18_000.0);
        assert_eq!(state.duration, 3.0);
        assert!(state.selected_file.is_none());
        assert!(!state.busy);
        assert!(state.last_recording.is_none());
    }

    #[tokio::test]
    async fn busy_controller_refuses_playback_triggers() {
        let controller = Controller::new(64, 32, AudioConfig::default());
        controller.state().lock().busy = true;

        assert!(matches!(
            controller.play_tone(false).await,
            Err(ControlError::Busy)
        ));
        assert!(matches!(
            controller.play_file().await,
            Err(ControlError::Busy)
        ));
    }

    #[tokio::test]
    async fn file_trigger_without_selection_is_rejected() {
        let controller = Controller::new(64, 32, AudioConfig::default());

        let result = controller.play_file().await;
        assert!(matches!(result, Err(ControlError::NoFileSelected)));
        // The rejection must not leave the controller busy.
        assert!(!controller.state().lock().busy);
    }

    #[tokio::test]
    async fn stop_capture_without_capture_is_a_no_op() {
        let controller = Controller::new(64, 32, AudioConfig::default());
        controller.stop_capture().await;
        controller.shutdown().await;
    }
}
