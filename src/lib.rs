//! Tone playback, recording, and live-capture audio visualization.
//!
//! Small audio graphs (tone generator, tone + recorder, WAV file playback,
//! live microphone capture) feed a shared analyser; cancellable render
//! tasks paint analyser snapshots onto pixel canvases as a waveform
//! polyline or a frequency bar chart.

pub mod audio;
pub mod render;
pub mod state;

pub use audio::{AudioConfig, PlaybackOutcome, Player, SourceSpec};
pub use render::{Canvas, RenderMode, Visualizer};
pub use state::{AppState, ControlError, Controller};
