//! Canvas rendering of analyser snapshots

mod canvas;
mod draw;
mod task;

pub use canvas::{Canvas, Rgb};
pub use draw::{bar_color, draw_bars, draw_waveform, BACKGROUND, BAR_GAP, WAVEFORM_STROKE};
pub use task::{spawn, RenderMode, Visualizer};
