//! Cancellable render task reading analyser snapshots

use super::canvas::Canvas;
use super::draw;
use crate::audio::Analyser;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Which analyser snapshot a visualizer paints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Time-domain polyline
    Waveform,

    /// Frequency-domain bar chart
    FrequencyBars,
}

/// Frame period, roughly one display refresh.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Handle to one running render task.
///
/// The owner must keep it to cancel the task when the visualization is
/// superseded or torn down; dropping the handle aborts the task outright.
pub struct Visualizer {
    shutdown_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

/// Start a render task bound to one analyser/canvas pair.
///
/// Independently spawned visualizers coexist; each owns its pair.
pub fn spawn(
    analyser: Arc<Mutex<Analyser>>,
    canvas: Arc<Mutex<Canvas>>,
    mode: RenderMode,
) -> Visualizer {
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let task = tokio::spawn(run_render(analyser, canvas, mode, shutdown_rx));
    Visualizer {
        shutdown_tx,
        task: Some(task),
    }
}

async fn run_render(
    analyser: Arc<Mutex<Analyser>>,
    canvas: Arc<Mutex<Canvas>>,
    mode: RenderMode,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let mut interval = tokio::time::interval(FRAME_INTERVAL);
    log::debug!("render task started ({:?})", mode);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                // Read one snapshot, then paint it; neither lock is held
                // across the other for longer than the copy.
                let frame = {
                    let mut analyser = analyser.lock();
                    match mode {
                        RenderMode::Waveform => analyser.time_domain_bytes(),
                        RenderMode::FrequencyBars => analyser.frequency_bytes(),
                    }
                };

                let mut target = canvas.lock();
                match mode {
                    RenderMode::Waveform => draw::draw_waveform(&mut target, &frame),
                    RenderMode::FrequencyBars => draw::draw_bars(&mut target, &frame),
                }
            }
        }
    }

    log::debug!("render task stopped");
}

impl Visualizer {
    /// Cancel the task and wait for it to exit.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }
}

impl Drop for Visualizer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioConfig;

    fn test_analyser() -> Arc<Mutex<Analyser>> {
        Arc::new(Mutex::new(Analyser::new(&AudioConfig::default(), 44_100)))
    }

    #[tokio::test]
    async fn visualizer_paints_and_stops_on_cancel() {
        let canvas = Arc::new(Mutex::new(Canvas::new(64, 32)));
        let mut vis = spawn(test_analyser(), canvas.clone(), RenderMode::Waveform);

        tokio::time::sleep(Duration::from_millis(80)).await;
        vis.stop().await;
        assert!(vis.is_finished());

        // A silent analyser still repaints the background every tick.
        assert_eq!(canvas.lock().pixel(0, 0), draw::BACKGROUND);
    }

    #[tokio::test]
    async fn independent_visualizers_own_their_canvases() {
        let wave_canvas = Arc::new(Mutex::new(Canvas::new(32, 16)));
        let bars_canvas = Arc::new(Mutex::new(Canvas::new(32, 16)));

        let mut wave = spawn(test_analyser(), wave_canvas.clone(), RenderMode::Waveform);
        let mut bars = spawn(test_analyser(), bars_canvas.clone(), RenderMode::FrequencyBars);

        tokio::time::sleep(Duration::from_millis(80)).await;
        wave.stop().await;
        bars.stop().await;

        assert_eq!(wave_canvas.lock().pixel(0, 0), draw::BACKGROUND);
        // A silent spectrum paints background only.
        assert_eq!(bars_canvas.lock().pixel(0, 15), draw::BACKGROUND);
    }

    #[tokio::test]
    async fn dropping_the_handle_aborts_the_task() {
        let canvas = Arc::new(Mutex::new(Canvas::new(8, 8)));
        let vis = spawn(test_analyser(), canvas, RenderMode::Waveform);
        let handle = vis.shutdown_tx.clone();
        drop(vis);

        tokio::time::sleep(Duration::from_millis(50)).await;
        // The receiver is gone once the task is dead.
        assert!(handle.is_closed());
    }
}
