//! Snapshot painters: time-domain polyline and frequency bars

use super::canvas::{Canvas, Rgb};

pub const BACKGROUND: Rgb = [200, 200, 200];
pub const WAVEFORM_STROKE: Rgb = [0, 0, 0];

/// Gap between adjacent frequency bars, in pixels.
pub const BAR_GAP: usize = 1;

/// Bar color as a function of the bin magnitude byte: the blue channel
/// tracks the magnitude and saturates at 255.
pub fn bar_color(magnitude: u8) -> Rgb {
    [50, 50, magnitude]
}

/// Paint a time-domain snapshot as a connected polyline.
///
/// Byte value v maps to `y = v * height / 256`, so a silence-centered
/// snapshot (all 128) draws a flat line at half height. The x position
/// advances by `width / len` per sample and the trace closes to the vertical
/// midline at the right edge.
pub fn draw_waveform(canvas: &mut Canvas, samples: &[u8]) {
    canvas.fill(BACKGROUND);
    if samples.is_empty() {
        return;
    }

    let width = canvas.width() as f32;
    let height = canvas.height() as f32;
    let slice_width = width / samples.len() as f32;

    let mut x = 0.0f32;
    let mut prev: Option<(i32, i32)> = None;
    for &v in samples {
        let point = (x as i32, (v as f32 * height / 256.0) as i32);
        if let Some((px, py)) = prev {
            canvas.draw_line(px, py, point.0, point.1, WAVEFORM_STROKE);
        }
        prev = Some(point);
        x += slice_width;
    }

    if let Some((px, py)) = prev {
        canvas.draw_line(
            px,
            py,
            width as i32 - 1,
            (height / 2.0) as i32,
            WAVEFORM_STROKE,
        );
    }
}

/// Paint a frequency-domain snapshot as adjacent vertical bars.
///
/// One bar per bin with a fixed [`BAR_GAP`]; a magnitude of 255 reaches
/// exactly half the surface height, and zero-magnitude bins draw nothing.
pub fn draw_bars(canvas: &mut Canvas, bins: &[u8]) {
    canvas.fill(BACKGROUND);
    if bins.is_empty() {
        return;
    }

    let width = canvas.width();
    let height = canvas.height();
    let stride = (width / bins.len()).max(1);
    let bar_width = if stride > BAR_GAP { stride - BAR_GAP } else { stride };

    for (i, &v) in bins.iter().enumerate() {
        let x = i * stride;
        if x >= width {
            break;
        }
        let bar_height = v as usize * (height / 2) / 255;
        if bar_height == 0 {
            continue;
        }
        canvas.fill_rect(x, height - bar_height, bar_width, bar_height, bar_color(v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_all_background(canvas: &Canvas) {
        for y in 0..canvas.height() {
            for x in 0..canvas.width() {
                assert_eq!(canvas.pixel(x, y), BACKGROUND, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn silence_waveform_is_a_flat_midline() {
        let mut canvas = Canvas::new(64, 100);
        draw_waveform(&mut canvas, &[128u8; 256]);

        for x in 0..64 {
            assert_eq!(canvas.pixel(x, 50), WAVEFORM_STROKE, "column {x}");
        }
        for y in 0..100 {
            if y == 50 {
                continue;
            }
            for x in 0..64 {
                assert_eq!(canvas.pixel(x, y), BACKGROUND, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn empty_waveform_only_clears_the_surface() {
        let mut canvas = Canvas::new(16, 8);
        draw_waveform(&mut canvas, &[]);
        assert_all_background(&canvas);
    }

    #[test]
    fn zero_spectrum_draws_no_bars() {
        let mut canvas = Canvas::new(64, 100);
        draw_bars(&mut canvas, &[0u8; 16]);
        assert_all_background(&canvas);
    }

    #[test]
    fn saturated_spectrum_reaches_half_height_with_max_blue() {
        let mut canvas = Canvas::new(64, 100);
        draw_bars(&mut canvas, &[255u8; 16]);

        // stride 4, bar width 3: first bar covers columns 0..3.
        for y in 50..100 {
            assert_eq!(canvas.pixel(0, y), [50, 50, 255], "row {y}");
        }
        // Exactly half height: the row above the bar top is untouched.
        assert_eq!(canvas.pixel(0, 49), BACKGROUND);
        // The gap column stays clear.
        assert_eq!(canvas.pixel(3, 99), BACKGROUND);
    }

    #[test]
    fn bar_height_scales_with_magnitude() {
        let mut canvas = Canvas::new(8, 100);
        draw_bars(&mut canvas, &[51u8]);

        // 51/255 of half height = 10 rows.
        assert_eq!(canvas.pixel(0, 90), bar_color(51));
        assert_eq!(canvas.pixel(0, 89), BACKGROUND);
    }

    #[test]
    fn bar_color_blue_channel_tracks_magnitude() {
        assert_eq!(bar_color(0), [50, 50, 0]);
        assert_eq!(bar_color(128), [50, 50, 128]);
        assert_eq!(bar_color(255), [50, 50, 255]);
    }
}
