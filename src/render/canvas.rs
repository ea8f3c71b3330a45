//! RGB framebuffer render target

use std::path::Path;

pub type Rgb = [u8; 3];

/// Fixed-size RGB8 pixel surface. Drawing is clipped to the bounds; the
/// origin is the top-left corner.
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height * 3],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn fill(&mut self, color: Rgb) {
        for pixel in self.pixels.chunks_exact_mut(3) {
            pixel.copy_from_slice(&color);
        }
    }

    /// Set one pixel; coordinates outside the surface are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgb) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let offset = (y as usize * self.width + x as usize) * 3;
        self.pixels[offset..offset + 3].copy_from_slice(&color);
    }

    pub fn pixel(&self, x: usize, y: usize) -> Rgb {
        let offset = (y * self.width + x) * 3;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ]
    }

    /// Filled axis-aligned rectangle, clipped to the surface.
    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: Rgb) {
        let x_end = (x + w).min(self.width);
        let y_end = (y + h).min(self.height);
        for row in y.min(self.height)..y_end {
            for col in x.min(self.width)..x_end {
                let offset = (row * self.width + col) * 3;
                self.pixels[offset..offset + 3].copy_from_slice(&color);
            }
        }
    }

    /// Bresenham line between two points, endpoints inclusive.
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb) {
        let (mut x, mut y) = (x0, y0);
        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.set_pixel(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Export the surface as a PNG file.
    pub fn save_png(&self, path: &Path) -> image::ImageResult<()> {
        let img = image::RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            image::Rgb(self.pixel(x as usize, y as usize))
        });
        img.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_canvas_is_black() {
        let canvas = Canvas::new(4, 3);
        assert_eq!(canvas.pixel(0, 0), [0, 0, 0]);
        assert_eq!(canvas.pixel(3, 2), [0, 0, 0]);
    }

    #[test]
    fn fill_covers_every_pixel() {
        let mut canvas = Canvas::new(3, 3);
        canvas.fill([10, 20, 30]);
        for y in 0..3 {
            for x in 0..3 {
                assert_eq!(canvas.pixel(x, y), [10, 20, 30]);
            }
        }
    }

    #[test]
    fn out_of_bounds_pixels_are_ignored() {
        let mut canvas = Canvas::new(2, 2);
        canvas.set_pixel(-1, 0, [255, 0, 0]);
        canvas.set_pixel(0, 5, [255, 0, 0]);
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(canvas.pixel(x, y), [0, 0, 0]);
            }
        }
    }

    #[test]
    fn horizontal_line_is_endpoint_inclusive() {
        let mut canvas = Canvas::new(5, 3);
        canvas.draw_line(0, 1, 4, 1, [255, 255, 255]);
        for x in 0..5 {
            assert_eq!(canvas.pixel(x, 1), [255, 255, 255]);
        }
        assert_eq!(canvas.pixel(2, 0), [0, 0, 0]);
    }

    #[test]
    fn diagonal_line_hits_both_endpoints() {
        let mut canvas = Canvas::new(4, 4);
        canvas.draw_line(0, 0, 3, 3, [9, 9, 9]);
        assert_eq!(canvas.pixel(0, 0), [9, 9, 9]);
        assert_eq!(canvas.pixel(3, 3), [9, 9, 9]);
    }

    #[test]
    fn fill_rect_clips_to_surface() {
        let mut canvas = Canvas::new(4, 4);
        canvas.fill_rect(2, 2, 10, 10, [1, 2, 3]);
        assert_eq!(canvas.pixel(3, 3), [1, 2, 3]);
        assert_eq!(canvas.pixel(1, 1), [0, 0, 0]);
    }
}
