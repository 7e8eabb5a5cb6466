//! Frame buffer and pixel primitives.
//!
//! Pixels are stored row-major as RGB triples, `width * height * 3` bytes in
//! total. Every write is bounds-checked and silently dropped when it falls
//! outside the buffer, so the drawing routines can be handed any coordinates.

use crate::gpu::GpuError;
use serde::{Serialize, Deserialize};

/// An RGB color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for (u8, u8, u8) {
    fn from(c: Rgb) -> Self {
        (c.r, c.g, c.b)
    }
}

/// The GPU's video memory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    /// Create a black frame buffer.
    pub fn new(width: usize, height: usize) -> Result<Self, GpuError> {
        let len = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(3))
            .filter(|&n| n > 0)
            .ok_or(GpuError::InvalidDimensions { width, height })?;

        Ok(Self {
            width,
            height,
            pixels: vec![0; len],
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw row-major RGB bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some((y as usize * self.width + x as usize) * 3)
    }

    /// Write one pixel. Returns whether the pixel was inside the buffer.
    pub fn write_pixel(&mut self, x: i64, y: i64, color: Rgb) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.pixels[i..i + 3].copy_from_slice(&[color.r, color.g, color.b]);
                true
            }
            None => false,
        }
    }

    /// Read one pixel. Out-of-range coordinates read as black.
    pub fn read_pixel(&self, x: i64, y: i64) -> Rgb {
        match self.index(x, y) {
            Some(i) => Rgb::new(self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]),
            None => Rgb::BLACK,
        }
    }

    /// Zero every byte.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Paint every pixel with one color.
    pub fn fill(&mut self, color: Rgb) {
        for px in self.pixels.chunks_exact_mut(3) {
            px.copy_from_slice(&[color.r, color.g, color.b]);
        }
    }

    /// Filled rectangle with its top-left corner at `(x, y)`.
    pub fn fill_rect(&mut self, x: i64, y: i64, width: usize, height: usize, color: Rgb) {
        for dy in 0..height as i64 {
            for dx in 0..width as i64 {
                self.write_pixel(x + dx, y + dy, color);
            }
        }
    }

    /// Bresenham line from `(x0, y0)` to `(x1, y1)`, both endpoints included.
    pub fn draw_line(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb) {
        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let (mut x, mut y) = (x0, y0);

        // Error terms are doubled to stay in integers.
        if dx > dy {
            let mut err = dx;
            while x != x1 {
                self.write_pixel(x, y, color);
                err -= 2 * dy;
                if err < 0 {
                    y += sy;
                    err += 2 * dx;
                }
                x += sx;
            }
        } else {
            let mut err = dy;
            while y != y1 {
                self.write_pixel(x, y, color);
                err -= 2 * dx;
                if err < 0 {
                    x += sx;
                    err += 2 * dy;
                }
                y += sy;
            }
        }

        self.write_pixel(x, y, color);
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.pixels.chunks_exact(3).filter(|px| px.iter().any(|&c| c != 0)).count();

        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("lit_pixels", &lit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(fb: &FrameBuffer) -> Vec<(i64, i64)> {
        let mut out = Vec::new();
        for y in 0..fb.height() as i64 {
            for x in 0..fb.width() as i64 {
                if fb.read_pixel(x, y) != Rgb::BLACK {
                    out.push((x, y));
                }
            }
        }
        out
    }

    #[test]
    fn test_new_rejects_empty() {
        assert!(FrameBuffer::new(0, 10).is_err());
        assert!(FrameBuffer::new(10, 0).is_err());
        assert_eq!(FrameBuffer::new(4, 3).unwrap().as_bytes().len(), 36);
    }

    #[test]
    fn test_pixel_layout_is_row_major() {
        let mut fb = FrameBuffer::new(4, 3).unwrap();
        assert!(fb.write_pixel(1, 2, Rgb::new(1, 2, 3)));
        let i = (2 * 4 + 1) * 3;
        assert_eq!(&fb.as_bytes()[i..i + 3], &[1, 2, 3]);
        assert_eq!(fb.read_pixel(1, 2), Rgb::new(1, 2, 3));
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut fb = FrameBuffer::new(4, 3).unwrap();
        assert!(!fb.write_pixel(4, 0, Rgb::WHITE));
        assert!(!fb.write_pixel(-1, 0, Rgb::WHITE));
        assert!(!fb.write_pixel(0, 3, Rgb::WHITE));
        assert_eq!(fb.read_pixel(100, 100), Rgb::BLACK);
        assert!(fb.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fill_and_clear() {
        let mut fb = FrameBuffer::new(2, 2).unwrap();
        fb.fill(Rgb::new(9, 8, 7));
        assert_eq!(fb.as_bytes(), &[9, 8, 7, 9, 8, 7, 9, 8, 7, 9, 8, 7]);
        fb.clear();
        assert!(fb.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut fb = FrameBuffer::new(5, 5).unwrap();
        fb.fill_rect(3, 3, 4, 4, Rgb::WHITE);
        assert_eq!(lit(&fb), vec![(3, 3), (4, 3), (3, 4), (4, 4)]);
    }

    #[test]
    fn test_line_horizontal_and_diagonal() {
        let mut fb = FrameBuffer::new(5, 5).unwrap();
        fb.draw_line(0, 0, 3, 0, Rgb::WHITE);
        assert_eq!(lit(&fb), vec![(0, 0), (1, 0), (2, 0), (3, 0)]);

        fb.clear();
        fb.draw_line(4, 4, 0, 0, Rgb::WHITE);
        assert_eq!(lit(&fb), vec![(0, 0), (1, 1), (2, 2), (3, 3), (4, 4)]);
    }

    #[test]
    fn test_line_shallow_slope() {
        let mut fb = FrameBuffer::new(5, 3).unwrap();
        fb.draw_line(0, 0, 4, 2, Rgb::WHITE);
        assert_eq!(lit(&fb), vec![(0, 0), (1, 0), (2, 1), (3, 1), (4, 2)]);
    }

    #[test]
    fn test_line_single_point() {
        let mut fb = FrameBuffer::new(3, 3).unwrap();
        fb.draw_line(1, 1, 1, 1, Rgb::WHITE);
        assert_eq!(lit(&fb), vec![(1, 1)]);
    }
}
