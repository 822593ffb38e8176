//! The drawing surface that particles are rendered onto.

use crate::colour::Colour;

/// A 2D raster drawing surface.
pub trait Canvas {
    /// Resize the canvas. Existing contents are discarded.
    fn set_size(&mut self, width: u32, height: u32);

    /// Current width and height in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Paint an opaque rectangle. Anything outside the canvas is ignored.
    fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, colour: Colour);

    /// Make a rectangle fully transparent.
    fn clear_rect(&mut self, x: u32, y: u32, width: u32, height: u32);

    /// Blend a filled disc onto the canvas.
    fn draw_circle(&mut self, centre_x: f64, centre_y: f64, radius: f64, colour: Colour);

    /// Raw, row-major, RGBA bytes of a region of the canvas.
    fn pixel_data(&self, x: u32, y: u32, width: u32, height: u32) -> Vec<u8>;
}

/// A canvas held entirely in memory.
#[derive(Clone, Debug, Default)]
pub struct RasterCanvas {
    /// The pixels
    pixels: image::RgbaImage,
}

impl RasterCanvas {
    /// Instantiate
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: image::RgbaImage::new(width, height),
        }
    }

    /// The underlying image.
    #[must_use]
    pub const fn image(&self) -> &image::RgbaImage {
        &self.pixels
    }

    /// The colour of a single pixel, if it's on the canvas.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Colour> {
        self.pixels
            .get_pixel_checked(x, y)
            .map(|pixel| Colour::from_rgba8(pixel.0))
    }

    /// Clip a rectangle to the canvas, returning the exclusive end coordinates.
    fn clip(&self, x: u32, y: u32, width: u32, height: u32) -> (u32, u32) {
        let x_end = x.saturating_add(width).min(self.pixels.width());
        let y_end = y.saturating_add(height).min(self.pixels.height());
        (x_end, y_end)
    }

    /// The range of whole pixels that could be touched by a span around a centre.
    #[expect(
        clippy::as_conversions,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Values are clamped to the canvas before casting"
    )]
    fn pixel_span(centre: f64, radius: f64, length: u32) -> Option<std::ops::Range<u32>> {
        let start = (centre - radius).floor().max(0.0);
        let end = (centre + radius).floor().min(f64::from(length) - 1.0);
        if !start.is_finite() || !end.is_finite() || end < start {
            return None;
        }
        Some(start as u32..end as u32 + 1)
    }
}

impl Canvas for RasterCanvas {
    fn set_size(&mut self, width: u32, height: u32) {
        self.pixels = image::RgbaImage::new(width, height);
    }

    fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, colour: Colour) {
        let (x_end, y_end) = self.clip(x, y, width, height);
        let rgba = colour.to_rgba8();
        for row in y..y_end {
            for column in x..x_end {
                self.pixels.put_pixel(column, row, rgba);
            }
        }
    }

    fn clear_rect(&mut self, x: u32, y: u32, width: u32, height: u32) {
        let (x_end, y_end) = self.clip(x, y, width, height);
        for row in y..y_end {
            for column in x..x_end {
                self.pixels.put_pixel(column, row, image::Rgba([0, 0, 0, 0]));
            }
        }
    }

    /// Covers every pixel whose centre is inside the circle. The pixel that contains the
    /// circle's centre is always covered, so that even tiny particles are visible.
    fn draw_circle(&mut self, centre_x: f64, centre_y: f64, radius: f64, colour: Colour) {
        use image::Pixel as _;

        let (width, height) = self.pixels.dimensions();
        let Some(columns) = Self::pixel_span(centre_x, radius, width) else {
            return;
        };
        let Some(rows) = Self::pixel_span(centre_y, radius, height) else {
            return;
        };

        let rgba = colour.to_rgba8();
        let radius_squared = radius * radius;
        for row in rows {
            for column in columns.clone() {
                let delta_x = f64::from(column) + 0.5 - centre_x;
                let delta_y = f64::from(row) + 0.5 - centre_y;
                let is_inside = delta_x * delta_x + delta_y * delta_y <= radius_squared;
                let contains_centre = centre_x.floor() == f64::from(column)
                    && centre_y.floor() == f64::from(row);
                if is_inside || contains_centre {
                    self.pixels.get_pixel_mut(column, row).blend(&rgba);
                }
            }
        }
    }

    fn pixel_data(&self, x: u32, y: u32, width: u32, height: u32) -> Vec<u8> {
        let (x_end, y_end) = self.clip(x, y, width, height);
        let mut data = Vec::new();
        for row in y..y_end {
            for column in x..x_end {
                data.extend_from_slice(&self.pixels.get_pixel(column, row).0);
            }
        }
        data
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::colour::{Colour, BLACK, TRANSPARENT, WHITE};

    const RED: Colour = Colour::opaque(255, 0, 0);

    #[test]
    fn fill_and_clear() {
        let mut canvas = RasterCanvas::new(4, 4);
        canvas.fill_rect(0, 0, 4, 4, BLACK);
        assert_eq!(canvas.pixel(3, 3), Some(BLACK));

        canvas.clear_rect(1, 1, 10, 10);
        assert_eq!(canvas.pixel(0, 0), Some(BLACK));
        assert_eq!(canvas.pixel(3, 3), Some(TRANSPARENT));
    }

    #[test]
    fn circle_covers_a_disc() {
        let mut canvas = RasterCanvas::new(9, 9);
        canvas.draw_circle(4.5, 4.5, 2.0, WHITE);
        assert_eq!(canvas.pixel(4, 4), Some(WHITE));
        assert_eq!(canvas.pixel(6, 4), Some(WHITE));
        assert_eq!(canvas.pixel(7, 4), Some(TRANSPARENT));
        assert_eq!(canvas.pixel(6, 6), Some(TRANSPARENT));
    }

    #[test]
    fn tiny_circles_still_draw_one_pixel() {
        let mut canvas = RasterCanvas::new(3, 3);
        canvas.draw_circle(1.0, 2.0, 0.1, RED);
        assert_eq!(canvas.pixel(1, 2), Some(RED));
        assert_eq!(canvas.pixel(0, 2), Some(TRANSPARENT));
    }

    #[test]
    fn circles_off_the_canvas_are_clipped() {
        let mut canvas = RasterCanvas::new(3, 3);
        canvas.draw_circle(-50.0, -50.0, 3.0, RED);
        canvas.draw_circle(f64::NAN, 1.0, 3.0, RED);
        assert!(canvas.pixel_data(0, 0, 3, 3).iter().all(|byte| *byte == 0));

        canvas.draw_circle(-0.5, 1.5, 1.0, RED);
        assert_eq!(canvas.pixel(0, 1), Some(RED));
    }

    #[test]
    fn later_circles_are_on_top() {
        let mut canvas = RasterCanvas::new(3, 3);
        canvas.draw_circle(1.5, 1.5, 1.0, RED);
        canvas.draw_circle(1.5, 1.5, 1.0, WHITE);
        assert_eq!(canvas.pixel(1, 1), Some(WHITE));
    }

    #[test]
    fn translucent_circles_blend() {
        let mut canvas = RasterCanvas::new(1, 1);
        canvas.fill_rect(0, 0, 1, 1, BLACK);
        canvas.draw_circle(
            0.5,
            0.5,
            1.0,
            Colour {
                alpha: 0.5,
                ..WHITE
            },
        );
        let [red, green, blue, alpha] = canvas.image().get_pixel(0, 0).0;
        assert!((120..=135).contains(&red));
        assert_eq!(red, green);
        assert_eq!(green, blue);
        assert_eq!(alpha, 255);
    }

    #[test]
    fn pixel_data_is_row_major_rgba() {
        let mut canvas = RasterCanvas::new(2, 2);
        canvas.fill_rect(1, 0, 1, 1, RED);
        assert_eq!(
            canvas.pixel_data(0, 0, 2, 1),
            vec![0, 0, 0, 0, 255, 0, 0, 255]
        );
        assert_eq!(canvas.pixel_data(1, 1, 5, 5).len(), 4);
    }

    #[test]
    fn resizing_discards_contents() {
        let mut canvas = RasterCanvas::new(2, 2);
        canvas.fill_rect(0, 0, 2, 2, RED);
        canvas.set_size(3, 1);
        assert_eq!(canvas.dimensions(), (3, 1));
        assert_eq!(canvas.pixel(0, 0), Some(TRANSPARENT));
    }
}
