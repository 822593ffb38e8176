//! Convert canvas pixels into terminal cells.
//!
//! Every terminal cell holds two vertically stacked "pixels" using the half block characters.
//! The upper pixel is rendered with the cell's foreground and the lower pixel with the cell's
//! background colour.

use snafu::ensure_whatever;
use termwiz::surface::Change as TermwizChange;
use termwiz::surface::Position as TermwizPosition;

use crate::{
    canvas::{Canvas as _, RasterCanvas},
    colour::{Colour, WHITE},
    errors::ParticleImageError,
};

/// A frame of terminal cells, ready to send to the user's terminal.
#[derive(Clone)]
pub(crate) struct Surface {
    /// The terminal's width
    pub width: usize,
    /// The terminal's height
    pub height: usize,
    /// A surface of terminal cells
    pub surface: termwiz::surface::Surface,
}

impl Surface {
    /// Create an empty frame
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            surface: termwiz::surface::Surface::new(width, height),
        }
    }

    /// Copy all the pixels of a canvas onto the frame. `offset` is the column and row of the
    /// canvas' top-left corner. Fully transparent pixels are left as the terminal's default
    /// colours and pixels outside the terminal are dropped.
    pub fn add_canvas(&mut self, canvas: &RasterCanvas, offset: (usize, usize)) {
        let (canvas_width, canvas_height) = canvas.dimensions();
        let (offset_col, offset_row) = offset;
        let visible_pixel = |x: u32, y: u32| {
            canvas
                .pixel(x, y)
                .filter(|colour| colour.alpha > f32::EPSILON)
        };

        for y in (0..canvas_height).step_by(2) {
            for x in 0..canvas_width {
                let upper = visible_pixel(x, y);
                let lower = visible_pixel(x, y + 1);
                if upper.is_none() && lower.is_none() {
                    continue;
                }

                let col = offset_col + usize::try_from(x).unwrap_or(usize::MAX);
                let row = offset_row + usize::try_from(y / 2).unwrap_or(usize::MAX);
                if let Err(error) = self.add_cell(col, row, upper, lower) {
                    tracing::trace!("Dropping canvas pixel: {error}");
                }
            }
        }
    }

    /// Add a pair of pixels ("▀", "▄") to a single cell.
    ///
    /// Pairs are rendered with the upper half block. The one exception is a cell with only a
    /// lower pixel: it's impossible to draw that with an upper half block *whilst retaining the
    /// ANSI-coded default background colour*, so the lower half block is used instead.
    pub fn add_cell(
        &mut self,
        col: usize,
        row: usize,
        upper: Option<Colour>,
        lower: Option<Colour>,
    ) -> Result<(), ParticleImageError> {
        ensure_whatever!(col < self.width, "Tried to add pixel to column: {col}");
        ensure_whatever!(row < self.height, "Tried to add pixel to row: {row}");

        let (character, foreground, background) = match (upper, lower) {
            (Some(top), Some(bottom)) => ("▀", top, Some(bottom)),
            (Some(top), None) => ("▀", top, None),
            (None, Some(bottom)) => ("▄", bottom, None),
            (None, None) => return Ok(()),
        };

        self.surface.add_changes(vec![
            TermwizChange::CursorPosition {
                x: TermwizPosition::Absolute(col),
                y: TermwizPosition::Absolute(row),
            },
            Self::make_fg_colour(foreground),
            background.map_or_else(Self::make_default_bg_colour, Self::make_bg_colour),
        ]);
        self.surface.add_change(character);

        Ok(())
    }

    /// Overlay text at a given coord with the given colours.
    pub fn add_text(
        &mut self,
        x: usize,
        y: usize,
        text: String,
        maybe_background_colour: Option<Colour>,
        maybe_foreground_colour: Option<Colour>,
    ) {
        let bg_colour =
            maybe_background_colour.map_or_else(Self::make_default_bg_colour, Self::make_bg_colour);

        let fg_colour = maybe_foreground_colour
            .map_or_else(|| Self::make_fg_colour(WHITE), Self::make_fg_colour);

        self.surface.add_changes(vec![
            TermwizChange::CursorPosition {
                x: TermwizPosition::Absolute(x),
                y: TermwizPosition::Absolute(y),
            },
            bg_colour,
            fg_colour,
        ]);
        self.surface.add_change(text);
    }

    /// Make a Termwiz colour attribute
    #[must_use]
    pub fn make_colour_attribute(colour: Colour) -> termwiz::color::ColorAttribute {
        termwiz::color::ColorAttribute::TrueColorWithDefaultFallback(colour.to_srgba_tuple())
    }

    /// Make a Termwiz background colour
    #[must_use]
    pub fn make_bg_colour(colour: Colour) -> TermwizChange {
        let colour_attribute = Self::make_colour_attribute(colour);
        TermwizChange::Attribute(termwiz::cell::AttributeChange::Background(colour_attribute))
    }

    /// Make the default Termwiz background colour. This is the non-colour that a terminal
    /// displays when nothing else has been set.
    #[must_use]
    pub const fn make_default_bg_colour() -> TermwizChange {
        let colour_attribute = termwiz::color::ColorAttribute::Default;
        TermwizChange::Attribute(termwiz::cell::AttributeChange::Background(colour_attribute))
    }

    /// Make a Termwiz foreground colour
    #[must_use]
    pub fn make_fg_colour(colour: Colour) -> TermwizChange {
        let colour_attribute = Self::make_colour_attribute(colour);
        TermwizChange::Attribute(termwiz::cell::AttributeChange::Foreground(colour_attribute))
    }
}

#[cfg(test)]
#[expect(
    clippy::indexing_slicing,
    clippy::shadow_unrelated,
    reason = "Tests aren't so strict"
)]
mod test {
    use super::*;
    use crate::canvas::Canvas as _;

    const RED: Colour = Colour::opaque(255, 0, 0);

    #[test]
    fn empty_cells_keep_default_colours() {
        let mut surface = Surface::new(2, 2);
        surface.add_canvas(&RasterCanvas::new(2, 4), (0, 0));

        let cell = &surface.surface.screen_cells()[0][0];
        assert_eq!(cell.str(), " ");
        assert_eq!(
            cell.attrs().background(),
            termwiz::color::ColorAttribute::Default
        );
    }

    #[test]
    fn pair_of_pixels_uses_upper_half_block() {
        let mut surface = Surface::new(1, 1);
        surface.add_cell(0, 0, Some(RED), Some(WHITE)).unwrap();

        let cell = &surface.surface.screen_cells()[0][0];
        assert_eq!(cell.str(), "▀");
        assert_eq!(
            cell.attrs().foreground(),
            Surface::make_colour_attribute(RED)
        );
        assert_eq!(
            cell.attrs().background(),
            Surface::make_colour_attribute(WHITE)
        );
    }

    #[test]
    fn lone_lower_pixel_uses_lower_half_block() {
        let mut surface = Surface::new(1, 1);
        surface.add_cell(0, 0, None, Some(WHITE)).unwrap();

        let cell = &surface.surface.screen_cells()[0][0];
        assert_eq!(cell.str(), "▄");
        assert_eq!(
            cell.attrs().foreground(),
            Surface::make_colour_attribute(WHITE)
        );
        assert_eq!(
            cell.attrs().background(),
            termwiz::color::ColorAttribute::Default
        );
    }

    #[test]
    fn pixels_outside_the_terminal_are_errors() {
        let mut surface = Surface::new(1, 1);
        let error = surface.add_cell(0, 1, Some(WHITE), None).unwrap_err();
        assert_eq!(error.to_string(), "Tried to add pixel to row: 1");
    }

    #[test]
    fn canvas_is_drawn_at_its_offset() {
        let mut canvas = RasterCanvas::new(2, 2);
        canvas.fill_rect(1, 1, 1, 1, RED);

        let mut surface = Surface::new(4, 3);
        surface.add_canvas(&canvas, (2, 1));

        let cells = surface.surface.screen_cells();
        assert_eq!(cells[1][2].str(), " ");
        assert_eq!(cells[1][3].str(), "▄");
        assert_eq!(
            cells[1][3].attrs().foreground(),
            Surface::make_colour_attribute(RED)
        );
    }

    #[test]
    fn oversized_canvas_is_cropped() {
        let mut canvas = RasterCanvas::new(10, 10);
        canvas.fill_rect(0, 0, 10, 10, WHITE);

        let mut surface = Surface::new(2, 2);
        surface.add_canvas(&canvas, (0, 0));
        let cells = surface.surface.screen_cells();
        assert_eq!(cells[1][1].str(), "▀");
    }

    #[test]
    fn add_text_overlays() {
        let mut surface = Surface::new(5, 1);
        surface.add_text(1, 0, "hi".into(), None, Some(RED));
        let cells = surface.surface.screen_cells();
        assert_eq!(cells[0][1].str(), "h");
        assert_eq!(cells[0][2].str(), "i");
        assert_eq!(
            cells[0][2].attrs().foreground(),
            Surface::make_colour_attribute(RED)
        );
    }
}
