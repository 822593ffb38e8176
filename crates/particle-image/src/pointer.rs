//! Where the pointer is, relative to the canvas.

use glam::DVec2;

/// Tracks the latest pointer position in canvas coordinates.
///
/// When the pointer isn't over the canvas (including before it has ever moved) the position
/// is `None`, which is infinitely far from every particle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointerTracker {
    /// The latest position, relative to the canvas' top-left corner.
    position: Option<DVec2>,
    /// Where the canvas' top-left corner is on the screen.
    canvas_offset: DVec2,
}

impl PointerTracker {
    /// Record where the canvas is drawn on the screen.
    pub const fn set_canvas_offset(&mut self, offset: DVec2) {
        self.canvas_offset = offset;
    }

    /// The pointer moved to a screen position.
    pub fn moved(&mut self, screen_position: DVec2) {
        self.position = Some(screen_position - self.canvas_offset);
    }

    /// The pointer left the canvas.
    pub const fn left(&mut self) {
        self.position = None;
    }

    /// The latest known position relative to the canvas.
    #[must_use]
    pub const fn position(&self) -> Option<DVec2> {
        self.position
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn starts_off_canvas() {
        assert_eq!(PointerTracker::default().position(), None);
    }

    #[test]
    fn translates_into_canvas_coordinates() {
        let mut pointer = PointerTracker::default();
        pointer.set_canvas_offset(DVec2::new(10.0, 4.0));
        pointer.moved(DVec2::new(15.0, 4.0));
        assert_eq!(pointer.position(), Some(DVec2::new(5.0, 0.0)));
    }

    #[test]
    fn leaving_resets_to_off_canvas() {
        let mut pointer = PointerTracker::default();
        pointer.moved(DVec2::new(1.0, 1.0));
        pointer.left();
        assert_eq!(pointer.position(), None);
    }
}
