//! A single particle, born from one sampled pixel of the source image.

use glam::DVec2;

use crate::colour::Colour;

/// A simulated point that remembers where it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    /// Where the particle currently is.
    pub(crate) position: DVec2,
    /// Where the particle was sampled from. It is always pulled back towards here.
    origin: DVec2,
    /// Current velocity, in pixels per frame.
    pub(crate) velocity: DVec2,
    /// The colour of the source pixel.
    colour: Colour,
}

impl Particle {
    /// A particle at rest at its origin.
    #[must_use]
    pub const fn new(origin: DVec2, colour: Colour) -> Self {
        Self {
            position: origin,
            origin,
            velocity: DVec2::ZERO,
            colour,
        }
    }

    /// Where the particle currently is.
    #[must_use]
    pub const fn position(&self) -> DVec2 {
        self.position
    }

    /// Where the particle was sampled from.
    #[must_use]
    pub const fn origin(&self) -> DVec2 {
        self.origin
    }

    /// Current velocity.
    #[must_use]
    pub const fn velocity(&self) -> DVec2 {
        self.velocity
    }

    /// The colour of the source pixel.
    #[must_use]
    pub const fn colour(&self) -> Colour {
        self.colour
    }

    /// How far the particle has been knocked from its origin.
    #[must_use]
    pub fn displacement(&self) -> f64 {
        self.position.distance(self.origin)
    }
}
