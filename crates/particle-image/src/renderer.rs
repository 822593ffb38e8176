//! Draw a frame of particles onto a canvas.

use crate::{canvas::Canvas, colour::Colour, config::Config, particle::Particle};

/// Draws the background and then every particle, in population order.
#[derive(Clone, Debug, PartialEq)]
pub struct Renderer {
    /// The colour behind the particles, `None` for a transparent background.
    background: Option<Colour>,
    /// Radius of every particle.
    size: f64,
}

impl Renderer {
    /// Instantiate from already validated config.
    pub fn new(config: &Config) -> Result<Self, crate::errors::ParticleImageError> {
        let background = if config.transparent {
            None
        } else {
            Some(config.background_colour()?)
        };

        Ok(Self {
            background,
            size: config.size,
        })
    }

    /// Render one whole frame. Later particles are painted over earlier ones.
    pub fn draw<C: Canvas>(&self, canvas: &mut C, particles: &[Particle]) {
        let (width, height) = canvas.dimensions();
        match self.background {
            Some(colour) => canvas.fill_rect(0, 0, width, height, colour),
            None => canvas.clear_rect(0, 0, width, height),
        }

        for particle in particles {
            let position = particle.position();
            canvas.draw_circle(position.x, position.y, self.size, particle.colour());
        }
    }
}
