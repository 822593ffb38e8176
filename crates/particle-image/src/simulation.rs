//! All the maths to push particles away from the pointer and spring them back home.

use glam::DVec2;

use crate::{config::Config, particle::Particle};

/// The physical constants of the simulation.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Physics {
    /// Maximum pointer distance at which a particle feels the pointer.
    pub repel_radius: f64,
    /// Spring coefficient pulling a particle back to its origin.
    pub return_force: f64,
    /// Per-frame velocity multiplier.
    pub damping: f64,
    /// Divisor applied to the pointer's push.
    pub repel_strength: f64,
}

impl From<&Config> for Physics {
    fn from(config: &Config) -> Self {
        Self {
            repel_radius: config.repel_radius,
            return_force: config.return_force,
            damping: config.damping,
            repel_strength: config.repel_strength,
        }
    }
}

impl Physics {
    /// How strongly the pointer acts at a given squared distance. Quadratic falloff from 1 at
    /// the pointer to 0 at `repel_radius`, and exactly 0 beyond it.
    #[must_use]
    pub fn falloff(&self, distance_squared: f64) -> f64 {
        let radius_squared = self.repel_radius * self.repel_radius;
        if distance_squared >= radius_squared {
            return 0.0;
        }

        (radius_squared - distance_squared) / radius_squared
    }

    /// The push a particle gets from the pointer, along the line from the pointer to the
    /// particle.
    #[must_use]
    pub fn repulsion(&self, offset_from_pointer: DVec2) -> DVec2 {
        let force = self.falloff(offset_from_pointer.length_squared());
        offset_from_pointer / self.repel_strength * force
    }
}

/// Owns the particle population and advances it one frame at a time.
#[derive(Clone, Debug, Default)]
pub struct ParticleSystem {
    /// All the particles
    particles: Vec<Particle>,
    /// The physical constants
    physics: Option<Physics>,
}

impl ParticleSystem {
    /// Initialise a new simulation
    #[must_use]
    pub const fn new(particles: Vec<Particle>, physics: Physics) -> Self {
        Self {
            particles,
            physics: Some(physics),
        }
    }

    /// Whether there's a population to simulate.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.physics.is_some()
    }

    /// All the particles, in the order they were sampled (and so the order they're drawn).
    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Swap in new physical constants without disturbing the particles.
    pub fn set_physics(&mut self, physics: Physics) {
        self.physics = Some(physics);
    }

    /// Advance every particle by one frame. `pointer` is `None` when the pointer isn't over the
    /// canvas, in which case nothing is repelled.
    ///
    /// The order is important: both forces act on the velocity, then the velocity is damped,
    /// then the position is integrated (explicit Euler, one step per frame).
    pub fn step(&mut self, pointer: Option<DVec2>) {
        let Some(physics) = self.physics.as_ref() else {
            return;
        };

        for particle in &mut self.particles {
            if let Some(pointer_position) = pointer {
                particle.velocity += physics.repulsion(particle.position - pointer_position);
            }
            particle.velocity += (particle.origin() - particle.position) * physics.return_force;
            particle.velocity *= physics.damping;
            particle.position += particle.velocity;
        }
    }
}
