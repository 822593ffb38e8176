//! Turn the pixels of an image into the seeds of a particle population.
//!
//! The image is first scaled to its display size, then a regular grid is laid over it. Every
//! grid point whose pixel is opaque enough becomes a particle, in row-major order. The result
//! is fully deterministic for a given image and config.

use glam::DVec2;

use crate::{colour::Colour, config::Config, particle::Particle};

/// The fraction of the viewport's width to fill when no `max_width` is set.
const VIEWPORT_FILL: f64 = 0.8;

/// The result of sampling an image.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Sample {
    /// Width of the display, and so the canvas, in pixels.
    pub width: u32,
    /// Height of the display, and so the canvas, in pixels.
    pub height: u32,
    /// The particles, in row-major order of the sampling grid.
    pub particles: Vec<Particle>,
}

/// Samples particles from an image using the sampling-relevant parts of the config.
#[derive(Clone, Debug)]
pub struct ImageSampler {
    /// Grid step between samples.
    spacing: u32,
    /// Pixels at or below this alpha are skipped.
    min_alpha: u8,
    /// Cap on the display width.
    max_width: Option<f64>,
    /// Whether to scale down at all.
    responsive: bool,
}

impl ImageSampler {
    /// Instantiate
    #[must_use]
    pub const fn new(config: &Config) -> Self {
        Self {
            spacing: config.spacing,
            min_alpha: config.min_alpha,
            max_width: config.max_width,
            responsive: config.responsive,
        }
    }

    /// How much to scale the image by. Images are only ever scaled down, never up.
    #[must_use]
    pub fn scale(&self, source_width: u32, viewport_width: Option<f64>) -> f64 {
        if !self.responsive || source_width == 0 {
            return 1.0;
        }

        let maybe_limit = self
            .max_width
            .or_else(|| viewport_width.map(|width| width * VIEWPORT_FILL));
        match maybe_limit {
            Some(limit) if limit > 0.0 => (limit / f64::from(source_width)).min(1.0),
            _ => 1.0,
        }
    }

    /// The size, in whole pixels, that the image will be displayed at.
    #[must_use]
    #[expect(
        clippy::as_conversions,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "The scale is at most 1 so the result always fits back into a `u32`"
    )]
    pub fn display_dimensions(
        &self,
        (source_width, source_height): (u32, u32),
        viewport_width: Option<f64>,
    ) -> (u32, u32) {
        let scale = self.scale(source_width, viewport_width);
        let shrink = |length: u32| -> u32 {
            if length == 0 {
                return 0;
            }
            ((f64::from(length) * scale).round() as u32).max(1)
        };
        (shrink(source_width), shrink(source_height))
    }

    /// Create the particle seeds for an image.
    #[must_use]
    pub fn sample(&self, image: &image::RgbaImage, viewport_width: Option<f64>) -> Sample {
        let (width, height) = self.display_dimensions(image.dimensions(), viewport_width);
        let working = if (width, height) == image.dimensions() {
            std::borrow::Cow::Borrowed(image)
        } else {
            tracing::debug!(
                "Resampling image from {:?} to {width}x{height}",
                image.dimensions()
            );
            std::borrow::Cow::Owned(image::imageops::resize(
                image,
                width,
                height,
                image::imageops::FilterType::Triangle,
            ))
        };

        let step = usize::try_from(self.spacing).unwrap_or(usize::MAX).max(1);
        let mut particles = Vec::new();
        for y in (0..height).step_by(step) {
            for x in (0..width).step_by(step) {
                let pixel = working.get_pixel(x, y).0;
                let [_, _, _, alpha] = pixel;
                if alpha > self.min_alpha {
                    let origin = DVec2::new(f64::from(x), f64::from(y));
                    particles.push(Particle::new(origin, Colour::from_rgba8(pixel)));
                }
            }
        }

        if particles.is_empty() {
            tracing::info!("No pixels were opaque enough to make particles from");
        } else {
            tracing::debug!("Sampled {} particles", particles.len());
        }

        Sample {
            width,
            height,
            particles,
        }
    }
}

#[cfg(test)]
#[expect(clippy::indexing_slicing, reason = "Tests aren't so strict")]
mod test {
    use super::*;

    fn sampler(spacing: u32, min_alpha: u8) -> ImageSampler {
        ImageSampler::new(&Config {
            spacing,
            min_alpha,
            ..Config::default()
        })
    }

    #[test]
    fn opaque_image_fills_the_grid() {
        let image = image::RgbaImage::from_pixel(25, 10, image::Rgba([200, 100, 50, 255]));
        let sample = sampler(4, 80).sample(&image, None);
        // ceil(25 / 4) * ceil(10 / 4)
        assert_eq!(sample.particles.len(), 7 * 3);
        assert_eq!((sample.width, sample.height), (25, 10));
    }

    #[test]
    fn row_major_order() {
        let image = image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 0, 255]));
        let origins: Vec<DVec2> = sampler(2, 0)
            .sample(&image, None)
            .particles
            .iter()
            .map(Particle::origin)
            .collect();
        assert_eq!(
            origins,
            vec![
                DVec2::new(0.0, 0.0),
                DVec2::new(2.0, 0.0),
                DVec2::new(0.0, 2.0),
                DVec2::new(2.0, 2.0),
            ]
        );
    }

    #[test]
    fn alpha_at_threshold_is_skipped() {
        let mut image = image::RgbaImage::from_pixel(3, 1, image::Rgba([9, 9, 9, 80]));
        image.put_pixel(1, 0, image::Rgba([9, 9, 9, 81]));
        let sample = sampler(1, 80).sample(&image, None);
        assert_eq!(sample.particles.len(), 1);
        assert_eq!(sample.particles[0].origin(), DVec2::new(1.0, 0.0));
        assert_eq!(sample.particles[0].colour(), Colour::from_rgba8([9, 9, 9, 81]));
    }

    #[test]
    fn max_alpha_threshold_means_no_particles() {
        let image = image::RgbaImage::from_pixel(5, 5, image::Rgba([9, 9, 9, 255]));
        let sample = sampler(1, 255).sample(&image, None);
        assert!(sample.particles.is_empty());
    }

    #[test]
    fn particles_start_at_rest() {
        let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([9, 9, 9, 255]));
        for particle in sampler(1, 0).sample(&image, None).particles {
            assert_eq!(particle.position(), particle.origin());
            assert_eq!(particle.velocity(), DVec2::ZERO);
        }
    }

    #[test]
    fn wide_images_are_scaled_down_to_max_width() {
        let sampler = sampler(12, 80);
        assert!((sampler.scale(1600, None) - 0.5).abs() < f64::EPSILON);
        assert_eq!(sampler.display_dimensions((1600, 900), None), (800, 450));
    }

    #[test]
    fn narrow_images_are_never_scaled_up() {
        let sampler = sampler(12, 80);
        assert!((sampler.scale(400, None) - 1.0).abs() < f64::EPSILON);
        assert_eq!(sampler.display_dimensions((400, 300), None), (400, 300));
    }

    #[test]
    fn viewport_is_the_fallback_limit() {
        let sampler = ImageSampler::new(&Config {
            max_width: None,
            ..Config::default()
        });
        assert_eq!(sampler.display_dimensions((200, 100), Some(100.0)), (80, 40));
        assert_eq!(sampler.display_dimensions((200, 100), None), (200, 100));
    }

    #[test]
    fn unresponsive_never_scales() {
        let sampler = ImageSampler::new(&Config {
            responsive: false,
            ..Config::default()
        });
        assert_eq!(sampler.display_dimensions((1600, 900), Some(10.0)), (1600, 900));
    }

    #[test]
    fn sampling_a_scaled_image() {
        let image = image::RgbaImage::from_pixel(1600, 20, image::Rgba([9, 9, 9, 255]));
        let sample = sampler(100, 80).sample(&image, None);
        assert_eq!((sample.width, sample.height), (800, 10));
        assert_eq!(sample.particles.len(), 8);
    }
}
