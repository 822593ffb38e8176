//! The colour of a particle, or of the canvas background.

use std::str::FromStr as _;

use snafu::OptionExt as _;

use crate::errors::{ConfigurationSnafu, ParticleImageError};

/// An sRGB colour with 8-bit channels and a normalised alpha.
#[derive(Clone, Copy, Debug, PartialEq)]
#[expect(
    clippy::exhaustive_structs,
    reason = "A colour is always going to be just these 4 channels"
)]
pub struct Colour {
    /// Red, 0-255
    pub red: u8,
    /// Green, 0-255
    pub green: u8,
    /// Blue, 0-255
    pub blue: u8,
    /// Opacity, 0.0 (transparent) to 1.0 (opaque)
    pub alpha: f32,
}

/// A default pure black.
pub const BLACK: Colour = Colour::opaque(0, 0, 0);

/// A default pure white.
pub const WHITE: Colour = Colour::opaque(255, 255, 255);

/// Nothing at all.
pub const TRANSPARENT: Colour = Colour {
    red: 0,
    green: 0,
    blue: 0,
    alpha: 0.0,
};

impl Colour {
    /// A colour with no transparency.
    #[must_use]
    pub const fn opaque(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: 1.0,
        }
    }

    /// Make a colour from a raw RGBA pixel, normalising the alpha channel.
    #[must_use]
    pub fn from_rgba8(pixel: [u8; 4]) -> Self {
        let [red, green, blue, alpha] = pixel;
        Self {
            red,
            green,
            blue,
            alpha: f32::from(alpha) / 255.0,
        }
    }

    /// Convert back to a raw RGBA pixel.
    #[must_use]
    #[expect(
        clippy::as_conversions,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "The alpha is clamped to 0-255 before casting"
    )]
    pub fn to_rgba8(self) -> image::Rgba<u8> {
        let alpha = (self.alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        image::Rgba([self.red, self.green, self.blue, alpha])
    }

    /// Parse a CSS-style colour: either hex such as `#000` or `#1e1e2e`, or a named colour
    /// such as `black` or `rebeccapurple`.
    pub fn parse(text: &str) -> Result<Self, ParticleImageError> {
        let trimmed = text.trim();
        let rgb = palette::Srgb::<u8>::from_str(trimmed)
            .ok()
            .or_else(|| palette::named::from_str(&trimmed.to_lowercase()));

        rgb.map(|rgb| Self::opaque(rgb.red, rgb.green, rgb.blue))
            .context(ConfigurationSnafu {
                message: format!(
                    "`{text}` is not a colour like `#000`, `#1e1e2e` or `black`"
                ),
            })
    }

    /// Convert to the floating point tuple that `termwiz` wants.
    #[must_use]
    pub fn to_srgba_tuple(self) -> termwiz::color::SrgbaTuple {
        termwiz::color::SrgbaTuple(
            f32::from(self.red) / 255.0,
            f32::from(self.green) / 255.0,
            f32::from(self.blue) / 255.0,
            self.alpha,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_short_and_long_hex() {
        assert_eq!(Colour::parse("#000").unwrap(), BLACK);
        assert_eq!(Colour::parse("#ffffff").unwrap(), WHITE);
        assert_eq!(
            Colour::parse("#1e1e2e").unwrap(),
            Colour::opaque(0x1e, 0x1e, 0x2e)
        );
    }

    #[test]
    fn parses_named_colours() {
        assert_eq!(Colour::parse("black").unwrap(), BLACK);
        assert_eq!(Colour::parse(" White ").unwrap(), WHITE);
        assert_eq!(
            Colour::parse("rebeccapurple").unwrap(),
            Colour::opaque(0x66, 0x33, 0x99)
        );
    }

    #[test]
    fn rejects_nonsense_colours() {
        let error = Colour::parse("notacolour").unwrap_err();
        assert!(matches!(error, ParticleImageError::Configuration { .. }));
        assert!(Colour::parse("#12").is_err());
    }

    #[test]
    fn alpha_is_normalised() {
        let colour = Colour::from_rgba8([10, 20, 30, 51]);
        assert!((colour.alpha - 0.2).abs() < f32::EPSILON);
        assert_eq!(colour.to_rgba8(), image::Rgba([10, 20, 30, 51]));
    }
}
