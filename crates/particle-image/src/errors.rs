//! Errors for this library

/// All the known errors returned by this crate.
#[derive(Debug, snafu::Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum ParticleImageError {
    #[snafu(display("Couldn't read image file: {}", path.display()))]
    /// The image file couldn't be read from disk.
    ImageRead {
        /// Where we tried to read the image from
        path: std::path::PathBuf,
        /// The parent error type
        source: std::io::Error,
    },

    #[snafu(display("Couldn't decode image: {origin}"))]
    /// The image bytes were read but couldn't be decoded into pixels.
    ImageLoad {
        /// A human-readable description of where the image came from
        origin: String,
        /// The parent error type
        source: image::ImageError,
    },

    #[snafu(display("Invalid configuration: {message}"))]
    /// A configuration value that would make the simulation misbehave.
    Configuration {
        /// What exactly is wrong with the config
        message: String,
    },

    #[snafu(display("Couldn't parse config file: {}", path.display()))]
    /// The TOML config file is malformed.
    TomlParse {
        /// Path to the offending config file
        path: std::path::PathBuf,
        /// The parent error type
        source: toml::de::Error,
    },

    /// General errors that don't need to be matched on
    #[snafu(whatever, display("{message}"))]
    Whatever {
        /// A helpful message acompanying the error
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync>, Some)))]
        /// The parent error type
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}
