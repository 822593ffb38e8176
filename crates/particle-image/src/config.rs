//! All of the user config for the particle image.

use color_eyre::eyre::{ContextCompat as _, Result};
use snafu::{ensure, ResultExt as _};

use crate::errors::{ConfigurationSnafu, ParticleImageError, TomlParseSnafu};

/// A copy of the default config file. It gets copied to the user's config folder the first time
/// they start the app.
static DEFAULT_CONFIG: &str = include_str!("../default_config.toml");

/// The valid log levels. Based on our `tracing` crate.
#[derive(serde::Serialize, serde::Deserialize, clap::ValueEnum, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum LogLevel {
    /// Error
    Error,
    /// Warnings
    Warn,
    /// Info
    Info,
    /// Debug
    Debug,
    /// Trace
    Trace,
    /// No logging
    Off,
}

/// Everything that can be configured about a particle image.
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct Config {
    /// Path to the image that the particles are sampled from.
    pub src: Option<std::path::PathBuf>,
    /// Grid step, in pixels, between sampled particles.
    pub spacing: u32,
    /// Radius of a drawn particle, in pixels.
    pub size: f64,
    /// How close, in pixels, the pointer needs to be before a particle is pushed away.
    pub repel_radius: f64,
    /// Spring coefficient pulling a particle back to where it was sampled.
    pub return_force: f64,
    /// Per-frame velocity multiplier. Must be between 0 and 1 (exclusive).
    pub damping: f64,
    /// Divisor for the pointer's push. Bigger numbers mean a gentler push.
    pub repel_strength: f64,
    /// CSS colour, hex or named, to fill the canvas with every frame, unless `transparent` is set.
    pub background: String,
    /// Pixels with an alpha (0-255) at or below this are not turned into particles.
    pub min_alpha: u8,
    /// Target display width cap when `responsive` is enabled. `0` means "use 80% of the viewport".
    pub max_width: Option<f64>,
    /// Shrink images that are wider than `max_width`.
    pub responsive: bool,
    /// Clear the canvas instead of filling it with `background`.
    pub transparent: bool,
    /// Target frame rate.
    pub frame_rate: u32,
    /// Show the particle count and frame rate in the top-right corner.
    pub show_stats: bool,
    /// The maximum log level
    pub log_level: LogLevel,
    /// The location of the log file.
    pub log_path: std::path::PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let log_directory = match dirs::state_dir() {
            Some(directory) => directory,
            None => std::path::PathBuf::new().join("./"),
        };
        let log_path = log_directory
            .join("particle-image")
            .join("particle-image.log");

        Self {
            src: None,
            spacing: 12,
            size: 3.0,
            repel_radius: 120.0,
            return_force: 0.08,
            damping: 0.9,
            repel_strength: 20.0,
            background: "#000".to_owned(),
            min_alpha: 80,
            max_width: Some(800.0),
            responsive: true,
            transparent: false,
            frame_rate: 30,
            show_stats: false,
            log_level: LogLevel::Off,
            log_path,
        }
    }
}

impl Config {
    /// Parse and validate config from a TOML string.
    pub fn from_toml(data: &str, path: &std::path::Path) -> Result<Self, ParticleImageError> {
        let config = toml::from_str::<Self>(data).context(TomlParseSnafu { path })?;
        config.validated()
    }

    /// Reject settings that would make the simulation diverge or divide by zero, and clamp
    /// the ones that have a sensible fallback.
    pub fn validated(mut self) -> Result<Self, ParticleImageError> {
        ensure!(
            self.spacing > 0,
            ConfigurationSnafu {
                message: "`spacing` must be at least 1 pixel"
            }
        );
        ensure!(
            self.repel_radius.is_finite() && self.repel_radius > 0.0,
            ConfigurationSnafu {
                message: format!("`repel_radius` must be above 0, got {}", self.repel_radius)
            }
        );
        ensure!(
            self.damping.is_finite() && self.damping > 0.0 && self.damping < 1.0,
            ConfigurationSnafu {
                message: format!(
                    "`damping` must be between 0 and 1 (exclusive), got {}",
                    self.damping
                )
            }
        );
        ensure!(
            self.return_force.is_finite() && self.return_force >= 0.0,
            ConfigurationSnafu {
                message: format!("`return_force` can't be negative, got {}", self.return_force)
            }
        );
        ensure!(
            self.repel_strength.is_finite() && self.repel_strength > 0.0,
            ConfigurationSnafu {
                message: format!(
                    "`repel_strength` must be above 0, got {}",
                    self.repel_strength
                )
            }
        );
        ensure!(
            self.size.is_finite() && self.size >= 0.0,
            ConfigurationSnafu {
                message: format!("`size` can't be negative, got {}", self.size)
            }
        );
        ensure!(
            self.frame_rate > 0,
            ConfigurationSnafu {
                message: "`frame_rate` must be at least 1"
            }
        );
        crate::colour::Colour::parse(&self.background)?;

        if let Some(max_width) = self.max_width {
            if !max_width.is_finite() || max_width <= 0.0 {
                tracing::warn!(
                    "`max_width` of {max_width} isn't a usable width, falling back to the viewport"
                );
                self.max_width = None;
            }
        }

        Ok(self)
    }

    /// The parsed background colour.
    pub fn background_colour(&self) -> Result<crate::colour::Colour, ParticleImageError> {
        crate::colour::Colour::parse(&self.background)
    }

    /// Whether moving from `self` to `other` means the particles have to be sampled again.
    #[must_use]
    pub fn is_resample_needed(&self, other: &Self) -> bool {
        self.src != other.src
            || self.spacing != other.spacing
            || self.min_alpha != other.min_alpha
            || self.max_width != other.max_width
            || self.responsive != other.responsive
    }

    /// Canonical path to the config directory.
    pub async fn directory(
        state: &std::sync::Arc<crate::shared_state::SharedState>,
    ) -> std::path::PathBuf {
        state.config_path.read().await.clone()
    }

    /// Get the stable location of our config directory on the user's system.
    pub fn default_directory() -> Result<std::path::PathBuf> {
        Ok(dirs::config_dir()
            .context("Couldn't get standard config directory")?
            .join("particle-image"))
    }

    /// Figure out where our config is being stored, and create the directory if needed.
    pub async fn setup_directory(
        maybe_custom_path: Option<std::path::PathBuf>,
        state: &std::sync::Arc<crate::shared_state::SharedState>,
    ) -> Result<()> {
        let path = match maybe_custom_path {
            None => Self::default_directory()?,
            Some(path_string) => std::path::PathBuf::new().join(path_string),
        };

        std::fs::create_dir_all(path.clone())?;
        *state.config_path.write().await = path;

        Ok(())
    }

    /// Canonical path to the main config file.
    pub async fn main_config_path(
        state: &std::sync::Arc<crate::shared_state::SharedState>,
    ) -> std::path::PathBuf {
        let directory = Self::directory(state).await;
        let main_config_file = state.main_config_file.read().await.clone();
        directory.join(main_config_file)
    }

    /// Load the main config
    pub async fn load(state: &std::sync::Arc<crate::shared_state::SharedState>) -> Result<Self> {
        let config_path = Self::main_config_path(state).await;
        let config_file_name = config_path
            .file_name()
            .context("Couldn't get file name from config path")?;
        let is_default_config = config_file_name == crate::cli_args::DEFAULT_CONFIG_FILE_NAME;
        if is_default_config && !config_path.exists() {
            std::fs::write(config_path.clone(), DEFAULT_CONFIG)?;
        }

        tracing::info!("(Re)loading the main config from: {config_path:?}");
        let result = std::fs::read_to_string(config_path.clone());
        match result {
            Ok(data) => {
                tracing::trace!("Using config file:\n{data}");
                let mut config = Self::from_toml(&data, &config_path)?;
                if let Some(src) = config.src.as_mut() {
                    if src.is_relative() {
                        *src = Self::directory(state).await.join(&*src);
                    }
                }
                if let Some(cli_src) = state.cli_src.read().await.clone() {
                    config.src = Some(cli_src);
                }
                Ok(config)
            }
            Err(err) => {
                tracing::error!("Loading config: {err:?}");
                color_eyre::eyre::bail!(
                    "Couldn't load config at {config_path:?}: {}",
                    err.to_string()
                );
            }
        }
    }

    /// Load the main config
    pub async fn load_config_into_shared_state(
        state: &std::sync::Arc<crate::shared_state::SharedState>,
    ) -> Result<Self> {
        let new_config = Self::load(state).await?;
        let mut config_state = state.config.write().await;
        *config_state = new_config.clone();
        drop(config_state);

        Ok(new_config)
    }

    /// Watch the config file for any changes and then automatically update the shared state with
    /// the contents of the new config file.
    pub fn watch(
        state: std::sync::Arc<crate::shared_state::SharedState>,
    ) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move {
            let path = Self::directory(&state).await;
            tracing::debug!("Watching config ({path:?}) for changes.");

            let (config_file_change_tx, mut config_file_change_rx) = tokio::sync::mpsc::channel(1);
            let mut protocol_rx = state.protocol_tx.subscribe();

            let mut debouncer = notify_debouncer_full::new_debouncer(
                std::time::Duration::from_millis(100),
                None,
                move |result: notify_debouncer_full::DebounceEventResult| match result {
                    Ok(events) => {
                        for event in events {
                            let send_result = config_file_change_tx.blocking_send(event.clone());
                            if let Err(error) = send_result {
                                tracing::error!(
                                    "Sending config file watcher notification: {error:?}"
                                );
                            }
                        }
                    }
                    Err(error) => tracing::error!("File watcher: {error:?}"),
                },
            )?;
            debouncer.watch(
                &path,
                notify_debouncer_full::notify::RecursiveMode::NonRecursive,
            )?;

            #[expect(
                clippy::integer_division_remainder_used,
                reason = "This is caused by the `tokio::select!`"
            )]
            loop {
                tokio::select! {
                    Some(event) = config_file_change_rx.recv() => {
                        Self::handle_file_change_event(event, &state).await;
                    },
                    Ok(message) = protocol_rx.recv() => {
                        if matches!(message, crate::run::Protocol::End) {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("Leaving config watcher loop");
            Ok(())
        })
    }

    /// Handle an event from the config file watcher. Should normally be a notification that the
    /// config file has changed.
    async fn handle_file_change_event(
        event: notify_debouncer_full::DebouncedEvent,
        state: &std::sync::Arc<crate::shared_state::SharedState>,
    ) {
        use notify_debouncer_full::notify::event as notify_event;
        let notify_event::EventKind::Modify(kind) = event.kind else {
            return;
        };
        let notify_event::ModifyKind::Data(_) = kind else {
            return;
        };

        tracing::debug!(
            "Config file change detected ({:?}), updating shared state.",
            event.paths
        );

        match Self::load_config_into_shared_state(state).await {
            Ok(config) => {
                state
                    .protocol_tx
                    .send(crate::run::Protocol::Config(config))
                    .unwrap_or_else(|send_error| {
                        tracing::error!(
                            "Couldn't send config update on protocol channel: {send_error:?}"
                        );
                        0
                    });
            }
            Err(error) => {
                tracing::error!("Config update rejected, keeping the old one: {error:?}");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(toml: &str) -> Result<Config, ParticleImageError> {
        Config::from_toml(toml, std::path::Path::new("test.toml"))
    }

    #[test]
    fn bundled_default_config_matches_defaults() {
        let config = parse(DEFAULT_CONFIG).unwrap();
        let defaults = Config::default();
        assert_eq!(config.spacing, defaults.spacing);
        assert_eq!(config.min_alpha, defaults.min_alpha);
        assert_eq!(config.max_width, defaults.max_width);
        assert_eq!(config.background, defaults.background);
        assert!((config.damping - defaults.damping).abs() < f64::EPSILON);
        assert!((config.repel_strength - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config = parse("spacing = 4\ntransparent = true").unwrap();
        assert_eq!(config.spacing, 4);
        assert!(config.transparent);
        assert_eq!(config.min_alpha, 80);
    }

    #[test]
    fn rejects_unstable_damping() {
        for damping in ["1.0", "1.5", "0.0", "-0.5"] {
            let error = parse(&format!("damping = {damping}")).unwrap_err();
            assert!(
                matches!(error, ParticleImageError::Configuration { .. }),
                "damping {damping} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_zero_repel_radius() {
        let error = parse("repel_radius = 0.0").unwrap_err();
        assert!(matches!(error, ParticleImageError::Configuration { .. }));
    }

    #[test]
    fn rejects_zero_spacing() {
        let error = parse("spacing = 0").unwrap_err();
        assert!(matches!(error, ParticleImageError::Configuration { .. }));
    }

    #[test]
    fn rejects_bad_background() {
        let error = parse("background = \"notacolour\"").unwrap_err();
        assert!(matches!(error, ParticleImageError::Configuration { .. }));
    }

    #[test]
    fn non_positive_max_width_falls_back_to_viewport() {
        let config = parse("max_width = 0.0").unwrap();
        assert_eq!(config.max_width, None);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let error = parse("spacing = \"lots\"").unwrap_err();
        assert!(matches!(error, ParticleImageError::TomlParse { .. }));
    }

    #[test]
    fn only_sampling_options_need_a_resample() {
        let config = Config::default();

        let physics_change = Config {
            damping: 0.5,
            background: "#fff".to_owned(),
            ..config.clone()
        };
        assert!(!config.is_resample_needed(&physics_change));

        let sampling_changes = [
            Config {
                spacing: 3,
                ..config.clone()
            },
            Config {
                min_alpha: 10,
                ..config.clone()
            },
            Config {
                max_width: Some(400.0),
                ..config.clone()
            },
            Config {
                max_width: None,
                ..config.clone()
            },
            Config {
                responsive: false,
                ..config.clone()
            },
        ];
        for sampling_change in &sampling_changes {
            assert!(config.is_resample_needed(sampling_change));
        }

        let new_source = Config {
            src: Some("other.png".into()),
            ..config.clone()
        };
        assert!(config.is_resample_needed(&new_source));
    }

    #[test]
    fn loads_from_a_file_on_disk() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("particle-image.toml");
        std::fs::write(&path, "spacing = 2\nsrc = \"cat.png\"").unwrap();
        let data = std::fs::read_to_string(&path).unwrap();
        let config = Config::from_toml(&data, &path).unwrap();
        assert_eq!(config.spacing, 2);
        assert_eq!(config.src, Some("cat.png".into()));
    }
}
