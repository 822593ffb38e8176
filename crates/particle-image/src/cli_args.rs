//! All the CLI arguments for the particle image

/// The name of the main config file that gets created when none exists.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "particle-image.toml";

/// Render an image as a field of particles that scatter away from your mouse.
#[derive(clap::Parser, Debug, Clone)]
#[command(version, about)]
#[non_exhaustive]
pub struct CliArgs {
    /// The image to turn into particles. Overrides `src` in the config file.
    pub src: Option<std::path::PathBuf>,

    /// Use a custom config directory.
    #[arg(long)]
    pub config_dir: Option<std::path::PathBuf>,

    /// Use a custom main config file, relative to the config directory.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE_NAME)]
    pub main_config: std::path::PathBuf,

    /// Override the log level from the config file.
    #[arg(long, value_enum)]
    pub log_level: Option<crate::config::LogLevel>,

    /// Override the log path from the config file.
    #[arg(long)]
    pub log_path: Option<std::path::PathBuf>,

    /// Don't use the terminal. Instead render to a PNG file and exit.
    #[arg(long)]
    pub snapshot: Option<std::path::PathBuf>,

    /// How many frames to simulate before saving the snapshot.
    #[arg(long, default_value_t = 1, requires = "snapshot")]
    pub frames: u32,
}

#[cfg(test)]
mod test {
    use clap::Parser as _;

    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["particle-image", "cat.png"]).unwrap();
        assert_eq!(args.src, Some("cat.png".into()));
        assert_eq!(args.main_config, std::path::PathBuf::from(DEFAULT_CONFIG_FILE_NAME));
        assert_eq!(args.frames, 1);
        assert!(args.snapshot.is_none());
    }

    #[test]
    fn snapshot_mode() {
        let args = CliArgs::try_parse_from([
            "particle-image",
            "cat.png",
            "--snapshot",
            "out.png",
            "--frames",
            "10",
        ])
        .unwrap();
        assert_eq!(args.snapshot, Some("out.png".into()));
        assert_eq!(args.frames, 10);
    }

    #[test]
    fn frames_need_a_snapshot() {
        let result = CliArgs::try_parse_from(["particle-image", "--frames", "10"]);
        assert!(result.is_err());
    }
}
