//! Main entrypoint for running the particle image

use std::sync::Arc;

use clap::Parser as _;
use color_eyre::eyre::{ContextCompat as _, Result};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};

use crate::cli_args::CliArgs;
use crate::config::Config;
use crate::input::Input;
use crate::scene::Scene;
use crate::shared_state::SharedState;
use crate::terminal::Terminal;

/// The environment variable for setting arbitrary log filters.
const LOG_FILTER_ENV: &str = "PARTICLE_IMAGE_LOG";

/// Commands to control the various tasks/threads
#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum Protocol {
    /// The entire application is exiting.
    End,
    /// User's TTY is resized.
    Resize {
        /// Width of new terminal.
        width: u16,
        /// Height of new terminal.
        height: u16,
    },
    /// Parsed input from STDIN.
    Input(termwiz::input::InputEvent),
    /// The config file changed and the new config is valid.
    Config(Config),
}

/// Main entrypoint
pub async fn run(state_arc: &Arc<SharedState>) -> Result<()> {
    let protocol_tx = state_arc.protocol_tx.clone();
    let cli_args = setup(state_arc).await?;

    let config = state_arc.config.read().await.clone();
    if let Some(path) = cli_args.snapshot {
        return Scene::snapshot(config, &path, cli_args.frames).await;
    }

    let users_tty_size = Terminal::get_users_tty_size()?;
    state_arc
        .set_tty_size(
            users_tty_size.cols.try_into()?,
            users_tty_size.rows.try_into()?,
        )
        .await;

    // An image that fails to load leaves the scene empty, showing the error, until the config
    // points it at an image that does load.
    let mut scene = Scene::new(config, Some(state_arc.get_tty_size().await))?;
    scene.reload().await;

    let (terminal, frames_tx) = Terminal::start(Arc::clone(state_arc), protocol_tx.clone());
    let config_handle = Config::watch(Arc::clone(state_arc));

    override_on_panic_behaviour();
    let scene_handle = scene.start(frames_tx, protocol_tx.clone());
    let input_thread_handle = Input::start(protocol_tx.clone());

    scene_handle.await??;
    broadcast_protocol_end(&protocol_tx);
    terminal.await??;
    config_handle.await??;
    if input_thread_handle.is_finished() {
        // The STDIN loop blocks on reading, so it can't listen to the protocol. Therefore we
        // should only join it if it finished on its own.
        input_thread_handle
            .join()
            .map_err(|err| color_eyre::eyre::eyre!("STDIN handle: {err:?}"))??;
    }

    tracing::trace!("Leaving main `run()` function");
    Ok(())
}

/// The default behaviour prints all panics to the CLI, which would be lost in the alternate
/// screen. So instead we at least make a log.
fn override_on_panic_behaviour() {
    std::panic::set_hook(Box::new(|info| {
        let message = if let Some(message) = info.payload().downcast_ref::<String>() {
            message
        } else if let Some(message) = info.payload().downcast_ref::<&str>() {
            message
        } else {
            "Caught a panic with an unknown type."
        };
        let location = match info.location() {
            Some(location) => format!(
                "{}@{}:{}",
                location.file(),
                location.line(),
                location.column()
            ),
            None => "Unknown location".to_owned(),
        };
        tracing::error!("Caught panic ({}): {message:?}", location);
    }));
}

/// Signal all task/thread loops to exit.
///
/// We keep it in its own function because we need to handle the error separately. If the error
/// were to be bubbled with `?` as usual, there's a chance it would never be logged, because the
/// protocol end signal is itself what allows the central error handler to even be reached.
pub(crate) fn broadcast_protocol_end(protocol_tx: &tokio::sync::broadcast::Sender<Protocol>) {
    tracing::debug!("Broadcasting the protocol `End` message to all listeners");
    let result = protocol_tx.send(Protocol::End);
    if let Err(error) = result {
        tracing::debug!("No listeners left for `End`: {error:?}");
    }
}

/// Prepare the application to start.
async fn setup(state: &Arc<SharedState>) -> Result<CliArgs> {
    let cli_args = CliArgs::parse();

    (*state.main_config_file.write().await).clone_from(&cli_args.main_config);
    (*state.cli_src.write().await).clone_from(&cli_args.src);

    let directory_result = Config::setup_directory(cli_args.config_dir.clone(), state).await;
    if let Err(directory_error) = directory_result {
        color_eyre::eyre::bail!("Error setting up config directory: {directory_error:?}");
    }

    let config_result = Config::load_config_into_shared_state(state).await;
    let config = match config_result {
        Ok(config) => config,
        Err(config_error) => {
            let path = Config::main_config_path(state).await;
            color_eyre::eyre::bail!(
                "Bad config file: {config_error}\n\nConfig path: {}",
                path.display()
            );
        }
    };

    setup_logging(&cli_args, state).await?;

    if config.src.is_none() {
        color_eyre::eyre::bail!(
            "No image given. Either pass one on the command line or set `src` in {}",
            Config::main_config_path(state).await.display()
        );
    }

    tracing::info!("Starting particle image");
    tracing::debug!("Loaded config: {config:?}");

    Ok(cli_args)
}

/// Setup logging
async fn setup_logging(cli_args: &CliArgs, state: &Arc<SharedState>) -> Result<()> {
    let are_log_filters_manually_set = std::env::var(LOG_FILTER_ENV).is_ok();
    let mut path = state.config.read().await.log_path.clone();

    if let Some(cli_override_path) = cli_args.log_path.clone() {
        path = cli_override_path;
    }

    let mut level = state.config.read().await.log_level.clone();
    if let Some(cli_override_level) = cli_args.log_level.clone() {
        level = cli_override_level;
    }
    let level_as_string = format!("{level:?}").to_lowercase();

    let is_loggable =
        !matches!(level, crate::config::LogLevel::Off) || are_log_filters_manually_set;

    if !is_loggable {
        return Ok(());
    }

    let directory = path.parent().context("Couldn't get log path's parent")?;
    std::fs::create_dir_all(directory)?;
    let file = std::fs::File::create(&path)?;

    let filters = if are_log_filters_manually_set {
        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("error".parse()?)
            .with_env_var(LOG_FILTER_ENV)
            .from_env_lossy()
    } else {
        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("off".parse()?)
            .parse_lossy("")
            .add_directive(format!("particle_image={level_as_string}").parse()?)
    };

    let logfile_layer = tracing_subscriber::fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_filter(filters);

    tracing_subscriber::registry().with(logfile_layer).try_init()?;

    *state.is_logging.write().await = true;

    Ok(())
}
