//! Just `main()`. Keep as small as possible.

use color_eyre::eyre::Result;

use particle_image::{run, shared_state::SharedState};

#[expect(
    clippy::print_stdout,
    clippy::print_stderr,
    reason = "It's our central place for communicating with the user on CLI"
)]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let (protocol_tx, _) = tokio::sync::broadcast::channel(64);
    let state_arc = SharedState::init(protocol_tx);
    let result = run::run(&state_arc).await;

    let logpath = state_arc.config.read().await.log_path.clone();
    let is_logging = *state_arc.is_logging.read().await;
    tracing::debug!("Exiting");

    match result {
        Ok(()) => {
            if is_logging {
                println!("Logs saved to {}", logpath.display());
            }
        }
        Err(error) => {
            tracing::error!("{error:?}");
            eprintln!("Error: {error}");
            if is_logging {
                eprintln!("See {} for more details", logpath.display());
            }
            #[expect(clippy::exit, reason = "Errors should give a non-zero exit code")]
            std::process::exit(1);
        }
    }

    Ok(())
}
