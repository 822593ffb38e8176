//! Render frames to the user's terminal

use std::io::Write as _;
use std::sync::Arc;

use color_eyre::eyre::Result;
use tokio::sync::mpsc;

use termwiz::surface::Change as TermwizChange;
use termwiz::terminal::buffered::BufferedTerminal;
use termwiz::terminal::{ScreenSize, Terminal as TermwizTerminal};

use crate::shared_state::SharedState;
use crate::surface::Surface;

/// Report every mouse movement, not just clicks and drags, using SGR coordinates.
const ENABLE_MOUSE_REPORTING: &str = "\x1b[?1003h\x1b[?1006h";

/// Undo `ENABLE_MOUSE_REPORTING`.
const DISABLE_MOUSE_REPORTING: &str = "\x1b[?1006l\x1b[?1003l";

/// How often to check for resizes when no frames are arriving.
const RESIZE_POLL: std::time::Duration = std::time::Duration::from_millis(250);

/// Owns the user's terminal for the lifetime of the app.
pub(crate) struct Terminal {
    /// Shared app state
    pub state: Arc<SharedState>,
    /// The terminal's width
    pub width: u16,
    /// The terminal's height
    pub height: u16,
}

impl Terminal {
    /// Create a renderer to render to a user's terminal
    pub fn new(state: Arc<SharedState>) -> Result<Self> {
        let size = Self::get_users_tty_size()?;
        Ok(Self {
            state,
            width: size.cols.try_into()?,
            height: size.rows.try_into()?,
        })
    }

    /// Instantiate and run
    pub fn start(
        state: Arc<SharedState>,
        protocol_tx: tokio::sync::broadcast::Sender<crate::run::Protocol>,
    ) -> (tokio::task::JoinHandle<Result<()>>, mpsc::Sender<Surface>) {
        let (frames_tx, frames_rx) = mpsc::channel(2);
        let protocol_rx = protocol_tx.subscribe();
        let handle = tokio::spawn(async move {
            match Self::new(Arc::clone(&state)) {
                Ok(mut terminal) => {
                    let result = terminal
                        .run(frames_rx, protocol_rx, protocol_tx.clone())
                        .await;

                    if let Err(error) = result {
                        crate::run::broadcast_protocol_end(&protocol_tx);
                        return Err(error);
                    }
                }
                Err(error) => {
                    crate::run::broadcast_protocol_end(&protocol_tx);
                    return Err(error);
                }
            }

            Ok(())
        });

        (handle, frames_tx)
    }

    /// We need this just because `BufferedTerminal::new()` can't take a `Box<dyn Terminal>`.
    fn get_termwiz_terminal() -> Result<impl TermwizTerminal> {
        let capabilities = termwiz::caps::Capabilities::new_from_env()?;
        Ok(termwiz::terminal::new_terminal(capabilities)?)
    }

    /// Just for initialisation
    pub fn get_users_tty_size() -> Result<ScreenSize> {
        let mut terminal = Self::get_termwiz_terminal()?;
        Ok(terminal.get_screen_size()?)
    }

    /// Get the user's current terminal size and propogate it
    async fn handle_resize<T: TermwizTerminal + Send>(
        &mut self,
        buffered_terminal: &mut BufferedTerminal<T>,
        protocol_tx: &tokio::sync::broadcast::Sender<crate::run::Protocol>,
    ) -> Result<()> {
        let is_resized = buffered_terminal.check_for_resize()?;
        if !is_resized {
            return Ok(());
        }

        buffered_terminal.repaint()?;

        let (width, height) = buffered_terminal.dimensions();
        self.width = width.try_into()?;
        self.height = height.try_into()?;
        tracing::debug!("Terminal resized to {}x{}", self.width, self.height);
        self.state.set_tty_size(self.width, self.height).await;
        protocol_tx.send(crate::run::Protocol::Resize {
            width: self.width,
            height: self.height,
        })?;

        Ok(())
    }

    /// Write raw bytes straight to the user's terminal.
    fn write_escape(sequence: &str) -> Result<()> {
        let mut stdout = std::io::stdout();
        stdout.write_all(sequence.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }

    /// Listen for frames from the scene. It lives in its own method so that we can catch any
    /// errors and ensure that the user's terminal is always returned to cooked mode.
    async fn run(
        &mut self,
        mut frames: mpsc::Receiver<Surface>,
        mut protocol_rx: tokio::sync::broadcast::Receiver<crate::run::Protocol>,
        protocol_tx: tokio::sync::broadcast::Sender<crate::run::Protocol>,
    ) -> Result<()> {
        tracing::debug!("Putting user's terminal into raw mode");
        let mut users_terminal = Self::get_termwiz_terminal()?;
        users_terminal.set_raw_mode()?;
        users_terminal.enter_alternate_screen()?;
        Self::write_escape(ENABLE_MOUSE_REPORTING)?;
        let mut buffered_terminal = BufferedTerminal::new(users_terminal)?;
        buffered_terminal.add_change(TermwizChange::CursorVisibility(
            termwiz::surface::CursorVisibility::Hidden,
        ));

        let result = self
            .render_loop(&mut frames, &mut protocol_rx, &protocol_tx, &mut buffered_terminal)
            .await;

        tracing::debug!("Setting user's terminal to cooked mode");
        Self::write_escape(DISABLE_MOUSE_REPORTING)?;
        buffered_terminal.add_change(TermwizChange::CursorVisibility(
            termwiz::surface::CursorVisibility::Visible,
        ));
        buffered_terminal.flush()?;
        buffered_terminal.terminal().exit_alternate_screen()?;
        buffered_terminal.terminal().set_cooked_mode()?;

        result
    }

    /// Render every frame until the app ends.
    async fn render_loop<T: TermwizTerminal + Send>(
        &mut self,
        frames: &mut mpsc::Receiver<Surface>,
        protocol_rx: &mut tokio::sync::broadcast::Receiver<crate::run::Protocol>,
        protocol_tx: &tokio::sync::broadcast::Sender<crate::run::Protocol>,
        buffered_terminal: &mut BufferedTerminal<T>,
    ) -> Result<()> {
        let mut resize_poll = tokio::time::interval(RESIZE_POLL);

        tracing::debug!("Starting render loop");
        #[expect(
            clippy::integer_division_remainder_used,
            reason = "`tokio::select! generates this.`"
        )]
        loop {
            tokio::select! {
                Some(frame) = frames.recv() => {
                    self.handle_resize(buffered_terminal, protocol_tx).await?;
                    self.render(&frame, buffered_terminal)?;
                }
                _ = resize_poll.tick() => {
                    self.handle_resize(buffered_terminal, protocol_tx).await?;
                }
                Ok(message) = protocol_rx.recv() => {
                    if matches!(message, crate::run::Protocol::End) {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Exited render loop");

        Ok(())
    }

    /// Do a single render to the user's actual terminal. It uses a diffing algorithm to make
    /// the minimum number of changes.
    fn render<T: TermwizTerminal>(
        &self,
        frame: &Surface,
        buffered_terminal: &mut BufferedTerminal<T>,
    ) -> Result<()> {
        let is_current_size =
            (frame.width, frame.height) == (usize::from(self.width), usize::from(self.height));
        if !is_current_size {
            tracing::trace!(
                "Dropping frame for old terminal size {}x{}",
                frame.width,
                frame.height
            );
            return Ok(());
        }

        buffered_terminal.draw_from_screen(&frame.surface, 0, 0);

        // This is where we actually render to the user's real terminal.
        buffered_terminal.flush()?;

        Ok(())
    }
}
