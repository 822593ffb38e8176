//! Handle all the raw input directly from the end user.

use std::io::Read as _;

use color_eyre::eyre::Result;
use termwiz::input::{InputEvent, KeyCode, KeyEvent, Modifiers};

/// Bytes from STDIN
type BytesFromSTDIN = [u8; 128];

/// Handle input from the user
pub(crate) struct Input {
    /// The main protocol channel.
    protocol_tx: tokio::sync::broadcast::Sender<crate::run::Protocol>,
}

impl Input {
    /// Start a thread to listen and parse the end user's STDIN and forward it to the rest of the
    /// application.
    pub fn start(
        protocol_tx: tokio::sync::broadcast::Sender<crate::run::Protocol>,
    ) -> std::thread::JoinHandle<Result<()>> {
        // The Tokio docs suggest using `std::thread` to listen on STDIN for interactive
        // applications.
        std::thread::spawn(move || -> Result<()> {
            let protocol_for_shutdown = protocol_tx.clone();
            let input = Self { protocol_tx };
            let result = input.consume_stdin();
            if let Err(error) = result {
                crate::run::broadcast_protocol_end(&protocol_for_shutdown);
                return Err(error);
            }
            Ok(())
        })
    }

    /// Listen to the end user's STDIN and parse the bytes into keyboard and mouse events.
    fn consume_stdin(&self) -> Result<()> {
        tracing::debug!("Starting to listen on STDIN");

        let stdin = std::io::stdin();
        let mut reader = std::io::BufReader::new(stdin);
        let mut parser = termwiz::input::InputParser::new();

        loop {
            let mut buffer: BytesFromSTDIN = [0; 128];
            let count = reader.read(&mut buffer[..])?;
            if count == 0 {
                tracing::debug!("STDIN closed");
                return Ok(());
            }

            let Some(bytes) = buffer.get(0..count) else {
                tracing::warn!("Couldn't get bytes from STDIN input buffer");
                continue;
            };
            tracing::trace!("Received STDIN input: {bytes:x?}");

            let mut is_quitting = false;
            parser.parse(
                bytes,
                |event| {
                    is_quitting |= self.parsed_event_callback(event);
                },
                count == buffer.len(),
            );

            if is_quitting {
                crate::run::broadcast_protocol_end(&self.protocol_tx);
                return Ok(());
            }
        }
    }

    /// The callback for when the input parser detects known keyboard/mouse events. Returns
    /// whether the user asked to quit.
    fn parsed_event_callback(&self, event: InputEvent) -> bool {
        tracing::trace!("Parsed input event: {event:?}");

        if Self::is_quit_event(&event) {
            tracing::debug!("User asked to quit");
            return true;
        }

        let result = self.protocol_tx.send(crate::run::Protocol::Input(event));
        if let Err(error) = result {
            tracing::error!("Error sending input event from thread to task: {error:?}");
        }
        false
    }

    /// `q`, `Esc` and `Ctrl+C` all quit.
    #[expect(
        clippy::wildcard_enum_match_arm,
        reason = "We only care about a few keys"
    )]
    fn is_quit_event(event: &InputEvent) -> bool {
        let InputEvent::Key(KeyEvent { key, modifiers }) = event else {
            return false;
        };

        match key {
            KeyCode::Escape => true,
            KeyCode::Char('q') => modifiers.is_empty(),
            KeyCode::Char('c' | 'C') => modifiers.contains(Modifiers::CTRL),
            _ => false,
        }
    }
}
