//! Terminal controls: two keys in, short prompts out

use std::borrow::Cow;
use std::io::Write;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::{Error, Result};

/// Logical user input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    /// Start or stop recording (spacebar)
    Toggle,
    /// End the conversation (return/enter)
    Terminate,
}

/// Status line shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Waiting for the first toggle
    Ready,
    /// Recording is on
    Recording,
    /// Recording stopped, utterance being finalized
    Processing,
    /// Recording stopped with nothing captured
    NothingRecorded,
    /// Utterance was silent and got replaced
    SilentUtterance,
    /// Device reported a status condition
    DeviceStatus(String),
    /// Terminate key pressed
    Terminated,
    /// Response finished, waiting for the next utterance
    NextTurn,
}

impl Prompt {
    /// Text to print for this prompt
    #[must_use]
    pub fn text(&self) -> Cow<'static, str> {
        match self {
            Self::Ready => Cow::Borrowed(
                "Press <spacebar> to START talking, press again to STOP. Press <return> to exit.",
            ),
            Self::Recording => Cow::Borrowed("Recording... Press <spacebar> again to stop."),
            Self::Processing => Cow::Borrowed("Processing..."),
            Self::NothingRecorded => Cow::Borrowed(
                "No audio recorded. Press <spacebar> to try again or <return> to exit.",
            ),
            Self::SilentUtterance => Cow::Borrowed("Warning: No audio detected. Please try again."),
            Self::DeviceStatus(status) => Cow::Owned(format!("Status: {status}")),
            Self::Terminated => Cow::Borrowed("Conversation terminated."),
            Self::NextTurn => Cow::Borrowed("Ready for next input. Press <spacebar> to start talking."),
        }
    }
}

/// The user-facing control surface of a capture session
pub trait Console {
    /// Prepare for non-blocking key reads
    ///
    /// # Errors
    ///
    /// Returns error if the terminal cannot be switched
    fn enter(&mut self) -> Result<()> {
        Ok(())
    }

    /// Undo [`Console::enter`]
    fn leave(&mut self) {}

    /// Wait up to `timeout` for a key command
    ///
    /// # Errors
    ///
    /// Returns error if input can no longer be read
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyCommand>>;

    /// Display a prompt
    fn show(&mut self, prompt: &Prompt);
}

/// Console on the controlling terminal (crossterm raw mode)
#[derive(Debug, Default)]
pub struct TerminalConsole {
    raw: bool,
}

impl TerminalConsole {
    /// Create a console; raw mode is only enabled while capturing
    #[must_use]
    pub const fn new() -> Self {
        Self { raw: false }
    }
}

impl Console for TerminalConsole {
    fn enter(&mut self) -> Result<()> {
        if !self.raw {
            terminal::enable_raw_mode().map_err(|e| Error::Input(e.to_string()))?;
            self.raw = true;
        }
        Ok(())
    }

    fn leave(&mut self) {
        if self.raw {
            if let Err(e) = terminal::disable_raw_mode() {
                tracing::warn!(error = %e, "failed to restore terminal mode");
            }
            self.raw = false;
        }
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyCommand>> {
        if !event::poll(timeout).map_err(|e| Error::Input(e.to_string()))? {
            return Ok(None);
        }
        match event::read().map_err(|e| Error::Input(e.to_string()))? {
            Event::Key(key) => Ok(map_key(&key)),
            _ => Ok(None),
        }
    }

    fn show(&mut self, prompt: &Prompt) {
        // Raw mode does not translate \n into \r\n
        let end = if self.raw { "\r\n" } else { "\n" };
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "{}{end}", prompt.text());
        let _ = stdout.flush();
    }
}

impl Drop for TerminalConsole {
    fn drop(&mut self) {
        self.leave();
    }
}

/// Translate a key press into a command
///
/// Ctrl-C terminates as well since raw mode swallows SIGINT.
#[must_use]
pub fn map_key(key: &KeyEvent) -> Option<KeyCommand> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    match key.code {
        KeyCode::Char(' ') => Some(KeyCommand::Toggle),
        KeyCode::Enter => Some(KeyCommand::Terminate),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyCommand::Terminate)
        }
        _ => None,
    }
}
