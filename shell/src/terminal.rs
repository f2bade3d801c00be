//! Terminal mode control.
//!
//! The line editor needs the terminal in raw mode (no line buffering, no local echo) while
//! it reads keystrokes, and back in its original mode before any command runs. The editor
//! only sees the [`Terminal`] trait; [`TtyTerminal`] is the real implementation.

use std::io;
use termion::raw::{IntoRawMode, RawTerminal};

/// Capability to switch a terminal into raw mode and back.
pub trait Terminal {
    /// Captures the current mode and switches to raw mode.
    fn enter_raw_mode(&mut self) -> io::Result<()>;

    /// Restores the mode captured by the last [`Terminal::enter_raw_mode`].
    ///
    /// Does nothing when no mode is captured.
    fn restore(&mut self) -> io::Result<()>;
}

/// Scoped raw mode: the terminal is restored when the guard goes out of scope,
/// whichever way that happens.
pub struct RawMode<'t, T: Terminal + ?Sized> {
    terminal: &'t mut T,
}

impl<'t, T: Terminal + ?Sized> RawMode<'t, T> {
    pub fn enter(terminal: &'t mut T) -> io::Result<Self> {
        terminal.enter_raw_mode()?;
        Ok(Self { terminal })
    }
}

impl<T: Terminal + ?Sized> Drop for RawMode<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.terminal.restore() {
            log::warn!("failed to restore terminal mode: {}", e);
        }
    }
}

/// The controlling terminal, driven through termion.
///
/// When stdin or stdout is not a tty (input piped from a file or another program) there is
/// no mode to change and both operations are no-ops.
pub struct TtyTerminal {
    interactive: bool,
    raw: Option<RawTerminal<io::Stdout>>,
}

impl TtyTerminal {
    pub fn new() -> Self {
        Self {
            interactive: termion::is_tty(&io::stdin()) && termion::is_tty(&io::stdout()),
            raw: None,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }
}

impl Default for TtyTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for TtyTerminal {
    fn enter_raw_mode(&mut self) -> io::Result<()> {
        if !self.interactive || self.raw.is_some() {
            return Ok(());
        }
        self.raw = Some(io::stdout().into_raw_mode()?);
        log::debug!("terminal switched to raw mode");
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        // Dropping the handle restores the saved mode too; suspending first surfaces errors.
        match self.raw.take() {
            Some(raw) => {
                raw.suspend_raw_mode()?;
                log::debug!("terminal mode restored");
                Ok(())
            }
            None => Ok(()),
        }
    }
}
