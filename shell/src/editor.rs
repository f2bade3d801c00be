//! Raw-mode line editing: prompt, echo, backspace and tab completion over a byte stream.
//!
//! The editor is a synchronous state machine. It blocks on one byte of input at a time,
//! updates an [`EditorState`] and redraws the visible line. A finished line is handed back
//! to the caller; tokenizing and dispatching it happen outside of raw mode.

use crate::completion::{Completer, Completion};
use crate::lexer;
use crate::terminal::{RawMode, Terminal};
use std::io::{self, ErrorKind, Read, Write};
use termion::clear;
use thiserror::Error;

/// Printed before every line.
pub const PROMPT: &str = "$ ";

/// Raw mode turns off output post-processing, so a bare `\n` would not return the carriage.
const NEWLINE: &str = "\r\n";
const BELL: &str = "\x07";

/// Errors that end an editing session. The terminal mode is restored before any of them
/// reaches the caller.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("cannot change terminal mode: {0}")]
    Terminal(#[source] io::Error),
    #[error("error reading input: {0}")]
    Read(#[source] io::Error),
    #[error("error writing to terminal: {0}")]
    Write(#[source] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Tab,
    Enter,
    Backspace,
    Interrupt,
    EndOfTransmission,
    Escape,
    Ignored,
    Other(u8),
}

impl From<u8> for Key {
    fn from(byte: u8) -> Self {
        match byte {
            b'\t' => Key::Tab,
            b'\n' | b'\r' => Key::Enter,
            0x7f | 0x08 => Key::Backspace,
            0x03 => Key::Interrupt,
            0x04 => Key::EndOfTransmission,
            0x1b => Key::Escape,
            control if control < 0x20 => Key::Ignored,
            other => Key::Other(other),
        }
    }
}

enum Step {
    Continue,
    Submit,
    EndOfInput,
}

/// The line being edited.
#[derive(Debug, Default)]
struct EditorState {
    buffer: Vec<u8>,
    /// Set after a tab press found several candidates; the next tab lists them.
    tab_armed: bool,
}

impl EditorState {
    fn push(&mut self, byte: u8) {
        self.buffer.push(byte);
        self.tab_armed = false;
    }

    /// Removes the last character, including every byte of a multi-byte UTF-8 sequence.
    fn erase_last_char(&mut self) -> bool {
        let Some(mut last) = self.buffer.pop() else {
            return false;
        };
        while last & 0xC0 == 0x80 {
            match self.buffer.pop() {
                Some(byte) => last = byte,
                None => break,
            }
        }
        true
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.tab_armed = false;
    }

    fn line(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }
}

/// Reads lines from `input`, echoing and redrawing on `output`.
pub struct LineEditor<R, W> {
    input: R,
    output: W,
    completer: Completer,
}

impl<R: Read, W: Write> LineEditor<R, W> {
    pub fn new(input: R, output: W, completer: Completer) -> Self {
        Self {
            input,
            output,
            completer,
        }
    }

    /// Prompts and reads one line.
    ///
    /// Returns `Ok(None)` at the end of input (Ctrl-D on an empty line, or the input stream
    /// closing with nothing typed). The terminal is in raw mode only for the duration of
    /// this call.
    pub fn read_line<T: Terminal + ?Sized>(
        &mut self,
        terminal: &mut T,
    ) -> Result<Option<String>, EditorError> {
        let _raw = RawMode::enter(terminal).map_err(EditorError::Terminal)?;
        let mut state = EditorState::default();
        self.write(PROMPT)?;

        loop {
            let Some(byte) = self.read_byte()? else {
                if state.buffer.is_empty() {
                    return Ok(None);
                }
                self.write(NEWLINE)?;
                return Ok(Some(state.line()));
            };

            match self.handle_key(Key::from(byte), &mut state)? {
                Step::Continue => {}
                Step::Submit => return Ok(Some(state.line())),
                Step::EndOfInput => return Ok(None),
            }
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>, EditorError> {
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(EditorError::Read(e)),
            }
        }
    }

    fn handle_key(&mut self, key: Key, state: &mut EditorState) -> Result<Step, EditorError> {
        log::trace!("key {:?}", key);
        match key {
            Key::Tab => self.complete(state)?,
            Key::Enter => {
                self.write(NEWLINE)?;
                return Ok(Step::Submit);
            }
            Key::Backspace => {
                state.tab_armed = false;
                if state.erase_last_char() {
                    self.redraw(state)?;
                }
            }
            Key::Interrupt => {
                state.clear();
                self.write(format!("^C{}{}", NEWLINE, PROMPT))?;
            }
            Key::EndOfTransmission if state.buffer.is_empty() => {
                self.write(NEWLINE)?;
                return Ok(Step::EndOfInput);
            }
            Key::Escape => self.skip_escape_sequence()?,
            Key::EndOfTransmission | Key::Ignored => {}
            Key::Other(byte) => {
                state.push(byte);
                self.write([byte])?;
            }
        }
        Ok(Step::Continue)
    }

    /// Drops the rest of an escape sequence. Arrow, function and Alt keys do nothing.
    fn skip_escape_sequence(&mut self) -> Result<(), EditorError> {
        match self.read_byte()? {
            Some(b'[') => {
                // Parameter and intermediate bytes run up to a final byte in `@`..=`~`.
                while let Some(byte) = self.read_byte()? {
                    if (0x40..=0x7e).contains(&byte) {
                        break;
                    }
                }
            }
            Some(b'O') => {
                self.read_byte()?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Completes the first word of the line, the command name, leaving the rest of the
    /// buffer in place. A quoted or escaped first word is never completed.
    fn complete(&mut self, state: &mut EditorState) -> Result<(), EditorError> {
        if state.buffer.is_empty() {
            return Ok(());
        }

        let line = state.line();
        let tokens = lexer::tokenize(&line);
        let first = match tokens.first() {
            Some(token) if !token.is_quoted() => token,
            _ => {
                state.tab_armed = false;
                return self.write(BELL);
            }
        };
        // An unquoted word is spelled in the buffer exactly as in the token.
        let start = line.len() - line.trim_start_matches([' ', '\t']).len();
        let end = start + first.as_str().len();
        let completion = self.completer.complete(first.as_str());

        match completion {
            Completion::NoMatch => {
                state.tab_armed = false;
                self.write(BELL)
            }
            Completion::Replace(text) => {
                state.tab_armed = false;
                // The rest of the line already starts with a blank.
                let text = if first.is_spaced() {
                    text.trim_end()
                } else {
                    text.as_str()
                };
                state.buffer =
                    format!("{}{}{}", &line[..start], text, &line[end..]).into_bytes();
                self.redraw(state)
            }
            Completion::Ambiguous(candidates) if state.tab_armed => {
                state.tab_armed = false;
                let listing = format!("{}{}{}{}", NEWLINE, candidates.join("  "), NEWLINE, PROMPT);
                self.write(listing)?;
                self.write(&state.buffer)
            }
            Completion::Ambiguous(_) => {
                state.tab_armed = true;
                self.write(BELL)
            }
        }
    }

    /// Clears the visible line and prints the prompt and buffer again.
    fn redraw(&mut self, state: &EditorState) -> Result<(), EditorError> {
        self.write(format!("\r{}{}", clear::CurrentLine, PROMPT))?;
        self.write(&state.buffer)
    }

    fn write(&mut self, bytes: impl AsRef<[u8]>) -> Result<(), EditorError> {
        self.output
            .write_all(bytes.as_ref())
            .and_then(|()| self.output.flush())
            .map_err(EditorError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::NAMES;
    use crate::terminal::testing::{FakeTerminal, Mode};
    use std::io::Cursor;

    fn editor(input: &[u8]) -> LineEditor<Cursor<Vec<u8>>, Vec<u8>> {
        LineEditor::new(
            Cursor::new(input.to_vec()),
            Vec::new(),
            Completer::new(NAMES, None),
        )
    }

    fn output_of<R>(editor: &LineEditor<R, Vec<u8>>) -> String {
        String::from_utf8_lossy(&editor.output).into_owned()
    }

    /// Yields its bytes, then fails instead of reporting end of input.
    struct FailingReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::new(ErrorKind::BrokenPipe, "device gone")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_reads_a_line_and_echoes_it() {
        let mut term = FakeTerminal::new();
        let mut ed = editor(b"echo hi\n");

        let line = ed.read_line(&mut term).unwrap();

        assert_eq!(line.as_deref(), Some("echo hi"));
        assert_eq!(output_of(&ed), "$ echo hi\r\n");
        assert_eq!(term.mode, Mode::COOKED);
        assert_eq!(term.entered, 1);
    }

    #[test]
    fn test_carriage_return_submits() {
        let mut term = FakeTerminal::new();
        let mut ed = editor(b"pwd\rls\r");

        assert_eq!(ed.read_line(&mut term).unwrap().as_deref(), Some("pwd"));
        assert_eq!(ed.read_line(&mut term).unwrap().as_deref(), Some("ls"));
        assert_eq!(term.entered, 2);
    }

    #[test]
    fn test_backspace_erases_last_char() {
        let mut term = FakeTerminal::new();
        let mut ed = editor(b"\x7f\x7fecx\x7fho\n");

        assert_eq!(ed.read_line(&mut term).unwrap().as_deref(), Some("echo"));
        assert!(output_of(&ed).contains("\r\x1b[2K$ ec"));
    }

    #[test]
    fn test_backspace_erases_whole_multibyte_char() {
        let mut term = FakeTerminal::new();
        let mut ed = editor("é\x7fa\n".as_bytes());

        assert_eq!(ed.read_line(&mut term).unwrap().as_deref(), Some("a"));
    }

    #[test]
    fn test_end_of_input() {
        let mut term = FakeTerminal::new();
        assert_eq!(editor(b"").read_line(&mut term).unwrap(), None);
        assert_eq!(editor(b"\x04").read_line(&mut term).unwrap(), None);
        assert_eq!(
            editor(b"pwd").read_line(&mut term).unwrap().as_deref(),
            Some("pwd")
        );
        assert_eq!(
            editor(b"ab\x04c\n").read_line(&mut term).unwrap().as_deref(),
            Some("abc")
        );
        assert_eq!(term.mode, Mode::COOKED);
    }

    #[test]
    fn test_interrupt_abandons_line() {
        let mut term = FakeTerminal::new();
        let mut ed = editor(b"abc\x03ls\n");

        assert_eq!(ed.read_line(&mut term).unwrap().as_deref(), Some("ls"));
        assert!(output_of(&ed).contains("abc^C\r\n$ ls"));
    }

    #[test]
    fn test_tab_on_empty_buffer_is_ignored() {
        let mut term = FakeTerminal::new();
        let mut ed = editor(b"\t\n");

        assert_eq!(ed.read_line(&mut term).unwrap().as_deref(), Some(""));
        assert_eq!(output_of(&ed), "$ \r\n");
    }

    #[test]
    fn test_tab_completes_unique_builtin() {
        let mut term = FakeTerminal::new();
        let mut ed = editor(b"ech\thello\n");

        assert_eq!(
            ed.read_line(&mut term).unwrap().as_deref(),
            Some("echo hello")
        );
        assert!(output_of(&ed).contains("\r\x1b[2K$ echo "));
    }

    #[test]
    fn test_tab_without_match_rings_bell() {
        let mut term = FakeTerminal::new();
        let mut ed = editor(b"zzz\t\n");

        assert_eq!(ed.read_line(&mut term).unwrap().as_deref(), Some("zzz"));
        assert_eq!(output_of(&ed), "$ zzz\x07\r\n");
    }

    #[test]
    fn test_tab_completes_first_word_and_keeps_the_rest() {
        let mut term = FakeTerminal::new();
        let mut ed = editor(b"ech hello\t\n");

        assert_eq!(
            ed.read_line(&mut term).unwrap().as_deref(),
            Some("echo hello")
        );
        assert!(output_of(&ed).ends_with("\r\x1b[2K$ echo hello\r\n"));

        let mut ed = editor(b"  ech  a b\t\n");
        assert_eq!(
            ed.read_line(&mut term).unwrap().as_deref(),
            Some("  echo  a b")
        );

        let mut ed = editor(b"echo ex\t\n");
        assert_eq!(ed.read_line(&mut term).unwrap().as_deref(), Some("echo ex"));
    }

    #[test]
    fn test_tab_on_unknown_or_quoted_first_word_rings_bell() {
        let mut term = FakeTerminal::new();
        let mut ed = editor(b"zzz hello\t\n");
        assert_eq!(
            ed.read_line(&mut term).unwrap().as_deref(),
            Some("zzz hello")
        );
        assert_eq!(output_of(&ed), "$ zzz hello\x07\r\n");

        let mut ed = editor(b"'ech' x\t\n");
        assert_eq!(ed.read_line(&mut term).unwrap().as_deref(), Some("'ech' x"));
        assert_eq!(output_of(&ed), "$ 'ech' x\x07\r\n");
    }

    #[test]
    fn test_escape_sequences_are_dropped() {
        let mut term = FakeTerminal::new();
        let mut ed = editor(b"ls\x1b[A\x1b[1;5C\x1bOB!\n");

        assert_eq!(ed.read_line(&mut term).unwrap().as_deref(), Some("ls!"));
        assert_eq!(output_of(&ed), "$ ls!\r\n");
    }

    #[test]
    fn test_first_ambiguous_tab_only_beeps() {
        let mut term = FakeTerminal::new();
        let mut ed = editor(b"e\t");

        assert_eq!(ed.read_line(&mut term).unwrap().as_deref(), Some("e"));
        let out = output_of(&ed);
        assert!(out.contains('\x07'));
        assert!(!out.contains("echo  exit"));
    }

    #[test]
    fn test_second_ambiguous_tab_lists_candidates() {
        let mut term = FakeTerminal::new();
        let mut ed = editor(b"e\t\t");

        assert_eq!(ed.read_line(&mut term).unwrap().as_deref(), Some("e"));
        assert_eq!(output_of(&ed), "$ e\x07\r\necho  exit\r\n$ e\r\n");
    }

    #[test]
    fn test_typing_between_tabs_disarms_listing() {
        let mut term = FakeTerminal::new();
        let mut ed = editor(b"e\tx\x7f\t");

        assert_eq!(ed.read_line(&mut term).unwrap().as_deref(), Some("e"));
        let out = output_of(&ed);
        assert_eq!(out.matches('\x07').count(), 2);
        assert!(!out.contains("echo  exit"));
    }

    #[test]
    #[cfg(unix)]
    fn test_tab_extends_to_common_prefix() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        for name in ["xyz_foo_bar", "xyz_foo_baz"] {
            let path = dir.path().join(name);
            std::fs::File::create(&path).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        let mut term = FakeTerminal::new();
        let mut ed = LineEditor::new(
            Cursor::new(b"xyz\t\n".to_vec()),
            Vec::new(),
            Completer::new(NAMES, Some(dir.path().as_os_str().to_owned())),
        );

        assert_eq!(ed.read_line(&mut term).unwrap().as_deref(), Some("xyz_foo_ba"));
    }

    #[test]
    fn test_read_error_restores_terminal() {
        let mut term = FakeTerminal::new();
        let original = term.mode;
        let mut ed = LineEditor::new(
            FailingReader {
                data: Cursor::new(b"ech".to_vec()),
            },
            Vec::new(),
            Completer::new(NAMES, None),
        );

        let err = ed.read_line(&mut term).unwrap_err();

        assert!(matches!(err, EditorError::Read(_)));
        assert_eq!(term.entered, 1);
        assert_eq!(term.mode, original);
    }
}
