//! Lexical analysis of a command line: splitting it into words while honoring quotes and escapes.

/// One word of a command line, with its quotes and escapes already removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    text: String,
    quoted: bool,
    spaced: bool,
}

impl Token {
    /// Creates a token as if it had been typed unquoted and followed by a blank.
    pub fn bare(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
            spaced: true,
        }
    }

    /// The unquoted text of the word.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether any part of the word came from a quoted segment or a backslash escape.
    ///
    /// Quoted words are always plain arguments, never operators.
    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// Whether the word ended on a word boundary (an unquoted blank followed it)
    /// rather than at the end of the input.
    pub fn is_spaced(&self) -> bool {
        self.spaced
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl PartialEq<&str> for Token {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Bare,
    SingleQuote,
    DoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
    quoted: bool,
    tokens: Vec<Token>,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Bare,
            buffer: String::new(),
            quoted: false,
            tokens: Vec::new(),
        }
    }

    /// Runs the machine over the whole input.
    ///
    /// An unterminated quote is closed at the end of the input, so this never fails.
    fn make_tokens(mut self) -> Vec<Token> {
        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Bare => self.handle_bare(ch),
                LexingState::SingleQuote => self.handle_single_quote(ch),
                LexingState::DoubleQuote => self.handle_double_quote(ch),
            }
        }

        self.flush(false);
        self.tokens
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_bare(&mut self, ch: char) {
        match ch {
            ' ' | '\t' => self.flush(true),
            '\'' => {
                self.quoted = true;
                self.state = LexingState::SingleQuote;
            }
            '"' => {
                self.quoted = true;
                self.state = LexingState::DoubleQuote;
            }
            '\\' => {
                self.quoted = true;
                // A lone backslash at the very end is kept as is.
                let escaped = self.read_char().unwrap_or('\\');
                self.buffer.push(escaped);
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.close_quote(),
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.close_quote(),
            '\\' => match self.peek_char() {
                Some(next @ ('\\' | '"' | '$')) => {
                    self.read_char();
                    self.buffer.push(next);
                }
                _ => self.buffer.push('\\'),
            },
            c => self.buffer.push(c),
        }
    }

    /// Leaves the current quoted segment. A quote directly after the closing one opens
    /// the next segment of the same word without passing through bare mode.
    fn close_quote(&mut self) {
        self.state = match self.peek_char() {
            Some('\'') => {
                self.read_char();
                LexingState::SingleQuote
            }
            Some('"') => {
                self.read_char();
                LexingState::DoubleQuote
            }
            _ => LexingState::Bare,
        };
    }

    fn flush(&mut self, spaced: bool) {
        if !self.buffer.is_empty() {
            self.tokens.push(Token {
                text: std::mem::take(&mut self.buffer),
                quoted: self.quoted,
                spaced,
            });
        }
        self.quoted = false;
    }
}

/// Splits a command line into words.
///
/// Blanks separate words outside of quotes. Single quotes keep everything literally;
/// double quotes only honor `\\`, `\"` and `\$`; a bare backslash escapes any character.
/// Empty words (e.g. `''`) are dropped.
pub fn tokenize(line: &str) -> Vec<Token> {
    LexingFSM::new(line).make_tokens()
}

/// Texts of the given tokens, in order.
pub fn words(tokens: &[Token]) -> Vec<String> {
    tokens.iter().map(|t| t.as_str().to_string()).collect()
}
