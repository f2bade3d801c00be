//! Turns a token sequence into a simple command: the argument vector plus an optional
//! output redirection.

use crate::lexer::Token;
use regex::Regex;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Matches the six operator spellings: an optional descriptor (`1` or `2`) followed by `>` or `>>`.
static REDIRECT_OPERATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([12]?)(>>?)$").expect("redirect operator pattern is valid"));

/// Stream that a redirection replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Standard output (`>`, `1>`, `>>`, `1>>`).
    Stdout,
    /// Standard error (`2>`, `2>>`).
    Stderr,
}

/// Output redirection of a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    /// The file that receives the stream.
    pub target: PathBuf,
    /// Which stream goes to the file.
    pub stream: Stream,
    /// Append to the file instead of truncating it.
    pub append: bool,
}

impl Redirection {
    /// Builds a redirection if `operator` is one of the recognized spellings.
    fn parse(operator: &str, target: &str) -> Option<Self> {
        let caps = REDIRECT_OPERATOR.captures(operator)?;
        let stream = match &caps[1] {
            "2" => Stream::Stderr,
            _ => Stream::Stdout,
        };
        Some(Self {
            target: PathBuf::from(target),
            stream,
            append: &caps[2] == ">>",
        })
    }

    /// Opens (creating if needed) the target file, relative to `base_dir`.
    pub fn open(&self, base_dir: &Path) -> io::Result<File> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.append)
            .truncate(!self.append)
            .open(base_dir.join(&self.target))
    }
}

/// A command ready for dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleCommand {
    /// Command name followed by its arguments.
    pub argv: Vec<String>,
    /// At most one redirection per line.
    pub redirect: Option<Redirection>,
}

/// Splits tokens into an argument vector and a redirection.
///
/// The first unquoted token that is exactly a redirection operator and has a token after
/// it wins: that next token is the target, and everything from the operator on is dropped
/// from `argv`. An operator with nothing after it stays an ordinary argument.
pub fn resolve(tokens: Vec<Token>) -> SimpleCommand {
    let found = tokens.iter().enumerate().find_map(|(pos, token)| {
        if token.is_quoted() {
            return None;
        }
        let target = tokens.get(pos + 1)?;
        Redirection::parse(token.as_str(), target.as_str()).map(|r| (pos, r))
    });

    let (end, redirect) = match found {
        Some((pos, redirect)) => (pos, Some(redirect)),
        None => (tokens.len(), None),
    };

    SimpleCommand {
        argv: tokens.into_iter().take(end).map(Token::into_string).collect(),
        redirect,
    }
}
