//! Wikitext parser.

pub use codemap::{Position, SourceSpan};
pub use config::ParserOptions;
use cursor::{Cursor, ParserCore};
pub use nodes::*;
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
pub use visit::Visitor;

mod codemap;
mod config;
mod cursor;
mod inline;
mod nodes;
mod parser;
mod table;
#[cfg(test)]
mod tests;
pub mod visit;

/// A parser error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The parse was cancelled through its [`CancellationToken`].
    #[error("parse cancelled")]
    Cancelled,
    /// Parser options could not be loaded.
    #[error("invalid parser options: {0}")]
    InvalidOptions(#[source] serde_json::Error),
}

/// The result type for parser operations.
pub type Result<T = (), E = Error> = core::result::Result<T, E>;

/// The severity of a [`Diagnostic`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Severity {
    /// Something was inferred from malformed input.
    Info,
    /// Input was recovered as plain text.
    Warning,
    /// Input could not be handled.
    Error,
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// A message about malformed input.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    /// The severity.
    pub severity: Severity,
    /// The message.
    pub message: String,
    /// The 0-based line number.
    pub line: usize,
    /// The 0-based column number.
    pub column: usize,
    /// The source text around the position.
    pub context: String,
}

impl core::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}:{}: {}: {} (near {:?})",
            self.line + 1,
            self.column + 1,
            self.severity,
            self.message,
            self.context
        )
    }
}

/// A cooperative cancellation signal for a parse.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a new token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every parse using this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The result of a parse.
#[derive(Clone, Debug)]
pub struct Output {
    /// The syntax tree.
    pub document: Document,
    /// Messages about malformed input.
    pub diagnostics: Vec<Diagnostic>,
}

/// A Wikitext parser.
///
/// A parser may be shared between threads. Each call to a parse method uses
/// its own parser state, which is taken from a single-slot pool if one is
/// free and allocated otherwise.
#[derive(Debug, Default)]
pub struct Parser {
    /// The configuration for the parser.
    options: ParserOptions,
    /// A free parser state, if there is one.
    pool: Mutex<Option<Box<ParserCore>>>,
}

impl Parser {
    /// Creates a new parser with the given options.
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            pool: Mutex::new(None),
        }
    }

    /// The parser options.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parses Wikitext from `text` into a syntax tree.
    pub fn parse(&self, text: &str) -> Document {
        self.parse_with_diagnostics(text).document
    }

    /// Parses Wikitext from `text` into a syntax tree, also returning
    /// diagnostics.
    pub fn parse_with_diagnostics(&self, text: &str) -> Output {
        match self.run(text, None) {
            Ok(output) => output,
            Err(err) => unreachable!("uncancellable parse failed: {err}"),
        }
    }

    /// Parses Wikitext from `text` into a syntax tree, stopping with
    /// [`Error::Cancelled`] if `token` is cancelled.
    pub fn parse_cancellable(&self, text: &str, token: &CancellationToken) -> Result<Output> {
        self.run(text, Some(token))
    }

    /// Runs a parse with a pooled parser state.
    fn run(&self, text: &str, cancel: Option<&CancellationToken>) -> Result<Output> {
        let mut core = self
            .pool
            .try_lock()
            .and_then(|mut slot| slot.take())
            .unwrap_or_default();

        let mut cursor = Cursor::new(text, &mut core, &self.options, cancel);
        let result = parser::document(&mut cursor).map(|document| Output {
            document,
            diagnostics: cursor.finish(),
        });

        if result.is_ok()
            && let Some(mut slot) = self.pool.try_lock()
            && slot.is_none()
        {
            *slot = Some(core);
        }

        result
    }
}

/// Creates a regular expression alternation of URL protocols.
pub(crate) fn protocols_regex<'a>(protocols: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for proto in protocols {
        if !out.is_empty() {
            out.push('|');
        }
        out += &regex::escape(proto);
    }
    out
}
