//! Tokenizing and backtracking primitives.
//!
//! A [`Cursor`] walks a single immutable input string. Every attempt to parse
//! a construct opens a [`Context`] first, and then either accepts it (keeping
//! the advance) or rolls it back (restoring the position at which the
//! context was opened). Contexts carry an optional terminator pattern which
//! tells the code running inside them where to stop.

use super::{
    CancellationToken, Diagnostic, Error, ParserOptions, Result, Severity,
    codemap::{Position, SourceSpan},
    nodes::{Inline, NodeMeta},
};
use fancy_regex::Regex;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, LazyLock},
};

/// A compiled pattern, in forms suitable for matching at a position and for
/// searching forward from a position.
#[derive(Debug)]
pub(super) struct Pattern {
    /// The pattern source.
    source: String,
    /// The pattern, anchored to the start of the haystack.
    anchored: Regex,
    /// The unanchored pattern.
    search: Regex,
}

impl Pattern {
    /// Compiles a pattern.
    fn new(source: &str) -> Self {
        let compile = |pattern: &str| {
            Regex::new(pattern).unwrap_or_else(|err| panic!("bad pattern {pattern:?}: {err}"))
        };
        Self {
            source: source.to_string(),
            anchored: compile(&format!("^(?:{source})")),
            search: compile(source),
        }
    }

    /// Matches the pattern at byte offset `at` of `text`, returning the end
    /// offset of the match.
    pub fn match_at(&self, text: &str, at: usize) -> Option<usize> {
        match self.anchored.find(&text[at..]) {
            Ok(m) => m.map(|m| at + m.end()),
            Err(err) => {
                log::warn!("pattern {:?} failed at {at}: {err}", self.source);
                None
            }
        }
    }

    /// Finds the first match of the pattern at or after byte offset `from`,
    /// returning its start and end offsets.
    pub fn find_from(&self, text: &str, from: usize) -> Option<(usize, usize)> {
        match self.search.find_from_pos(text, from) {
            Ok(m) => m.map(|m| (m.start(), m.end())),
            Err(err) => {
                log::warn!("pattern {:?} failed from {from}: {err}", self.source);
                None
            }
        }
    }
}

/// Process-wide compiled pattern cache.
static PATTERNS: LazyLock<Mutex<HashMap<String, Arc<Pattern>>>> =
    LazyLock::new(Default::default);

/// Gets the compiled form of `source` from the pattern cache, compiling it if
/// necessary.
pub(super) fn pattern(source: &str) -> Arc<Pattern> {
    let mut cache = PATTERNS.lock();
    if let Some(pattern) = cache.get(source) {
        return Arc::clone(pattern);
    }
    let pattern = Arc::new(Pattern::new(source));
    cache.insert(source.to_string(), Arc::clone(&pattern));
    pattern
}

/// A speculative parse frame.
#[derive(Debug)]
struct Context {
    /// The cursor position when the context was opened.
    start: Position,
    /// The pattern that stops parsing inside this context.
    terminator: Option<Arc<Pattern>>,
    /// If true, terminators of enclosing contexts are ignored.
    overrides: bool,
}

/// Bracketed constructs whose outcome depends only on their start position.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(super) enum Construct {
    /// `{{{name|default}}}`
    ArgumentReference,
    /// `[url text]`
    ExternalLink,
    /// `<tag>` and `<ext>`
    Tag,
    /// `{{name|args}}`
    Template,
    /// `[[target|text]]` and `[[File:x|args]]`
    WikiLink,
}

/// Reusable per-parse state.
#[derive(Debug, Default)]
pub(crate) struct ParserCore {
    /// The context stack.
    contexts: Vec<Context>,
    /// Collected diagnostics.
    diagnostics: Vec<Diagnostic>,
    /// Finished bracketed construct attempts, with the result and end
    /// position of the successful ones.
    memo: HashMap<(Construct, usize, bool), Option<(Inline, Position)>>,
    /// For each searched pattern, the last search origin and its result.
    searches: HashMap<String, (usize, Option<(usize, usize)>)>,
    /// Positions where a recovery or inference diagnostic was already
    /// emitted.
    reported: HashSet<(usize, Severity)>,
}

impl ParserCore {
    /// Clears all per-parse state, keeping allocations.
    pub fn reset(&mut self) {
        self.contexts.clear();
        self.diagnostics.clear();
        self.memo.clear();
        self.searches.clear();
        self.reported.clear();
    }
}

/// The maximum number of bracketed constructs and tables that may be open
/// at once. Deeper openers are read as text.
pub(super) const MAX_NESTING: usize = 32;

/// The cursor of a single parse.
pub(super) struct Cursor<'a> {
    /// The input text.
    text: &'a str,
    /// The current position.
    pos: Position,
    /// Mutable parser state.
    core: &'a mut ParserCore,
    /// Parser options.
    pub options: &'a ParserOptions,
    /// Cooperative cancellation signal.
    cancel: Option<&'a CancellationToken>,
    /// Whether bare URLs are recognised. They are not inside external links.
    autolinks: bool,
    /// The number of bracketed constructs and tables currently open.
    depth: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a new cursor at the start of `text`.
    pub fn new(
        text: &'a str,
        core: &'a mut ParserCore,
        options: &'a ParserOptions,
        cancel: Option<&'a CancellationToken>,
    ) -> Self {
        core.reset();
        Self {
            text,
            pos: Position::default(),
            core,
            options,
            cancel,
            autolinks: true,
            depth: 0,
        }
    }

    /// Checks the end-of-parse invariants and returns the diagnostics.
    pub fn finish(self) -> Vec<Diagnostic> {
        assert!(
            self.core.contexts.is_empty(),
            "unbalanced parser context stack: {} left open",
            self.core.contexts.len()
        );
        assert_eq!(
            self.pos.offset,
            self.text.len(),
            "parser stopped before the end of the input"
        );
        core::mem::take(&mut self.core.diagnostics)
    }

    /// Returns an error if the parse was cancelled.
    #[inline]
    pub fn check_cancelled(&self) -> Result {
        if self.cancel.is_some_and(CancellationToken::is_cancelled) {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// The whole input text.
    #[inline]
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// The current position.
    #[inline]
    pub fn pos(&self) -> Position {
        self.pos
    }

    /// The current byte offset.
    #[inline]
    pub fn offset(&self) -> usize {
        self.pos.offset
    }

    /// The unconsumed input.
    #[inline]
    pub fn rest(&self) -> &'a str {
        &self.text[self.pos.offset..]
    }

    /// Returns true if the whole input has been consumed.
    #[inline]
    pub fn at_end(&self) -> bool {
        self.pos.offset == self.text.len()
    }

    /// Returns true if the cursor is at the start of a source line.
    #[inline]
    pub fn at_line_start(&self) -> bool {
        self.pos.column == 0
    }

    /// Advances the cursor to the byte offset `to`.
    pub fn advance_to(&mut self, to: usize) {
        debug_assert!(to >= self.pos.offset);
        let text = &self.text[self.pos.offset..to];
        self.pos.advance(text);
    }

    /// Opens a new context.
    pub fn begin_context(&mut self, terminator: Option<&str>, overrides: bool) {
        self.core.contexts.push(Context {
            start: self.pos,
            terminator: terminator.map(pattern),
            overrides,
        });
    }

    /// Closes the innermost context, keeping the advance. Returns metadata
    /// with the span of the context filled in if spans are tracked.
    pub fn accept(&mut self) -> NodeMeta {
        let context = self.pop_context();
        NodeMeta {
            span: self
                .options
                .track_source_spans
                .then(|| SourceSpan::new(context.start, self.pos)),
            ..Default::default()
        }
    }

    /// Closes the innermost context, restoring the cursor to where the
    /// context was opened.
    pub fn rollback(&mut self) {
        let context = self.pop_context();
        self.pos = context.start;
    }

    /// Rolls back the innermost context and returns `None`.
    #[inline]
    pub fn reject<T>(&mut self) -> Option<T> {
        self.rollback();
        None
    }

    /// Pops the innermost context.
    fn pop_context(&mut self) -> Context {
        self.core
            .contexts
            .pop()
            .unwrap_or_else(|| panic!("context stack underflow at {}", self.pos))
    }

    /// Returns true if the terminator of any active context matches at the
    /// current position.
    pub fn needs_terminate(&self) -> bool {
        for context in self.core.contexts.iter().rev() {
            if let Some(terminator) = &context.terminator
                && terminator.match_at(self.text, self.pos.offset).is_some()
            {
                return true;
            }
            if context.overrides {
                break;
            }
        }
        false
    }

    /// Returns the byte offset of the nearest position at least `skip`
    /// characters ahead where an active terminator matches.
    pub fn find_terminator(&mut self, skip: usize) -> Option<usize> {
        let from = self.rest()
            .char_indices()
            .nth(skip)
            .map_or(self.text.len(), |(index, _)| self.pos.offset + index);

        let mut nearest = None::<usize>;
        for index in (0..self.core.contexts.len()).rev() {
            let context = &self.core.contexts[index];
            let overrides = context.overrides;
            if let Some(terminator) = context.terminator.clone()
                && let Some((start, _)) = self.search(&terminator, from)
            {
                nearest = Some(nearest.map_or(start, |nearest| nearest.min(start)));
            }
            if overrides {
                break;
            }
        }
        nearest
    }

    /// Finds the next match of `pattern` at or after byte offset `from`.
    /// Results are cached so repeated forward searches stay linear.
    pub fn search(&mut self, pattern: &Pattern, from: usize) -> Option<(usize, usize)> {
        if let Some((origin, found)) = self.core.searches.get(&pattern.source)
            && *origin <= from
            && found.is_none_or(|(start, _)| start >= from)
        {
            return *found;
        }

        let found = pattern.find_from(self.text, from);
        if let Some(entry) = self.core.searches.get_mut(&pattern.source) {
            *entry = (from, found);
        } else {
            self.core
                .searches
                .insert(pattern.source.clone(), (from, found));
        }
        found
    }

    /// Returns the text matched by `pattern` at the current position, without
    /// consuming it.
    pub fn look_ahead(&self, pattern: &str) -> Option<&'a str> {
        let start = self.pos.offset;
        self::pattern(pattern)
            .match_at(self.text, start)
            .map(|end| &self.text[start..end])
    }

    /// Consumes and returns the text matched by `pattern` at the current
    /// position.
    pub fn consume(&mut self, pattern: &str) -> Option<&'a str> {
        let matched = self.look_ahead(pattern)?;
        self.pos.advance(matched);
        Some(matched)
    }

    /// Consumes `literal` if the input continues with it.
    pub fn consume_str(&mut self, literal: &str) -> bool {
        if self.rest().starts_with(literal) {
            self.pos.advance(literal);
            true
        } else {
            false
        }
    }

    /// Consumes a single character.
    pub fn consume_char(&mut self) -> Option<char> {
        let c = self.rest().chars().next()?;
        self.advance_to(self.pos.offset + c.len_utf8());
        Some(c)
    }

    /// Returns true if bare URLs are recognised at this point.
    #[inline]
    pub fn autolinks(&self) -> bool {
        self.autolinks
    }

    /// Runs `f` with bare URL recognition switched off.
    pub fn without_autolinks<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let old = core::mem::replace(&mut self.autolinks, false);
        let result = f(self);
        self.autolinks = old;
        result
    }

    /// Runs `parse` one nesting level deeper. Past [`MAX_NESTING`] it
    /// records a warning and returns `None` instead, so the caller falls back
    /// to reading the opener as text.
    pub fn nested<T>(
        &mut self,
        what: impl core::fmt::Display,
        parse: impl FnOnce(&mut Self) -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        if self.depth >= MAX_NESTING {
            self.recovered(format!("{what} nested too deeply treated as text"));
            return Ok(None);
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Returns true if another construct can be opened at this point.
    #[inline]
    pub fn can_nest(&self) -> bool {
        self.depth < MAX_NESTING
    }

    /// Returns the memoized result of an earlier attempt to parse `construct`
    /// at the current position. The outer `None` means there was no attempt.
    pub fn memoized(&self, construct: Construct) -> Option<Option<(Inline, Position)>> {
        self.core
            .memo
            .get(&(construct, self.pos.offset, self.autolinks))
            .cloned()
    }

    /// Records the result of an attempt to parse `construct` starting at
    /// byte offset `start`.
    pub fn memoize(&mut self, construct: Construct, start: usize, result: Option<&Inline>) {
        let result = result.map(|node| (node.clone(), self.pos));
        self.core
            .memo
            .insert((construct, start, self.autolinks), result);
    }

    /// Moves the cursor to a memoized end position.
    pub fn restore(&mut self, pos: Position) {
        self.pos = pos;
    }

    /// Records a diagnostic at the current position.
    pub fn diagnostic(&mut self, severity: Severity, message: impl Into<String>) {
        let context = self.snippet();
        self.core.diagnostics.push(Diagnostic {
            severity,
            message: message.into(),
            line: self.pos.line,
            column: self.pos.column,
            context,
        });
    }

    /// Records a recovery warning, once per position.
    pub fn recovered(&mut self, message: impl Into<String>) {
        self.report_once(Severity::Warning, message);
    }

    /// Records that a closing mark was inferred, once per position.
    pub fn inferred(&mut self, message: impl Into<String>) {
        self.report_once(Severity::Info, message);
    }

    /// Records a diagnostic unless one of the same severity was already
    /// recorded at the current position. Speculative parses may visit the
    /// same input more than once.
    fn report_once(&mut self, severity: Severity, message: impl Into<String>) {
        if self.core.reported.insert((self.pos.offset, severity)) {
            self.diagnostic(severity, message);
        }
    }

    /// Up to 20 characters of source around the current position.
    fn snippet(&self) -> String {
        let before = self.text[..self.pos.offset]
            .char_indices()
            .rev()
            .nth(9)
            .map_or(0, |(index, _)| index);
        let after = self.rest()
            .char_indices()
            .nth(10)
            .map_or(self.text.len(), |(index, _)| self.pos.offset + index);
        self.text[before..after].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_cursor(text: &str, f: impl FnOnce(&mut Cursor<'_>)) {
        let mut core = ParserCore::default();
        let options = ParserOptions::default();
        let mut cursor = Cursor::new(text, &mut core, &options, None);
        f(&mut cursor);
    }

    #[test]
    fn rollback_restores_position() {
        with_cursor("ab\ncd", |cursor| {
            cursor.begin_context(None, false);
            assert_eq!(cursor.consume("ab\n"), Some("ab\n"));
            assert_eq!(cursor.pos().line, 1);
            cursor.rollback();
            assert_eq!(cursor.offset(), 0, "rollback should restore the offset");
            assert_eq!(cursor.pos().line, 0, "rollback should restore the line");
        });
    }

    #[test]
    fn terminator_override() {
        with_cursor("a|b}}", |cursor| {
            cursor.begin_context(Some(r"\|"), false);
            cursor.begin_context(Some(r"\}\}"), true);
            assert_eq!(cursor.consume_char(), Some('a'));
            assert!(
                !cursor.needs_terminate(),
                "outer terminator should be hidden by the overriding context"
            );
            assert_eq!(cursor.find_terminator(0), Some(3));
            cursor.rollback();
            assert!(!cursor.needs_terminate());
            assert_eq!(cursor.find_terminator(0), Some(1));
            cursor.rollback();
        });
    }

    #[test]
    fn search_cache() {
        with_cursor("}} x }}", |cursor| {
            let closer = pattern(r"\}\}");
            assert_eq!(cursor.search(&closer, 0), Some((0, 2)));
            assert_eq!(cursor.search(&closer, 1), Some((5, 7)));
            assert_eq!(cursor.search(&closer, 3), Some((5, 7)));
            assert_eq!(cursor.search(&closer, 6), None);
        });
    }
}
