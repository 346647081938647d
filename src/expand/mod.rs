//! Template expansion.
//!
//! Expansion walks a parsed [`Document`] and writes its source text, replacing
//! templates, parser functions, and argument references with their values.
//! Template arguments are bound unexpanded and are expanded in the scope of
//! the caller each time they are referenced.

pub use provider::{AsyncContentProvider, ContentProvider, MapProvider};

use crate::{
    title::{self, template_title},
    wikitext::{
        self, ArgumentReference, CancellationToken, Document, HtmlTag, Parser, ParserOptions,
        Template, Visitor, visit,
    },
};
use core::{convert::Infallible, fmt::Write as _};
use either::Either;
use parser_fns::IndexedArgs;
use provider::Prefetched;
use serde::Deserialize;
use std::{cell::RefCell, collections::HashMap, rc::Rc, sync::LazyLock};
use time::{OffsetDateTime, UtcOffset};

mod expr;
mod parser_fns;
mod provider;

/// An expansion error.
///
/// Problems in the expanded text, like missing templates or bad expressions,
/// are not errors. They are written into the output as error markers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Writing to the output failed.
    #[error(transparent)]
    Fmt(#[from] core::fmt::Error),
    /// Expansion options could not be loaded.
    #[error("invalid expansion options: {0}")]
    InvalidOptions(#[source] serde_json::Error),
    /// Parsing failed. This only happens when expansion is cancelled.
    #[error(transparent)]
    Parse(#[from] wikitext::Error),
}

/// The result type for expansion operations.
pub type Result<T = (), E = Error> = core::result::Result<T, E>;

/// What to write in place of a template that does not exist.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
pub enum MissingTemplate {
    /// The original template call, unexpanded.
    #[default]
    Preserve,
    /// The template name alone, as `{{Name}}`.
    NameOnly,
}

/// Template expansion options.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ExpansionOptions {
    /// The maximum depth of nested template transclusions.
    pub max_depth: usize,
    /// What to write in place of missing templates.
    pub missing_template: MissingTemplate,
    /// The current time, in Unix seconds. If `None`, the system clock is
    /// used.
    pub now: Option<i64>,
    /// The local time offset from UTC, in seconds. If `None`, the offset of
    /// the system time zone is used.
    pub local_offset: Option<i32>,
    /// The maximum number of fetch rounds in an asynchronous expansion.
    pub max_async_rounds: usize,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            max_depth: 40,
            missing_template: MissingTemplate::default(),
            now: None,
            local_offset: None,
            max_async_rounds: 40,
        }
    }
}

impl ExpansionOptions {
    /// Loads options from a JSON object. Missing fields use their default
    /// values.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::InvalidOptions)
    }
}

/// A template expander.
///
/// An expander can be shared between threads. Each expansion has its own
/// template cache.
#[derive(Debug, Default)]
pub struct TemplateExpander {
    /// The parser used for the input and for template content.
    parser: Parser,
    /// Expansion options.
    options: ExpansionOptions,
}

impl TemplateExpander {
    /// Creates a new expander.
    pub fn new(parser_options: ParserOptions, options: ExpansionOptions) -> Self {
        Self {
            parser: Parser::new(parser_options),
            options,
        }
    }

    /// The parser used for the input and for template content.
    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    /// The expansion options.
    pub fn options(&self) -> &ExpansionOptions {
        &self.options
    }

    /// Parses and expands `text`, reading templates from `provider`.
    pub fn expand(&self, text: &str, provider: &dyn ContentProvider) -> Result<String> {
        let document = self.parser.parse(text);
        self.expand_document(&document, provider)
    }

    /// Expands an already parsed document.
    pub fn expand_document(
        &self,
        document: &Document,
        provider: &dyn ContentProvider,
    ) -> Result<String> {
        self.run(document, provider, None)
    }

    /// Parses and expands `text`, stopping with [`wikitext::Error::Cancelled`]
    /// once `token` is cancelled.
    pub fn expand_cancellable(
        &self,
        text: &str,
        provider: &dyn ContentProvider,
        token: &CancellationToken,
    ) -> Result<String> {
        let document = self.parser.parse_cancellable(text, token)?.document;
        self.run(&document, provider, Some(token))
    }

    /// Parses and expands `text`, then parses the expanded text.
    pub fn expand_to_document(
        &self,
        text: &str,
        provider: &dyn ContentProvider,
    ) -> Result<Document> {
        let expanded = self.expand(text, provider)?;
        Ok(self.parser.parse(&expanded))
    }

    /// Parses and expands `text`, fetching templates from an asynchronous
    /// `provider`.
    ///
    /// Each round expands the document with the templates fetched so far and
    /// records the templates it could not find. Those are fetched before the
    /// next round. Expansion finishes when a round has nothing left to fetch,
    /// or after [`ExpansionOptions::max_async_rounds`] rounds.
    pub async fn expand_async<P>(&self, text: &str, provider: &P) -> Result<String>
    where
        P: AsyncContentProvider,
    {
        let document = self.parser.parse(text);
        let mut fetched = HashMap::new();
        let mut round = 0;
        loop {
            round += 1;
            let (out, misses) = self.expand_round(&document, &fetched)?;
            if misses.is_empty() {
                return Ok(out);
            } else if round >= self.options.max_async_rounds {
                log::warn!("giving up after {round} rounds with {misses:?} unfetched");
                return Ok(out);
            }

            log::debug!("round {round}: fetching {misses:?}");
            for name in misses {
                let content = provider.fetch(&name).await;
                fetched.insert(name, content);
            }
        }
    }

    /// Runs one round of an asynchronous expansion, returning the output and
    /// the names of templates which have not been fetched yet.
    fn expand_round(
        &self,
        document: &Document,
        fetched: &HashMap<String, Option<String>>,
    ) -> Result<(String, Vec<String>)> {
        let provider = Prefetched::new(fetched);
        let out = self.run(document, &provider, None)?;
        Ok((out, provider.into_misses()))
    }

    /// Expands a document in a new session.
    fn run(
        &self,
        document: &Document,
        provider: &dyn ContentProvider,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let session = Session::new(self, provider, cancel);
        let context = ExpansionContext::default();
        let scope = Scope {
            session: &session,
            context: &context,
            mode: Mode::Normal,
        };
        let mut out = String::new();
        scope.expand_body(&mut out, document)?;
        Ok(out)
    }
}

/// The state of a template expansion: how deep it is, which templates are
/// being expanded, and the arguments of the innermost template.
#[derive(Default)]
pub struct ExpansionContext<'a> {
    /// The number of enclosing transclusions.
    depth: usize,
    /// The normalised name of the template being expanded.
    name: Option<String>,
    /// The context of the caller.
    parent: Option<&'a ExpansionContext<'a>>,
    /// The arguments of the template being expanded, by name. Positional
    /// arguments are named by their 1-based index.
    arguments: HashMap<String, Binding<'a>>,
}

impl ExpansionContext<'_> {
    /// The number of enclosing transclusions.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The normalised name of the template being expanded, or `None` at the
    /// top level.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns true if the template with the given normalised name is being
    /// expanded in this context or any enclosing context.
    pub fn contains(&self, name: &str) -> bool {
        let mut context = Some(self);
        while let Some(current) = context {
            if current.name.as_deref() == Some(name) {
                return true;
            }
            context = current.parent;
        }
        false
    }

    /// Returns true if an argument with the given name is bound.
    pub fn has_argument(&self, name: &str) -> bool {
        self.arguments.contains_key(name)
    }
}

impl core::fmt::Debug for ExpansionContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExpansionContext")
            .field("depth", &self.depth)
            .field("name", &self.name)
            .field("arguments", &self.arguments.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// An unexpanded template argument, with the scope it must be expanded in.
#[derive(Clone, Copy)]
struct Binding<'a> {
    /// The argument value.
    value: &'a Document,
    /// The scope of the template call.
    scope: Scope<'a>,
    /// Whether the argument was named. Named argument values are trimmed.
    named: bool,
}

/// Whether the document being expanded is the top-level document or the
/// content of a transcluded template.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mode {
    /// The top-level document.
    Normal,
    /// A transcluded template.
    Include,
}

/// The state shared by every scope in a single expansion.
struct Session<'a> {
    /// The expander.
    expander: &'a TemplateExpander,
    /// The source of template content.
    provider: &'a dyn ContentProvider,
    /// The cancellation token.
    cancel: Option<&'a CancellationToken>,
    /// Parsed templates, by normalised name. Missing templates are `None`.
    templates: RefCell<HashMap<String, Option<Rc<Document>>>>,
    /// The current time.
    now: OffsetDateTime,
    /// The local time offset.
    local_offset: UtcOffset,
}

impl<'a> Session<'a> {
    /// Creates a new session.
    fn new(
        expander: &'a TemplateExpander,
        provider: &'a dyn ContentProvider,
        cancel: Option<&'a CancellationToken>,
    ) -> Self {
        let options = &expander.options;
        let now = options
            .now
            .and_then(|now| OffsetDateTime::from_unix_timestamp(now).ok())
            .unwrap_or_else(OffsetDateTime::now_utc);
        let local_offset = options
            .local_offset
            .and_then(|offset| UtcOffset::from_whole_seconds(offset).ok())
            .unwrap_or_else(|| *LOCAL_OFFSET);

        Self {
            expander,
            provider,
            cancel,
            templates: RefCell::default(),
            now,
            local_offset,
        }
    }

    /// Returns an error if the expansion was cancelled.
    fn check_cancelled(&self) -> Result {
        if self.cancel.is_some_and(CancellationToken::is_cancelled) {
            Err(wikitext::Error::Cancelled.into())
        } else {
            Ok(())
        }
    }

    /// Loads and parses the template with the given normalised name.
    fn load(&self, title: &str) -> Result<Option<Rc<Document>>> {
        if let Some(document) = self.templates.borrow().get(title) {
            return Ok(document.clone());
        }

        let document = match self.provider.content(title) {
            Some(text) => Some(Rc::new(self.parse(&text)?)),
            None => {
                log::debug!("template {title:?} does not exist");
                None
            }
        };
        self.templates
            .borrow_mut()
            .insert(title.to_string(), document.clone());
        Ok(document)
    }

    /// Parses template content.
    fn parse(&self, text: &str) -> Result<Document> {
        let parser = &self.expander.parser;
        Ok(match self.cancel {
            Some(token) => parser.parse_cancellable(text, token)?.document,
            None => parser.parse(text),
        })
    }
}

/// The local time offset of the system, read once.
static LOCAL_OFFSET: LazyLock<UtcOffset> = LazyLock::new(|| {
    UtcOffset::current_local_offset().unwrap_or_else(|err| {
        log::warn!("could not read the local time offset, using UTC: {err}");
        UtcOffset::UTC
    })
});

/// Where a node is being expanded.
#[derive(Clone, Copy)]
struct Scope<'a> {
    /// The expansion session.
    session: &'a Session<'a>,
    /// The template context.
    context: &'a ExpansionContext<'a>,
    /// Whether transclusion tags are treated as in a template or the
    /// top-level document.
    mode: Mode,
}

impl<'a> Scope<'a> {
    /// Runs `visit` over a frame in this scope and returns what it wrote.
    fn render(self, visit: impl FnOnce(&mut Frame<'a, '_>) -> Result) -> Result<String> {
        let mut out = String::new();
        visit(&mut Frame {
            scope: self,
            out: &mut out,
        })?;
        Ok(out)
    }

    /// Expands a document. In a template, only the content of `onlyinclude`
    /// tags is expanded if there are any.
    fn expand_body(self, out: &mut String, body: &Document) -> Result {
        let mut frame = Frame { scope: self, out };
        if self.mode == Mode::Include {
            let mut only = OnlyInclude::default();
            let Ok(()) = only.visit_document(body);
            if !only.0.is_empty() {
                for content in only.0 {
                    frame.visit_document(content)?;
                }
                return Ok(());
            }
        }
        frame.visit_document(body)
    }

    /// Expands a template or parser function call.
    fn template(self, out: &mut String, node: &Template) -> Result {
        self.session.check_cancelled()?;

        let expanded = self.render(|frame| frame.visit_run(&node.name))?;
        let name = title::strip_subst(expanded.trim());
        let options = self.session.expander.parser.options();

        if node.is_magic_word {
            self.call(out, node, name, None)
        } else if let Some((prefix, rest)) = name.split_once(':')
            && options.is_magic_word(prefix)
        {
            self.call(out, node, prefix.trim(), Some(rest.to_string()))
        } else if options.is_magic_word(name) {
            self.call(out, node, name, None)
        } else {
            self.transclude(out, node, name)
        }
    }

    /// Calls a parser function. If the call has a dynamic name, `first` is
    /// the already expanded first argument.
    fn call(self, out: &mut String, node: &Template, callee: &str, first: Option<String>) -> Result {
        let callee = callee.to_lowercase();
        let arguments = IndexedArgs {
            scope: self,
            callee: &callee,
            arguments: first
                .map(Either::Left)
                .into_iter()
                .chain(node.arguments.iter().map(Either::Right))
                .collect(),
        };

        if !parser_fns::call_parser_fn(out, &arguments)? {
            log::warn!("unknown parser function {callee}");
            write!(out, "{node}")?;
        }
        Ok(())
    }

    /// Transcludes a template.
    fn transclude(self, out: &mut String, node: &Template, name: &str) -> Result {
        let max_depth = self.session.expander.options.max_depth;
        if self.context.depth >= max_depth {
            log::warn!("template recursion depth limit exceeded at {name:?}");
            write!(
                out,
                r#"<span class="error">Template recursion depth limit exceeded ({max_depth})</span>"#
            )?;
            return Ok(());
        }

        let title = template_title(name);
        if self.context.contains(&title) {
            log::warn!("template loop detected at {title:?}");
            write!(
                out,
                r#"<span class="error">Template loop detected: [[{}]]</span>"#,
                link_target(&title)
            )?;
            return Ok(());
        }

        let Some(body) = self.session.load(&title)? else {
            match self.session.expander.options.missing_template {
                MissingTemplate::Preserve => write!(out, "{node}")?,
                MissingTemplate::NameOnly => write!(out, "{{{{{name}}}}}")?,
            }
            return Ok(());
        };

        let mut arguments = HashMap::new();
        let mut position = 0;
        for argument in &node.arguments {
            let (key, named) = if let Some(name) = &argument.name {
                let name = self.render(|frame| frame.visit_document(name))?;
                (name.trim_ascii().to_string(), true)
            } else {
                position += 1;
                (position.to_string(), false)
            };
            arguments.insert(
                key,
                Binding {
                    value: &argument.value,
                    scope: self,
                    named,
                },
            );
        }

        log::trace!("transcluding {title:?} at depth {}", self.context.depth + 1);
        let context = ExpansionContext {
            depth: self.context.depth + 1,
            name: Some(title),
            parent: Some(self.context),
            arguments,
        };
        Scope {
            session: self.session,
            context: &context,
            mode: Mode::Include,
        }
        .expand_body(out, &body)
    }

    /// Expands an argument reference.
    fn argument(self, out: &mut String, node: &ArgumentReference) -> Result {
        let name = self.render(|frame| frame.visit_document(&node.name))?;
        let name = name.trim_ascii();

        if let Some(binding) = self.context.arguments.get(name) {
            let value = binding
                .scope
                .render(|frame| frame.visit_document(binding.value))?;
            out.push_str(if binding.named {
                value.trim_ascii()
            } else {
                &value
            });
        } else if let Some(default) = &node.default {
            Frame { scope: self, out }.visit_document(default)?;
        } else {
            write!(out, "{{{{{{{name}}}}}}}")?;
        }
        Ok(())
    }
}

/// The link target of a template in an error message.
fn link_target(title: &str) -> String {
    if title.contains(':') {
        title.to_string()
    } else {
        format!("Template:{title}")
    }
}

/// A visitor which writes the expansion of the nodes it visits.
struct Frame<'a, 'o> {
    /// The scope of the nodes.
    scope: Scope<'a>,
    /// The output.
    out: &'o mut String,
}

impl<'tt> Visitor<'tt, Error> for Frame<'_, '_> {
    fn visit_text(&mut self, text: &str) -> Result {
        self.out.push_str(text);
        Ok(())
    }

    fn visit_template(&mut self, node: &'tt Template) -> Result {
        self.scope.template(self.out, node)
    }

    fn visit_argument_reference(&mut self, node: &'tt ArgumentReference) -> Result {
        self.scope.argument(self.out, node)
    }

    fn visit_html_tag(&mut self, node: &'tt HtmlTag) -> Result {
        match (node.normalized_name().as_str(), self.scope.mode) {
            ("noinclude", Mode::Include) | ("includeonly", Mode::Normal) => Ok(()),
            ("noinclude" | "includeonly" | "onlyinclude", _) => self.visit_document(&node.content),
            _ => visit::visit_tag(self, node, |frame, content| frame.visit_document(content)),
        }
    }
}

/// A visitor which collects the content of `onlyinclude` tags.
#[derive(Default)]
struct OnlyInclude<'tt>(Vec<&'tt Document>);

impl<'tt> Visitor<'tt, Infallible> for OnlyInclude<'tt> {
    fn visit_text(&mut self, _: &str) -> Result<(), Infallible> {
        Ok(())
    }

    fn visit_html_tag(&mut self, node: &'tt HtmlTag) -> Result<(), Infallible> {
        if node.name.eq_ignore_ascii_case("onlyinclude") {
            self.0.push(&node.content);
            Ok(())
        } else {
            visit::visit_tag(self, node, |visitor, content| visitor.visit_document(content))
        }
    }
}

#[cfg(test)]
mod tests;
