//! Inline content: runs of text, links, templates, tags, and formatting.

use super::{
    ParserOptions, Position, Result, SourceSpan,
    config::PROTOCOLS,
    cursor::{Construct, Cursor, pattern},
    nodes::{
        ArgumentReference, AttributeList, Comment, ExternalLink, FormatSwitch, HtmlTag,
        ImageLink, ImageLinkArgument, Inline, NodeList, NodeMeta, ParserTag, PlainText, Quote,
        Run, TagAttribute, TagNode, TagStyle, Template, TemplateArgument, WikiLink,
    },
    parser::sub_document,
    protocols_regex,
};
use regex::Regex;
use std::sync::LazyLock;

/// Characters and sequences which may start something other than plain text.
static SPECIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"[\{{\[<']|(?i:\b(?:{}))",
        protocols_regex(PROTOCOLS.iter().copied().filter(|proto| *proto != "//"))
    ))
    .unwrap()
});

/// A bare URL.
static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"^(?i:{})[^\s\[\]<>"{{}}|'\x00-\x1f\x7f]+"#,
        protocols_regex(PROTOCOLS.iter().copied().filter(|proto| *proto != "//"))
    ))
    .unwrap()
});

/// The start of a URL in a bracketed external link.
static URL_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "^(?i:{})",
        protocols_regex(PROTOCOLS.iter().copied())
    ))
    .unwrap()
});

/// Terminator of a template name or value.
const TEMPLATE_PART: &str = r"\||\}\}";
/// Terminator of a template argument name.
const TEMPLATE_ARG_NAME: &str = r"=|\||\}\}";
/// Terminator of an argument reference name.
const ARG_REF_NAME: &str = r"\||\}\}\}";
/// Terminator of an argument reference default.
const ARG_REF_DEFAULT: &str = r"\}\}\}";
/// Terminator of a wiki link target.
const LINK_TARGET: &str = r"\||\]\]|\n|\}\}|\[\[";
/// Terminator of wiki link text. Link text may span lines, but not a blank
/// line.
const LINK_TEXT: &str = r"\]\]|\}\}|\n[ \t]*(?:\n|$)";
/// Terminator of an image link argument.
const IMAGE_ARG: &str = r"\||\]\]|\}\}|\n[ \t]*(?:\n|$)";
/// Terminator of an external link URL.
const URL_TARGET: &str = r#"[\s\]\[<>"]|\{\{"#;
/// Terminator of external link text.
const URL_TEXT: &str = r"\]|\n|\}\}";

/// Appends plain text that started at `start` to `run`, merging it with a
/// trailing text node.
pub(super) fn append_text(run: &mut Run, text: &str, start: Position, options: &ParserOptions) {
    if text.is_empty() {
        return;
    }
    let span = options.track_source_spans.then(|| {
        let mut end = start;
        end.advance(text);
        SourceSpan::new(start, end)
    });

    if let Some(Inline::PlainText(last)) = run.inlines.last_mut() {
        last.content += text;
        if let (Some(last), Some(span)) = (&mut last.meta.span, span) {
            *last = last.merge(span);
        }
    } else {
        run.inlines.attach(Inline::PlainText(PlainText {
            content: text.to_string(),
            meta: NodeMeta {
                span,
                ..Default::default()
            },
        }));
    }
}

/// Moves the content of `other` to the end of `run`.
pub(super) fn append_run(run: &mut Run, other: Run) {
    if let (Some(span), Some(other)) = (&mut run.meta.span, other.meta.span) {
        *span = span.merge(other);
    } else if run.meta.span.is_none() && run.inlines.is_empty() {
        run.meta.span = other.meta.span;
    }

    for node in other.inlines {
        match (run.inlines.last_mut(), node) {
            (Some(Inline::PlainText(last)), Inline::PlainText(text)) => {
                last.content += &text.content;
                if let (Some(span), Some(other)) = (&mut last.meta.span, text.meta.span) {
                    *span = span.merge(other);
                }
            }
            (_, node) => run.inlines.attach(node),
        }
    }
}

/// Parses inline content until a terminator or the end of the input.
pub(super) fn run(cursor: &mut Cursor<'_>) -> Result<Run> {
    cursor.begin_context(None, false);
    let mut run = Run::default();
    while !cursor.at_end() && !cursor.needs_terminate() {
        cursor.check_cancelled()?;
        if !inline(cursor, &mut run)? {
            plain_text(cursor, &mut run);
        }
    }
    run.meta = cursor.accept();
    Ok(run)
}

/// Tries to parse a non-text inline node into `run`. Returns false if there
/// is none at the current position.
fn inline(cursor: &mut Cursor<'_>, run: &mut Run) -> Result<bool> {
    let rest = cursor.rest();
    let node = match rest.as_bytes().first() {
        Some(b'{') => return braces(cursor, run),
        Some(b'\'') => return Ok(format_switch(cursor, run)),
        Some(b'[') if rest.starts_with("[[") => wiki_link(cursor)?,
        Some(b'[') => external_link(cursor)?,
        Some(b'<') if rest.starts_with("<!--") => comment(cursor),
        Some(b'<') => tag(cursor)?,
        _ => bare_url(cursor),
    };

    Ok(if let Some(node) = node {
        run.inlines.attach(node);
        true
    } else {
        false
    })
}

/// Consumes plain text up to the next terminator or special character.
/// At least one character is always consumed.
fn plain_text(cursor: &mut Cursor<'_>, run: &mut Run) {
    let start = cursor.pos();
    let text = cursor.text();
    let first_len = cursor.rest().chars().next().map_or(0, char::len_utf8);
    let from = start.offset + first_len;
    let limit = cursor.find_terminator(1).unwrap_or(text.len()).max(from);
    let end = SPECIAL
        .find_at(&text[..limit], from)
        .map_or(limit, |m| m.start());
    cursor.advance_to(end);
    append_text(run, &text[start.offset..end], start, cursor.options);
}

/// Runs `parse` for a bracketed construct, reusing the result of an earlier
/// attempt at the same position.
fn memoized<'a>(
    cursor: &mut Cursor<'a>,
    construct: Construct,
    parse: impl FnOnce(&mut Cursor<'a>) -> Result<Option<Inline>>,
) -> Result<Option<Inline>> {
    if let Some(result) = cursor.memoized(construct) {
        return Ok(result.map(|(node, end)| {
            cursor.restore(end);
            node
        }));
    }

    let start = cursor.offset();
    let refused = !cursor.can_nest();
    let result = cursor.nested(format_args!("{construct:?}"), parse)?;
    if !refused {
        cursor.memoize(construct, start, result.as_ref());
    }
    if result.is_none() {
        log::trace!("no {construct:?} at {}", cursor.pos());
    }
    Ok(result)
}

/// Closes a bracketed construct, either by consuming `closer` or by
/// inferring it. Rolls the construct back if neither works.
fn close(cursor: &mut Cursor<'_>, closer: &str, what: &str) -> Option<NodeMeta> {
    if cursor.consume_str(closer) {
        Some(cursor.accept())
    } else {
        infer_close(cursor, closer, what)
    }
}

/// Accepts a construct without its closing mark if the input ended and
/// inference is allowed. Rolls the construct back otherwise.
fn infer_close(cursor: &mut Cursor<'_>, closer: &str, what: &str) -> Option<NodeMeta> {
    if cursor.at_end() && cursor.options.allow_closing_mark_inference {
        cursor.inferred(format!("inferred closing `{closer}` for {what}"));
        let mut meta = cursor.accept();
        meta.inferred_closing_mark = true;
        Some(meta)
    } else {
        cursor.rollback();
        cursor.recovered(format!("unclosed {what} treated as text"));
        None
    }
}

/// Returns true if a closing delimiter matching `closer` exists at or after
/// `from`, or if a missing one could be inferred.
fn has_closer(cursor: &mut Cursor<'_>, closer: &str, from: usize) -> bool {
    cursor.options.allow_closing_mark_inference
        || cursor.search(&pattern(closer), from).is_some()
}

/// Parses a run of opening braces.
///
/// Two braces start a template and three an argument reference. For longer
/// runs, the nearest run of closing braces decides how many opening braces
/// belong to the innermost construct, and the excess is plain text.
fn braces(cursor: &mut Cursor<'_>, run: &mut Run) -> Result<bool> {
    let count = cursor.rest().bytes().take_while(|b| *b == b'{').count();
    match count {
        0 | 1 => Ok(false),
        2 => {
            if let Some(node) = template(cursor)? {
                run.inlines.attach(node);
                Ok(true)
            } else {
                Ok(false)
            }
        }
        3 => {
            if let Some(node) = argument_reference(cursor)? {
                run.inlines.attach(node);
            } else {
                literal(cursor, run, 1);
            }
            Ok(true)
        }
        _ => {
            let from = cursor.offset() + count;
            let keep = match cursor.search(&pattern(r"\}{2,}"), from) {
                Some((start, end)) if end - start >= 3 => 3,
                Some(_) => 2,
                None => {
                    cursor.recovered("unclosed braces treated as text");
                    0
                }
            };
            literal(cursor, run, count - keep);
            Ok(true)
        }
    }
}

/// Consumes `len` bytes of ASCII as plain text.
fn literal(cursor: &mut Cursor<'_>, run: &mut Run, len: usize) {
    let start = cursor.pos();
    cursor.advance_to(start.offset + len);
    append_text(
        run,
        &cursor.text()[start.offset..start.offset + len],
        start,
        cursor.options,
    );
}

/// Parses a template, `{{name|args}}`, or a magic word, `{{#name:args}}`.
fn template(cursor: &mut Cursor<'_>) -> Result<Option<Inline>> {
    memoized(cursor, Construct::Template, |cursor| {
        if !has_closer(cursor, r"\}\}", cursor.offset() + 2) {
            cursor.recovered("unclosed template treated as text");
            return Ok(None);
        }

        cursor.begin_context(None, true);
        cursor.consume_str("{{");

        let (name, mut is_magic_word) = if let Some(name) = magic_word_prefix(cursor) {
            (name, true)
        } else {
            cursor.begin_context(Some(TEMPLATE_PART), true);
            let name = run(cursor)?;
            cursor.accept();
            (name, false)
        };

        if !cursor.options.allow_empty_template_name && name.to_string().trim().is_empty() {
            return Ok(cursor.reject());
        }

        let mut arguments = NodeList::new();
        let mut pending = is_magic_word;
        loop {
            if !pending && !cursor.consume_str("|") {
                break;
            }
            arguments.attach(template_argument(cursor, !pending)?);
            pending = false;
        }

        if !is_magic_word
            && arguments.is_empty()
            && let [Inline::PlainText(text)] = &*name.inlines
        {
            is_magic_word = cursor.options.is_magic_word(&text.content);
        }

        Ok(close(cursor, "}}", "template").map(|meta| {
            Inline::Template(Template {
                name,
                arguments,
                is_magic_word,
                meta,
            })
        }))
    })
}

/// Consumes a magic word name and the colon after it, if there is one at the
/// current position.
fn magic_word_prefix(cursor: &mut Cursor<'_>) -> Option<Run> {
    let candidate = cursor.look_ahead(r"[^|{}\[\]<>:\n]*:")?;
    let name = &candidate[..candidate.len() - 1];
    if !cursor.options.is_magic_word(name) {
        return None;
    }

    cursor.begin_context(None, false);
    let start = cursor.pos();
    cursor.advance_to(start.offset + name.len());
    let mut run = Run::default();
    append_text(&mut run, name, start, cursor.options);
    run.meta = cursor.accept();
    cursor.consume_str(":");
    Some(run)
}

/// Parses one template argument. If `named` is true, a name followed by `=`
/// is split off.
fn template_argument(cursor: &mut Cursor<'_>, named: bool) -> Result<TemplateArgument> {
    cursor.begin_context(None, false);

    let mut name = None;
    if named {
        cursor.begin_context(Some(TEMPLATE_ARG_NAME), true);
        let candidate = sub_document(cursor)?;
        if cursor.rest().starts_with('=') {
            cursor.accept();
            cursor.consume_str("=");
            name = Some(candidate);
        } else {
            cursor.rollback();
        }
    }

    cursor.begin_context(Some(TEMPLATE_PART), true);
    let value = sub_document(cursor)?;
    cursor.accept();

    let meta = cursor.accept();
    Ok(TemplateArgument { name, value, meta })
}

/// Parses an argument reference, `{{{name|default}}}`.
fn argument_reference(cursor: &mut Cursor<'_>) -> Result<Option<Inline>> {
    memoized(cursor, Construct::ArgumentReference, |cursor| {
        if !has_closer(cursor, r"\}\}\}", cursor.offset() + 3) {
            return Ok(None);
        }

        cursor.begin_context(None, true);
        cursor.consume_str("{{{");

        cursor.begin_context(Some(ARG_REF_NAME), true);
        let name = sub_document(cursor)?;
        cursor.accept();

        let default = if cursor.consume_str("|") {
            cursor.begin_context(Some(ARG_REF_DEFAULT), true);
            let default = sub_document(cursor)?;
            cursor.accept();
            Some(default)
        } else {
            None
        };

        Ok(close(cursor, "}}}", "argument reference").map(|meta| {
            Inline::ArgumentReference(ArgumentReference {
                name,
                default,
                meta,
            })
        }))
    })
}

/// Parses a wiki link, `[[target|text]]`, or an image link,
/// `[[File:name|args]]`.
fn wiki_link(cursor: &mut Cursor<'_>) -> Result<Option<Inline>> {
    memoized(cursor, Construct::WikiLink, |cursor| {
        if !has_closer(cursor, r"\]\]", cursor.offset() + 2) {
            cursor.recovered("unclosed link treated as text");
            return Ok(None);
        }

        cursor.begin_context(None, true);
        cursor.consume_str("[[");

        cursor.begin_context(Some(LINK_TARGET), true);
        let target = run(cursor)?;
        cursor.accept();

        let target_text = target.to_string();
        if !cursor.options.allow_empty_wiki_link_target && target_text.trim().is_empty() {
            return Ok(cursor.reject());
        }

        if let Some((namespace, _)) = target_text.split_once(':')
            && cursor.options.is_image_namespace(namespace)
        {
            let mut arguments = NodeList::new();
            while cursor.consume_str("|") {
                arguments.attach(image_link_argument(cursor)?);
            }
            return Ok(close(cursor, "]]", "image link").map(|meta| {
                Inline::ImageLink(ImageLink {
                    target,
                    arguments,
                    meta,
                })
            }));
        }

        let text = if cursor.consume_str("|") {
            cursor.begin_context(Some(LINK_TEXT), true);
            let text = run(cursor)?;
            cursor.accept();
            Some(text)
        } else {
            None
        };

        Ok(close(cursor, "]]", "link").map(|meta| {
            Inline::WikiLink(WikiLink { target, text, meta })
        }))
    })
}

/// Parses one `|`-separated part of an image link.
fn image_link_argument(cursor: &mut Cursor<'_>) -> Result<ImageLinkArgument> {
    cursor.begin_context(None, false);

    let name = cursor.look_ahead(r"[A-Za-z_][A-Za-z0-9_ ]*=").map(|matched| {
        let name = &matched[..matched.len() - 1];
        cursor.begin_context(None, false);
        let start = cursor.pos();
        cursor.advance_to(start.offset + name.len());
        let mut run = Run::default();
        append_text(&mut run, name, start, cursor.options);
        run.meta = cursor.accept();
        cursor.consume_str("=");
        run
    });

    cursor.begin_context(Some(IMAGE_ARG), true);
    let value = run(cursor)?;
    cursor.accept();

    let meta = cursor.accept();
    Ok(ImageLinkArgument { name, value, meta })
}

/// Parses a bracketed external link, `[url text]`.
fn external_link(cursor: &mut Cursor<'_>) -> Result<Option<Inline>> {
    memoized(cursor, Construct::ExternalLink, |cursor| {
        let after = &cursor.rest()[1..];
        let has_url = URL_START.is_match(after) || after.starts_with("{{");
        let allow_empty = cursor.options.allow_empty_external_link_target
            && after.starts_with([']', ' ', '\t']);
        if !has_url && !allow_empty {
            return Ok(None);
        }

        cursor.begin_context(None, true);
        cursor.consume_str("[");

        cursor.without_autolinks(|cursor| -> Result<Option<Inline>> {
            let target = url(cursor)?;
            if target.is_empty() && !cursor.options.allow_empty_external_link_target {
                return Ok(cursor.reject());
            }

            let text = if cursor.rest().starts_with(']') {
                None
            } else {
                cursor.begin_context(Some(URL_TEXT), true);
                let text = run(cursor)?;
                cursor.accept();
                (!text.is_empty()).then_some(text)
            };

            Ok(close(cursor, "]", "external link").map(|meta| {
                Inline::ExternalLink(ExternalLink {
                    target,
                    text,
                    brackets: true,
                    meta,
                })
            }))
        })
    })
}

/// Parses the URL of a bracketed external link. URLs may contain templates
/// and argument references, but nothing else.
fn url(cursor: &mut Cursor<'_>) -> Result<Run> {
    cursor.begin_context(Some(URL_TARGET), true);
    let mut target = Run::default();
    loop {
        cursor.check_cancelled()?;
        if cursor.rest().starts_with("{{") && braces(cursor, &mut target)? {
            continue;
        }
        if cursor.at_end() || cursor.needs_terminate() {
            break;
        }
        let start = cursor.pos();
        let end = cursor.find_terminator(1).unwrap_or(cursor.text().len());
        cursor.advance_to(end);
        append_text(
            &mut target,
            &cursor.text()[start.offset..end],
            start,
            cursor.options,
        );
    }
    target.meta = cursor.accept();
    Ok(target)
}

/// Parses a bare URL.
fn bare_url(cursor: &mut Cursor<'_>) -> Option<Inline> {
    if !cursor.autolinks()
        || cursor.text()[..cursor.offset()]
            .chars()
            .next_back()
            .is_some_and(char::is_alphanumeric)
    {
        return None;
    }

    let matched = BARE_URL.find(cursor.rest())?.as_str();
    let mut url = matched.trim_end_matches(['.', ',', ';', ':', '!', '?']);
    if !url.contains('(') {
        url = url.trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
    }
    if let Some(limit) = cursor.find_terminator(0) {
        url = &url[..url.len().min(limit - cursor.offset())];
    }
    if URL_START.find(url).is_none_or(|proto| proto.end() == url.len()) {
        return None;
    }

    cursor.begin_context(None, false);
    cursor.begin_context(None, false);
    let start = cursor.pos();
    cursor.advance_to(start.offset + url.len());
    let mut target = Run::default();
    append_text(&mut target, url, start, cursor.options);
    target.meta = cursor.accept();
    let meta = cursor.accept();
    Some(Inline::ExternalLink(ExternalLink {
        target,
        text: None,
        brackets: false,
        meta,
    }))
}

/// Parses a run of apostrophes into a format switch.
fn format_switch(cursor: &mut Cursor<'_>, run: &mut Run) -> bool {
    let count = cursor.rest().bytes().take_while(|b| *b == b'\'').count();
    let (extra, switch_bold, switch_italics) = match count {
        0 | 1 => return false,
        2 => (0, false, true),
        3 => (0, true, false),
        4 => (1, true, false),
        5 => (0, true, true),
        count => (count - 5, true, true),
    };

    literal(cursor, run, extra);
    cursor.begin_context(None, false);
    cursor.advance_to(cursor.offset() + count - extra);
    let meta = cursor.accept();
    run.inlines.attach(Inline::FormatSwitch(FormatSwitch {
        switch_bold,
        switch_italics,
        meta,
    }));
    true
}

/// Parses a comment. Comments without an end are closed at the end of the
/// input.
pub(super) fn comment(cursor: &mut Cursor<'_>) -> Option<Inline> {
    cursor.begin_context(None, false);
    if !cursor.consume_str("<!--") {
        return cursor.reject();
    }

    let rest = cursor.rest();
    let (content, inferred) = match memchr::memmem::find(rest.as_bytes(), b"-->") {
        Some(end) => (&rest[..end], false),
        None => (rest, true),
    };
    cursor.advance_to(cursor.offset() + content.len());
    if inferred {
        cursor.inferred("inferred closing `-->` for comment");
    } else {
        cursor.consume_str("-->");
    }

    let mut meta = cursor.accept();
    meta.inferred_closing_mark = inferred;
    Some(Inline::Comment(Comment {
        content: content.to_string(),
        meta,
    }))
}

/// Parses an HTML tag or an extension tag.
fn tag(cursor: &mut Cursor<'_>) -> Result<Option<Inline>> {
    let Some(name) = cursor
        .look_ahead(r"<[A-Za-z][A-Za-z0-9:_-]*")
        .map(|matched| &matched[1..])
    else {
        return Ok(None);
    };

    let is_parser_tag = cursor.options.is_parser_tag(name);
    if !is_parser_tag && !cursor.options.is_html_tag(name) {
        return Ok(None);
    }

    memoized(cursor, Construct::Tag, |cursor| {
        cursor.begin_context(None, true);
        cursor.consume_str("<");
        cursor.consume_str(name);

        let attributes = attributes(cursor, AttributeMode::Tag)?;
        let lname = name.to_ascii_lowercase();

        if cursor.consume_str("/>") {
            let meta = cursor.accept();
            return Ok(Some(if is_parser_tag {
                Inline::ParserTag(tag_node(name, attributes, TagStyle::SelfClosing, meta))
            } else {
                Inline::HtmlTag(tag_node(name, attributes, TagStyle::SelfClosing, meta))
            }));
        }

        if !cursor.consume_str(">") {
            cursor.rollback();
            cursor.recovered(format!("malformed <{name}> tag treated as text"));
            return Ok(None);
        }

        if cursor.options.is_self_closing_tag(&lname) {
            let meta = cursor.accept();
            return Ok(Some(Inline::HtmlTag(tag_node(
                name,
                attributes,
                TagStyle::Unclosed,
                meta,
            ))));
        }

        let closer = format!(r"(?i:</{}\s*>)", regex::escape(name));
        if is_parser_tag {
            parser_tag(cursor, name, attributes, &closer)
        } else {
            html_tag(cursor, name, &lname, attributes, &closer)
        }
    })
}

/// Creates a tag node with no content.
fn tag_node<C: Default>(
    name: &str,
    attributes: AttributeList,
    style: TagStyle,
    meta: NodeMeta,
) -> TagNode<C> {
    TagNode {
        name: name.to_string(),
        attributes,
        style,
        content: C::default(),
        closing_name: String::new(),
        closing_whitespace: String::new(),
        meta,
    }
}

/// Parses the raw content and closing tag of an extension tag.
fn parser_tag(
    cursor: &mut Cursor<'_>,
    name: &str,
    attributes: AttributeList,
    closer: &str,
) -> Result<Option<Inline>> {
    let start = cursor.offset();
    let Some((close_start, _)) = cursor.search(&pattern(closer), start) else {
        let content = cursor.rest();
        cursor.advance_to(cursor.text().len());
        let what = format!("<{name}> tag");
        return Ok(infer_close(cursor, &format!("</{name}>"), &what).map(|meta| {
            let mut node: ParserTag = tag_node(name, attributes, TagStyle::Normal, meta);
            node.content = content.to_string();
            Inline::ParserTag(node)
        }));
    };

    let content = cursor.text()[start..close_start].to_string();
    cursor.advance_to(close_start);
    let (closing_name, closing_whitespace) = closing_tag(cursor, name, closer);
    let meta = cursor.accept();
    Ok(Some(Inline::ParserTag(TagNode {
        name: name.to_string(),
        attributes,
        style: TagStyle::Normal,
        content,
        closing_name,
        closing_whitespace,
        meta,
    })))
}

/// Parses the Wikitext content and closing tag of an HTML tag.
fn html_tag(
    cursor: &mut Cursor<'_>,
    name: &str,
    lname: &str,
    attributes: AttributeList,
    closer: &str,
) -> Result<Option<Inline>> {
    let is_li = lname == "li";
    if !is_li && !has_closer(cursor, closer, cursor.offset()) {
        cursor.rollback();
        cursor.recovered(format!("unclosed <{name}> tag treated as text"));
        return Ok(None);
    }

    let terminator = if is_li {
        format!(r"{closer}|(?i:<li[\s/>]|</[ou]l\s*>)")
    } else {
        closer.to_string()
    };
    cursor.begin_context(Some(&terminator), true);
    let content = sub_document(cursor)?;
    cursor.accept();

    if cursor.look_ahead(closer).is_some() {
        let (closing_name, closing_whitespace) = closing_tag(cursor, name, closer);
        let meta = cursor.accept();
        return Ok(Some(Inline::HtmlTag(HtmlTag {
            name: name.to_string(),
            attributes,
            style: TagStyle::Normal,
            content,
            closing_name,
            closing_whitespace,
            meta,
        })));
    }

    if is_li {
        let meta = cursor.accept();
        let mut node: HtmlTag = tag_node(name, attributes, TagStyle::Unclosed, meta);
        node.content = content;
        return Ok(Some(Inline::HtmlTag(node)));
    }

    let what = format!("<{name}> tag");
    Ok(infer_close(cursor, &format!("</{name}>"), &what).map(|meta| {
        let mut node: HtmlTag = tag_node(name, attributes, TagStyle::Normal, meta);
        node.content = content;
        Inline::HtmlTag(node)
    }))
}

/// Consumes a closing tag matching `closer`, returning the tag name as
/// written and the whitespace after it.
fn closing_tag(cursor: &mut Cursor<'_>, name: &str, closer: &str) -> (String, String) {
    let matched = cursor.consume(closer).unwrap_or_default();
    let inner = matched
        .strip_prefix("</")
        .and_then(|inner| inner.strip_suffix('>'))
        .unwrap_or_default();
    let (closing_name, whitespace) = inner.split_at(name.len().min(inner.len()));
    (closing_name.to_string(), whitespace.to_string())
}

/// Where an attribute list appears.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum AttributeMode {
    /// Inside an HTML or extension start tag.
    Tag,
    /// On a table, row, caption, or cell line.
    Table,
}

impl AttributeMode {
    /// Whitespace between attributes.
    fn space(self) -> &'static str {
        match self {
            AttributeMode::Tag => r"\s+",
            AttributeMode::Table => r"[ \t]+",
        }
    }

    /// Terminator of an attribute name.
    fn name_end(self) -> &'static str {
        match self {
            AttributeMode::Tag => r#"[\s/>=]|["'<]"#,
            AttributeMode::Table => r#"[\s|=]|!!|["'<]"#,
        }
    }

    /// Whitespace and an equals sign.
    fn equals(self) -> &'static str {
        match self {
            AttributeMode::Tag => r"\s*=",
            AttributeMode::Table => r"[ \t]*=",
        }
    }

    /// Terminator of a value with the given quote style.
    fn value_end(self, quote: Quote) -> &'static str {
        match (self, quote) {
            (AttributeMode::Tag, Quote::None) => r"[\s>]|/>",
            (AttributeMode::Tag, Quote::Single) => "'",
            (AttributeMode::Tag, Quote::Double) => "\"",
            (AttributeMode::Table, Quote::None) => r"[\s|]|!!",
            (AttributeMode::Table, Quote::Single) => r"'|\n",
            (AttributeMode::Table, Quote::Double) => "\"|\n",
        }
    }
}

/// Parses a list of attributes and the whitespace after it.
pub(super) fn attributes(cursor: &mut Cursor<'_>, mode: AttributeMode) -> Result<AttributeList> {
    let mut list = AttributeList::default();
    loop {
        cursor.check_cancelled()?;
        match attribute(cursor, mode)? {
            Some(attribute) => list.attributes.attach(attribute),
            None => break,
        }
    }
    list.trailing_whitespace = cursor
        .consume(mode.space())
        .unwrap_or_default()
        .to_string();
    Ok(list)
}

/// Parses a single attribute.
fn attribute(cursor: &mut Cursor<'_>, mode: AttributeMode) -> Result<Option<TagAttribute>> {
    cursor.begin_context(None, false);
    let leading_whitespace = cursor.consume(mode.space()).unwrap_or_default().to_string();

    cursor.begin_context(Some(mode.name_end()), true);
    let name = run(cursor)?;
    cursor.accept();
    if name.is_empty() {
        return Ok(cursor.reject());
    }

    let mut attribute = TagAttribute {
        leading_whitespace,
        name,
        ..Default::default()
    };

    if let Some(equals) = cursor.consume(mode.equals()) {
        attribute.whitespace_before_eq = equals[..equals.len() - 1].to_string();
        attribute.whitespace_after_eq = cursor
            .consume(mode.space())
            .unwrap_or_default()
            .to_string();

        attribute.quote = if cursor.consume_str("\"") {
            Quote::Double
        } else if cursor.consume_str("'") {
            Quote::Single
        } else {
            Quote::None
        };

        cursor.begin_context(Some(mode.value_end(attribute.quote)), true);
        attribute.value = Some(sub_document(cursor)?);
        cursor.accept();

        if attribute.quote != Quote::None && !cursor.consume_str(attribute.quote.as_str()) {
            if cursor.at_end() && cursor.options.allow_closing_mark_inference {
                cursor.inferred("inferred closing quote for attribute");
                attribute.meta.inferred_closing_mark = true;
            } else {
                return Ok(cursor.reject());
            }
        }
    }

    let inferred = attribute.meta.inferred_closing_mark;
    attribute.meta = cursor.accept();
    attribute.meta.inferred_closing_mark = inferred;
    Ok(Some(attribute))
}
