//! Block-level driver.
//!
//! The driver reads one source line at a time and tries, in order, a table,
//! a list item, a horizontal rule, and a heading, falling back to a
//! paragraph line. Paragraph lines are merged into the previous paragraph
//! while it is still open.

use super::{
    Position, Result, Severity,
    cursor::Cursor,
    inline::{append_run, append_text, run},
    nodes::{
        Block, Document, Heading, HorizontalRule, ListItem, NodeList, NodeMeta, Paragraph, Run,
    },
    table::table,
};

/// Parses a whole document. The cursor must be at the start of the input.
pub(super) fn document(cursor: &mut Cursor<'_>) -> Result<Document> {
    let mut document = sub_document(cursor)?;
    if !cursor.at_end() {
        // Only reachable if some construct stopped on a terminator that no
        // enclosing context owns, which would be a bug.
        cursor.diagnostic(Severity::Error, "unparsed trailing input");
        let mut rest = Run::default();
        rest.push_text(cursor.rest());
        cursor.advance_to(cursor.text().len());
        document.lines.attach(Block::Paragraph(Paragraph {
            content: rest,
            compact: true,
            ..Default::default()
        }));
    }
    Ok(document)
}

/// Parses a sequence of lines until the end of the input or until a
/// terminator of an enclosing context matches.
pub(super) fn sub_document(cursor: &mut Cursor<'_>) -> Result<Document> {
    cursor.begin_context(None, false);
    let mut lines = NodeList::new();
    let mut separator = None;
    loop {
        cursor.check_cancelled()?;
        let start = cursor.offset();
        line(cursor, &mut lines, separator)?;

        if cursor.at_end() || cursor.needs_terminate() {
            break;
        }

        separator = Some(cursor.pos());
        if !cursor.consume_str("\n") {
            // A line stopped in the middle of the input without an
            // enclosing terminator; keep going on the same source line.
            separator = None;
            if cursor.offset() == start {
                recover(cursor, &mut lines);
            }
        }
    }
    let meta = cursor.accept();
    Ok(Document { lines, meta })
}

/// Consumes a single character as plain text when no production can make
/// progress.
fn recover(cursor: &mut Cursor<'_>, lines: &mut NodeList<Block>) {
    cursor.recovered("unparseable character consumed as text");
    let start = cursor.offset();
    cursor.consume_char();
    let text = &cursor.text()[start..cursor.offset()];
    if let Some(Block::Paragraph(paragraph)) = lines.last_mut()
        && paragraph.compact
    {
        paragraph.content.push_text(text);
    } else {
        lines.attach(Block::Paragraph(Paragraph {
            content: Run::from_text(text),
            compact: true,
            ..Default::default()
        }));
    }
}

/// Parses a single line into `lines`. `separator` is the position of the
/// line break before the line, if there was one.
fn line(
    cursor: &mut Cursor<'_>,
    lines: &mut NodeList<Block>,
    separator: Option<Position>,
) -> Result {
    if cursor.at_line_start() && !cursor.needs_terminate() {
        let rest = cursor.rest();
        let block = if rest.starts_with("{|") {
            table(cursor)?.map(Block::Table)
        } else if rest.starts_with([' ', '*', '#', ':', ';']) {
            list_item(cursor)?.map(Block::ListItem)
        } else if rest.starts_with("----") {
            horizontal_rule(cursor).map(Block::HorizontalRule)
        } else if rest.starts_with('=') {
            heading(cursor)?.map(Block::Heading)
        } else {
            None
        };

        if let Some(block) = block {
            lines.attach(block);
            return Ok(());
        }
    }

    paragraph_line(cursor, lines, separator)
}

/// Parses a list item, `*# item`, or a preformatted line, ` text`.
fn list_item(cursor: &mut Cursor<'_>) -> Result<Option<ListItem>> {
    cursor.begin_context(Some("\n"), false);
    let Some(prefix) = cursor.consume(r"[*#:;]+| ") else {
        return Ok(cursor.reject());
    };
    let content = run(cursor)?;
    let meta = cursor.accept();
    Ok(Some(ListItem {
        prefix: prefix.to_string(),
        content,
        meta,
    }))
}

/// Parses a horizontal rule, `----`.
fn horizontal_rule(cursor: &mut Cursor<'_>) -> Option<HorizontalRule> {
    cursor.begin_context(None, false);
    let Some(dashes) = cursor.consume("-{4,}").map(str::len) else {
        return cursor.reject();
    };
    let suffix = cursor.consume("[ \t]*").unwrap_or_default();
    if cursor.at_end() || cursor.rest().starts_with('\n') || cursor.needs_terminate() {
        let meta = cursor.accept();
        Some(HorizontalRule {
            dashes,
            suffix: suffix.to_string(),
            meta,
        })
    } else {
        cursor.reject()
    }
}

/// Parses a heading, trying the longest possible level first.
fn heading(cursor: &mut Cursor<'_>) -> Result<Option<Heading>> {
    let marks = cursor.rest().bytes().take_while(|b| *b == b'=').count();
    for level in (1..=marks.min(6)).rev() {
        if let Some(heading) = heading_at_level(cursor, level)? {
            return Ok(Some(heading));
        }
    }
    Ok(None)
}

/// Attempts to parse a heading of exactly `level`.
///
/// The content is read in segments which each end at a run of exactly
/// `level` equals signs. If something other than whitespace and comments
/// follows such a run, the run becomes part of the content and another
/// segment is read. The whole attempt is rolled back if the line ends
/// without a closing run.
fn heading_at_level(cursor: &mut Cursor<'_>, level: usize) -> Result<Option<Heading>> {
    let marks = &"======"[..level];
    let closer = format!("={{{level}}}(?!=)");

    cursor.begin_context(Some("\n"), false);
    cursor.consume_str(marks);

    let mut content = Run::default();
    loop {
        cursor.check_cancelled()?;

        cursor.begin_context(Some(&closer), false);
        let segment = run(cursor)?;
        cursor.accept();
        append_run(&mut content, segment);

        let close_start = cursor.pos();
        if !cursor.consume_str(marks) {
            return Ok(cursor.reject());
        }

        let suffix = heading_suffix(cursor);
        if cursor.at_end() || cursor.needs_terminate() {
            let meta = cursor.accept();
            return Ok(Some(Heading {
                level: level as u8,
                content,
                suffix,
                meta,
            }));
        }

        append_text(&mut content, marks, close_start, cursor.options);
        append_run(&mut content, suffix);
    }
}

/// Parses whitespace and comments after a closing heading run.
fn heading_suffix(cursor: &mut Cursor<'_>) -> Run {
    cursor.begin_context(None, false);
    let mut suffix = Run::default();
    loop {
        let start = cursor.pos();
        if let Some(space) = cursor.consume("[ \t]+") {
            append_text(&mut suffix, space, start, cursor.options);
        } else if cursor.rest().starts_with("<!--")
            && let Some(comment) = super::inline::comment(cursor)
        {
            suffix.inlines.attach(comment);
        } else {
            break;
        }
    }
    suffix.meta = cursor.accept();
    suffix
}

/// Parses a paragraph line, merging it into an open paragraph or closing an
/// open paragraph if the line is blank.
fn paragraph_line(
    cursor: &mut Cursor<'_>,
    lines: &mut NodeList<Block>,
    separator: Option<Position>,
) -> Result {
    cursor.begin_context(Some("\n"), false);
    let content = run(cursor)?;
    let meta = cursor.accept();

    let open = match lines.last_mut() {
        Some(Block::Paragraph(paragraph)) if paragraph.compact && !paragraph.content.is_empty() => {
            Some(paragraph)
        }
        _ => None,
    };

    match (open, content.is_empty()) {
        (Some(paragraph), true) if separator.is_some() => {
            paragraph.compact = false;
            extend_span(&mut paragraph.meta, &meta);
        }
        (Some(_), true) => {}
        (Some(paragraph), false) => {
            if let Some(separator) = separator {
                append_text(&mut paragraph.content, "\n", separator, cursor.options);
            }
            append_run(&mut paragraph.content, content);
            extend_span(&mut paragraph.meta, &meta);
            extend_span(&mut paragraph.content.meta, &meta);
        }
        (None, _) => {
            lines.attach(Block::Paragraph(Paragraph {
                content,
                compact: true,
                meta,
            }));
        }
    }
    Ok(())
}

/// Extends the span of `meta` to cover the span of `other`.
fn extend_span(meta: &mut NodeMeta, other: &NodeMeta) {
    if let (Some(span), Some(other)) = (&mut meta.span, other.span) {
        *span = span.merge(other);
    }
}
