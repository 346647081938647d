//! Tables, `{| ... |}`.
//!
//! Table structure is line-oriented. Every marker (`|+`, `|-`, `|`, `!`,
//! `|}`) must start a source line, except for the `||` and `!!` separators
//! between cells on the same line. Content between markers is parsed as
//! inline content, so a table can span any number of source lines.

use super::{
    Result,
    cursor::Cursor,
    inline::{AttributeMode, append_run, append_text, attributes, run},
    nodes::{
        AttributeList, Block, NodeList, Paragraph, Run, Table, TableCaption, TableCell, TableRow,
    },
};

/// Terminator of a table prelude, row prelude, or caption.
const LINE_CONTENT: &str = r"\n[|!]";
/// Terminator of a data cell.
const DATA_CELL: &str = r"\n[|!]|\|\||\n\{\|";
/// Terminator of a header cell.
const HEADER_CELL: &str = r"\n[|!]|\|\||!!|\n\{\|";
/// The start of a line of cells. `|}` closes the table and `|-` starts a
/// row.
const CELL_LINE: &str = r"\n(?:\|(?![}\-])|!)";

/// Parses a table at the start of a line.
pub(super) fn table(cursor: &mut Cursor<'_>) -> Result<Option<Table>> {
    if !cursor.rest().starts_with("{|") {
        return Ok(None);
    }
    cursor.nested("table", table_body)
}

fn table_body(cursor: &mut Cursor<'_>) -> Result<Option<Table>> {
    cursor.begin_context(None, false);
    if !cursor.consume_str("{|") {
        return Ok(cursor.reject());
    }

    let mut table = Table {
        attributes: attributes(cursor, AttributeMode::Table)?,
        prelude: content(cursor, LINE_CONTENT)?,
        ..Default::default()
    };

    let closed = loop {
        cursor.check_cancelled()?;
        let rest = cursor.rest();
        if cursor.consume_str("\n|}") {
            break true;
        } else if table.caption.is_none() && table.rows.is_empty() && rest.starts_with("\n|+") {
            table.caption = Some(caption(cursor)?);
        } else if rest.starts_with("\n|-") {
            table.rows.attach(row(cursor, true)?);
        } else if cursor.look_ahead(CELL_LINE).is_some() {
            table.rows.attach(row(cursor, false)?);
        } else {
            break false;
        }
    };

    if closed {
        cursor.begin_context(Some("\n"), false);
        table.suffix = run(cursor)?;
        cursor.accept();
        table.meta = cursor.accept();
        Ok(Some(table))
    } else if cursor.at_end() && cursor.options.allow_closing_mark_inference {
        cursor.inferred("inferred closing `|}` for table");
        table.meta = cursor.accept();
        table.meta.inferred_closing_mark = true;
        Ok(Some(table))
    } else {
        cursor.rollback();
        cursor.recovered("unclosed table treated as text");
        Ok(None)
    }
}

/// Parses inline content up to `terminator`, returning `None` if there is
/// none.
fn content(cursor: &mut Cursor<'_>, terminator: &str) -> Result<Option<Run>> {
    cursor.begin_context(Some(terminator), false);
    let content = run(cursor)?;
    cursor.accept();
    Ok((!content.is_empty()).then_some(content))
}

/// Parses an optional attribute section terminated by a single `|`.
fn attribute_section(cursor: &mut Cursor<'_>, terminator: &str) -> Result<Option<AttributeList>> {
    cursor.begin_context(Some(terminator), false);
    let attributes = attributes(cursor, AttributeMode::Table)?;
    let rest = cursor.rest();
    if rest.starts_with('|') && !rest.starts_with("||") {
        cursor.consume_str("|");
        cursor.accept();
        Ok(Some(attributes))
    } else {
        cursor.rollback();
        Ok(None)
    }
}

/// Parses a table caption, `|+ caption`.
fn caption(cursor: &mut Cursor<'_>) -> Result<TableCaption> {
    cursor.begin_context(None, false);
    cursor.consume_str("\n|+");
    let attributes = attribute_section(cursor, LINE_CONTENT)?;
    let content = content(cursor, LINE_CONTENT)?.unwrap_or_default();
    let meta = cursor.accept();
    Ok(TableCaption {
        attributes,
        content,
        meta,
    })
}

/// Parses a table row. The first row of a table may have no `|-` marker.
fn row(cursor: &mut Cursor<'_>, has_marker: bool) -> Result<TableRow> {
    cursor.begin_context(None, false);
    let mut row = TableRow {
        has_marker,
        ..Default::default()
    };

    if has_marker {
        cursor.consume_str("\n|-");
        row.attributes = attributes(cursor, AttributeMode::Table)?;
        row.prelude = content(cursor, LINE_CONTENT)?;
    }

    while let Some(marker) = cursor.look_ahead(CELL_LINE) {
        cursor.check_cancelled()?;
        let is_header = marker.ends_with('!');
        let terminator = if is_header { HEADER_CELL } else { DATA_CELL };
        let mut opener = marker;
        loop {
            row.cells
                .attach(cell(cursor, opener, is_header, terminator)?);
            opener = if cursor.rest().starts_with("||") {
                "||"
            } else if is_header && cursor.rest().starts_with("!!") {
                "!!"
            } else {
                break;
            };
        }
    }

    row.meta = cursor.accept();
    Ok(row)
}

/// Parses a cell starting with `opener`, which is either a line break and a
/// marker or a doubled marker.
fn cell(
    cursor: &mut Cursor<'_>,
    opener: &str,
    is_header: bool,
    terminator: &str,
) -> Result<TableCell> {
    cursor.begin_context(None, false);
    cursor.consume_str(opener);

    let is_inline_sibling = !opener.starts_with('\n');
    let marker = opener.chars().last().unwrap_or('|');
    let attributes = attribute_section(cursor, terminator)?;

    cursor.begin_context(Some(terminator), false);
    let mut content = run(cursor)?;
    let mut nested = NodeList::new();
    while cursor.rest().starts_with("\n{|") {
        cursor.check_cancelled()?;
        nested_table(cursor, &mut content, &mut nested)?;
    }
    cursor.accept();

    let meta = cursor.accept();
    Ok(TableCell {
        is_header,
        is_inline_sibling,
        marker,
        attributes,
        content,
        nested,
        meta,
    })
}

/// Parses a table nested in a cell, along with any content after it up to
/// the next cell terminator. If the nested table is malformed, its text is
/// appended to the content of the cell instead.
fn nested_table(
    cursor: &mut Cursor<'_>,
    content: &mut Run,
    nested: &mut NodeList<Block>,
) -> Result {
    let separator = cursor.pos();
    cursor.consume_str("\n");

    if let Some(table) = table(cursor)? {
        nested.attach(Block::Table(table));
        if cursor.rest().starts_with('\n') && !cursor.needs_terminate() {
            cursor.consume_str("\n");
            nested.attach(Block::Paragraph(Paragraph {
                content: run(cursor)?,
                compact: true,
                ..Default::default()
            }));
        }
        return Ok(());
    }

    let opener = cursor.pos();
    cursor.consume_str("{|");
    let mut text = Run::default();
    append_text(&mut text, "{|", opener, cursor.options);
    append_run(&mut text, run(cursor)?);

    match nested.last_mut() {
        None => {
            append_text(content, "\n", separator, cursor.options);
            append_run(content, text);
        }
        Some(Block::Paragraph(paragraph)) => {
            append_text(&mut paragraph.content, "\n", separator, cursor.options);
            append_run(&mut paragraph.content, text);
        }
        Some(_) => nested.attach(Block::Paragraph(Paragraph {
            content: text,
            compact: true,
            ..Default::default()
        })),
    }
    Ok(())
}
