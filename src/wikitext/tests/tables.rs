use super::*;

#[track_caller]
fn only_table(document: &Document) -> &Table {
    match only_block(document) {
        Block::Table(table) => table,
        block => panic!("expected table, got {block:#?}"),
    }
}

/// The content of every cell, by row.
fn cell_texts(table: &Table) -> Vec<Vec<String>> {
    table
        .rows
        .iter()
        .map(|row| row.cells.iter().map(|cell| cell.content.to_string()).collect())
        .collect()
}

#[test]
fn simple_table() {
    let document = parse("{|\n|a||b\n|-\n!h\n|}");
    let table = only_table(&document);
    assert_eq!(cell_texts(table), [vec!["a", "b"], vec!["h"]]);

    let first = &table.rows[0];
    assert!(!first.has_marker, "the first row has no marker");
    assert!(!first.cells[0].is_inline_sibling);
    assert!(first.cells[1].is_inline_sibling);

    let second = &table.rows[1];
    assert!(second.has_marker);
    assert!(second.cells[0].is_header);
    assert_eq!(second.cells[0].marker, '!');
}

#[test]
fn table_attributes_and_caption() {
    let document = parse(
        "{| class=\"wikitable\" style='width:100%'\n|+ style=\"color:red\" | The caption\n|- id=r1\n! scope=col | H1 !! H2\n| a\n| b\n|}",
    );
    let table = only_table(&document);
    assert_eq!(
        table
            .attributes
            .get("class")
            .and_then(|attribute| attribute.value.as_ref())
            .map(ToString::to_string)
            .as_deref(),
        Some("wikitable")
    );
    assert_eq!(
        table.attributes.get("style").map(|attribute| attribute.quote),
        Some(Quote::Single)
    );

    let caption = table.caption.as_ref().expect("caption");
    assert!(caption.attributes.is_some());
    assert_eq!(caption.content.to_string(), " The caption");

    assert_eq!(table.rows.len(), 1);
    let row = &table.rows[0];
    assert!(row.attributes.get("id").is_some());
    assert_eq!(cell_texts(table), [vec![" H1 ", " H2", " a", " b"]]);

    let header = &row.cells[0];
    assert!(header.attributes.is_some());
    assert!(row.cells[1].is_header && row.cells[1].is_inline_sibling);
    assert!(!row.cells[2].is_header);
}

#[test]
fn cell_without_attributes() {
    let document = parse("{|\n| [[a|b]] || {{c|d}}\n|}");
    let table = only_table(&document);
    let row = &table.rows[0];
    assert!(row.cells.iter().all(|cell| cell.attributes.is_none()));
    assert_eq!(cell_texts(table), [vec![" [[a|b]] ", " {{c|d}}"]]);
}

#[test]
fn multiline_cells() {
    let document = parse("{|\n|a\nstill a\n|b\n|}");
    assert_eq!(cell_texts(only_table(&document)), [vec!["a\nstill a", "b"]]);
}

#[test]
fn table_suffix() {
    let document = parse("{|\n|a\n|} after\nnext");
    assert_eq!(document.lines.len(), 2, "{document:#?}");
    let Block::Table(table) = &document.lines[0] else {
        panic!("expected table: {document:#?}");
    };
    assert_eq!(table.suffix.to_string(), " after");
}

#[test]
fn nested_tables() {
    let document = parse("{|\n|a\n{|\n|b\n|}\nc\n|d\n|}");
    let table = only_table(&document);
    let cell = &table.rows[0].cells[0];
    assert_eq!(cell.content.to_string(), "a");
    assert_eq!(cell.nested.len(), 2);

    let Block::Table(inner) = &cell.nested[0] else {
        panic!("expected nested table: {cell:#?}");
    };
    assert_eq!(cell_texts(inner), [vec!["b"]]);

    let Block::Paragraph(after) = &cell.nested[1] else {
        panic!("expected continuation: {cell:#?}");
    };
    assert_eq!(after.content.to_string(), "c");
    assert_eq!(table.rows[0].cells[1].content.to_string(), "d");
}

#[test]
fn closing_mark_belongs_to_innermost_table() {
    let document = parse("{|\n|a\n{| x\n|}");
    assert!(
        matches!(&*document.lines, [Block::Paragraph(_), Block::Table(_)]),
        "the outer table is unclosed: {document:#?}"
    );
}

#[test]
fn unclosed_table_is_text() {
    let output = parse_with(ParserOptions::default(), "{|\n|a\nb");
    assert!(
        output
            .document
            .lines
            .iter()
            .all(|block| matches!(block, Block::Paragraph(_))),
        "{:#?}",
        output.document
    );
    assert!(
        output
            .diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity == Severity::Warning)
    );
}

#[test]
fn unclosed_table_is_inferred() {
    let options = ParserOptions {
        allow_closing_mark_inference: true,
        ..Default::default()
    };
    let output = parse_with(options, "{|\n|a\n|b");
    let table = only_table(&output.document);
    assert!(table.meta.inferred_closing_mark);
    assert_eq!(cell_texts(table), [vec!["a", "b"]]);
}

#[test]
fn table_inside_template_argument() {
    let document = parse("{{a|\n{|\n|x\n|}\n}}");
    let Inline::Template(template) = only_inline(&document) else {
        panic!("expected template: {document:#?}");
    };
    assert!(
        template.arguments[0]
            .value
            .lines
            .iter()
            .any(|block| matches!(block, Block::Table(_))),
        "{template:#?}"
    );
}
