use super::*;

#[test]
fn empty() {
    let document = parse("");
    assert_eq!(document.lines.len(), 1);
    assert!(document.is_empty());
}

#[test]
fn paragraphs() {
    let document = parse("a\nb\n\nc");
    assert_eq!(document.lines.len(), 2, "{document:#?}");

    let Block::Paragraph(first) = &document.lines[0] else {
        panic!("expected paragraph: {document:#?}");
    };
    assert!(!first.compact, "blank line should close the paragraph");
    assert_eq!(first.content.to_string(), "a\nb");

    let Block::Paragraph(second) = &document.lines[1] else {
        panic!("expected paragraph: {document:#?}");
    };
    assert!(second.compact);
    assert_eq!(second.content.to_string(), "c");
}

#[test]
fn blank_lines() {
    for text in ["\n", "\n\n", "a\n\n\nb", "a\n\n\n\n", "\n\na"] {
        parse(text);
    }

    let document = parse("a\n\n\nb");
    assert_eq!(document.lines.len(), 3, "{document:#?}");
    let Block::Paragraph(placeholder) = &document.lines[1] else {
        panic!("expected paragraph: {document:#?}");
    };
    assert!(placeholder.content.is_empty() && placeholder.compact);
}

#[test]
fn headings() {
    let document = parse("=== Title ===");
    let Block::Heading(heading) = only_block(&document) else {
        panic!("expected heading: {document:#?}");
    };
    assert_eq!(heading.level, 3);
    assert_eq!(heading.content.to_string(), " Title ");
    assert!(heading.suffix.is_empty());

    let document = parse("== A ==  <!-- note -->\ntext");
    let Block::Heading(heading) = &document.lines[0] else {
        panic!("expected heading: {document:#?}");
    };
    assert_eq!(heading.level, 2);
    assert_eq!(heading.suffix.to_string(), "  <!-- note -->");
}

#[test]
fn unbalanced_headings() {
    let document = parse("== A ===");
    let Block::Heading(heading) = only_block(&document) else {
        panic!("expected heading: {document:#?}");
    };
    assert_eq!(heading.level, 2);
    assert_eq!(heading.content.to_string(), " A =");

    let document = parse("==== B ==");
    let Block::Heading(heading) = only_block(&document) else {
        panic!("expected heading: {document:#?}");
    };
    assert_eq!(heading.level, 2);
    assert_eq!(heading.content.to_string(), "== B ");
}

#[test]
fn not_headings() {
    let document = parse("== A == trailing");
    assert!(
        matches!(only_block(&document), Block::Paragraph(_)),
        "text after the closing marks should prevent a heading: {document:#?}"
    );

    let document = parse("== A\nB ==");
    assert!(
        document
            .lines
            .iter()
            .all(|block| matches!(block, Block::Paragraph(_))),
        "headings cannot span lines: {document:#?}"
    );
}

#[test]
fn heading_with_equals_in_content() {
    let document = parse("== a == b ==");
    let Block::Heading(heading) = only_block(&document) else {
        panic!("expected heading: {document:#?}");
    };
    assert_eq!(heading.level, 2);
    assert_eq!(heading.content.to_string(), " a == b ");
}

#[test]
fn list_items() {
    let document = parse("* one\n** two\n#: three\n; term\n pre");
    let items = document
        .lines
        .iter()
        .map(|block| match block {
            Block::ListItem(item) => (item.prefix.as_str(), item.depth(), item.is_preformatted()),
            block => panic!("expected list item: {block:#?}"),
        })
        .collect::<Vec<_>>();
    assert_eq!(
        items,
        [
            ("*", 1, false),
            ("**", 2, false),
            ("#:", 2, false),
            (";", 1, false),
            (" ", 1, true)
        ]
    );
}

#[test]
fn horizontal_rules() {
    let document = parse("----\n------  \n---- x");
    let Block::HorizontalRule(rule) = &document.lines[0] else {
        panic!("expected rule: {document:#?}");
    };
    assert_eq!(rule.dashes, 4);

    let Block::HorizontalRule(rule) = &document.lines[1] else {
        panic!("expected rule: {document:#?}");
    };
    assert_eq!(rule.dashes, 6);
    assert_eq!(rule.suffix, "  ");

    assert!(
        matches!(document.lines[2], Block::Paragraph(_)),
        "text after a rule is not a rule: {document:#?}"
    );
}

#[test]
fn blocks_only_at_line_start() {
    let document = parse("a * b == c ==");
    assert_eq!(texts(only_inlines(&document)), ["a * b == c =="]);
}

#[test]
fn source_spans() {
    let options = ParserOptions {
        track_source_spans: true,
        ..Default::default()
    };
    let output = parse_with(options, "ab\ncd\n\n== x ==");
    let document = &output.document;

    let span = document.meta.span.expect("document span");
    assert_eq!(span.into_range(), 0..14);
    assert_eq!(span.end.line, 3);

    let Block::Paragraph(paragraph) = &document.lines[0] else {
        panic!("expected paragraph: {document:#?}");
    };
    assert_eq!(
        paragraph.content.meta.span.map(SourceSpan::into_range),
        Some(0..5)
    );

    let heading = &document.lines[1];
    let span = heading.meta().span.expect("heading span");
    assert_eq!(span.into_range(), 7..14);
    assert_eq!((span.start.line, span.start.column), (3, 0));
}

#[test]
fn no_spans_by_default() {
    let document = parse("a [[b]]");
    assert!(
        NodeRef::Document(&document)
            .descendants()
            .all(|node| node.meta().span.is_none())
    );
}
