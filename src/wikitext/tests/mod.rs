use super::*;

mod blocks;
mod extras;
mod tables;

/// Parses `text` with `options`, checking that the tree reproduces the input
/// exactly and that the parse never reports an internal error.
#[track_caller]
fn parse_with(options: ParserOptions, text: &str) -> Output {
    let _ = env_logger::try_init();

    let output = Parser::new(options).parse_with_diagnostics(text);
    assert_eq!(
        output.document.to_string(),
        text,
        "round trip mismatch for {text:?}: {:#?}",
        output.document
    );
    assert!(
        output
            .diagnostics
            .iter()
            .all(|diagnostic| diagnostic.severity != Severity::Error),
        "internal error for {text:?}: {:?}",
        output.diagnostics
    );
    output
}

/// Parses `text` with the default options.
#[track_caller]
fn parse(text: &str) -> Document {
    parse_with(ParserOptions::default(), text).document
}

/// Returns the only block of a document.
#[track_caller]
fn only_block(document: &Document) -> &Block {
    assert_eq!(document.lines.len(), 1, "expected one block: {document:#?}");
    &document.lines[0]
}

/// Returns the inlines of a document which is a single paragraph.
#[track_caller]
fn only_inlines(document: &Document) -> &[Inline] {
    match only_block(document) {
        Block::Paragraph(paragraph) => &paragraph.content.inlines,
        block => panic!("expected a paragraph, got {block:#?}"),
    }
}

/// Returns the only inline of a document which is a single paragraph.
#[track_caller]
fn only_inline(document: &Document) -> &Inline {
    let inlines = only_inlines(document);
    assert_eq!(inlines.len(), 1, "expected one inline: {inlines:#?}");
    &inlines[0]
}

/// Returns the source text of every inline, for compact comparisons.
fn texts(inlines: &[Inline]) -> Vec<String> {
    inlines.iter().map(ToString::to_string).collect()
}
