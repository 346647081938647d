use super::*;

#[test]
fn malformed_input_round_trips() {
    for text in [
        "[[[[[[",
        "]]]]",
        "{{{{{{{{",
        "}}}}",
        "{{a|{{b|{{c",
        "<div><div><div>",
        "</div>",
        "'''''''",
        "{|\n|}|}",
        "|}\n|-\n||",
        "=\n==\n===",
        "[http://",
        "[[a|[[b|c]]",
        "<!--",
        "<nowiki>",
        "<ref name=\"a",
        "{{a|b=}}{{=}}",
        "[[File:a|b=|]]",
        "{|\n!a!!b||c\n|-\n|+x\n|}",
        "* [[a\n# {{b\n: <span>",
        "\u{1F600} {{\u{E9}|\u{2603}}}",
    ] {
        parse(text);
    }
}

#[test]
fn unclosed_constructs_warn() {
    let output = parse_with(ParserOptions::default(), "{{a|b");
    assert_eq!(
        texts(only_inlines(&output.document)),
        ["{{a|b"],
        "unclosed template should be text"
    );
    assert_eq!(output.diagnostics.len(), 1, "{:?}", output.diagnostics);
    let diagnostic = &output.diagnostics[0];
    assert_eq!(diagnostic.severity, Severity::Warning);
    assert_eq!((diagnostic.line, diagnostic.column), (0, 0));
    assert!(diagnostic.context.starts_with("{{a"));
}

#[test]
fn unclosed_brace_runs_are_text() {
    let text = "{".repeat(16);
    let output = parse_with(ParserOptions::default(), &text);
    assert!(
        matches!(only_inline(&output.document), Inline::PlainText(_)),
        "{:#?}",
        output.document
    );
    assert_eq!(output.diagnostics.len(), 1, "{:?}", output.diagnostics);
    assert_eq!(output.diagnostics[0].severity, Severity::Warning);
}

#[test]
fn deep_nesting_is_text() {
    let warns = |output: &Output, what: &str| {
        assert!(
            output.diagnostics.iter().any(|diagnostic| {
                diagnostic.severity == Severity::Warning
                    && diagnostic.message.contains("nested too deeply")
            }),
            "no nesting warning for {what}"
        );
    };

    let text = format!("{}{}", "{{a|".repeat(10_000), "}}".repeat(10_000));
    let output = parse_with(ParserOptions::default(), &text);
    warns(&output, "templates");
    assert!(
        matches!(&only_inlines(&output.document)[0], Inline::Template(_)),
        "outer template survives"
    );

    let text = format!("{}{}", "<div>".repeat(10_000), "</div>".repeat(10_000));
    let output = parse_with(ParserOptions::default(), &text);
    warns(&output, "tags");
}

#[test]
fn parser_is_shared_between_threads() {
    let _ = env_logger::try_init();
    let parser = Parser::default();
    let inputs = [
        "{{a|b={{c}}}} [[d|e]]",
        "== f ==\n* ''g''\n# '''h'''",
        "{|\n! i\n|-\n| j || k\n|}",
        "<div class=\"l\">m<ref>n</ref></div> http://example.org/o",
    ];
    let expected = inputs.map(|text| parser.parse_with_diagnostics(text));

    std::thread::scope(|scope| {
        for (text, expected) in inputs.iter().zip(&expected) {
            let parser = &parser;
            scope.spawn(move || {
                for _ in 0..50 {
                    let output = parser.parse_with_diagnostics(text);
                    assert_eq!(output.document.to_string(), *text, "round trip");
                    assert_eq!(output.document, expected.document, "same tree for {text:?}");
                    assert_eq!(output.diagnostics, expected.diagnostics);
                }
            });
        }
    });
}

#[test]
fn closing_marks_are_inferred() {
    let options = ParserOptions {
        allow_closing_mark_inference: true,
        ..Default::default()
    };
    let output = parse_with(options, "x {{a|[[b");
    let inlines = only_inlines(&output.document);
    let Inline::Template(template) = &inlines[1] else {
        panic!("expected template: {inlines:#?}");
    };
    assert!(template.meta.inferred_closing_mark);

    let link = NodeRef::Inline(&inlines[1])
        .descendants()
        .find_map(|node| match node {
            NodeRef::Inline(Inline::WikiLink(link)) => Some(link),
            _ => None,
        })
        .expect("nested link");
    assert!(link.meta.inferred_closing_mark);

    assert!(
        output
            .diagnostics
            .iter()
            .all(|diagnostic| diagnostic.severity == Severity::Info),
        "{:?}",
        output.diagnostics
    );
}

#[test]
fn deep_nesting() {
    let depth = 40;
    let text = format!("{}x{}", "{{a|".repeat(depth), "}}".repeat(depth));
    let document = parse(&text);
    let templates = NodeRef::Document(&document)
        .descendants()
        .filter(|node| matches!(node, NodeRef::Inline(Inline::Template(_))))
        .count();
    assert_eq!(templates, depth);
}

#[test]
fn many_unclosed_openers() {
    let text = "{{a|[[b|<span>".repeat(300);
    parse(&text);
}

#[test]
fn cancellation() {
    let parser = Parser::default();
    let token = CancellationToken::new();
    assert!(parser.parse_cancellable("a", &token).is_ok());

    token.cancel();
    assert!(token.is_cancelled());
    assert!(matches!(
        parser.parse_cancellable("{{a|b}}\nc", &token),
        Err(Error::Cancelled)
    ));

    assert_eq!(
        parser.parse("after").to_string(),
        "after",
        "a cancelled parse should not poison the parser"
    );
}

#[test]
fn shared_between_threads() {
    let parser = Parser::default();
    let inputs = ["{{a|b}}", "[[c]] d", "{|\n|e\n|}", "== f =="];
    std::thread::scope(|scope| {
        for input in inputs {
            let parser = &parser;
            scope.spawn(move || {
                for _ in 0..20 {
                    assert_eq!(parser.parse(input).to_string(), input);
                }
            });
        }
    });
}

#[test]
fn options_from_json() {
    let options = ParserOptions::from_json(r#"{ "image_namespaces": ["Datei"] }"#).unwrap();
    let document = parse_with(options, "[[Datei:a.png|x]] [[File:b.png]]").document;
    let inlines = only_inlines(&document);
    assert!(matches!(inlines[0], Inline::ImageLink(_)));
    assert!(matches!(inlines[2], Inline::WikiLink(_)));
}

#[test]
fn empty_names_and_targets() {
    let document = parse("{{}} [[]] []");
    assert!(
        only_inlines(&document)
            .iter()
            .all(|inline| matches!(inline, Inline::PlainText(_)))
    );

    let options = ParserOptions {
        allow_empty_template_name: true,
        allow_empty_wiki_link_target: true,
        allow_empty_external_link_target: true,
        ..Default::default()
    };
    let document = parse_with(options, "{{}} [[]] []").document;
    assert_eq!(
        texts(only_inlines(&document)),
        ["{{}}", " ", "[[]]", " ", "[]"]
    );
}

#[test]
fn tree_cursor_over_parse() {
    let document = parse("a [[b]]\n\n== c ==");
    let mut cursor = TreeCursor::new(NodeRef::Document(&document));
    assert!(cursor.goto_first_child());
    assert!(matches!(cursor.node(), NodeRef::Block(Block::Paragraph(_))));
    assert!(cursor.goto_next_sibling());
    assert!(matches!(cursor.node(), NodeRef::Block(Block::Heading(_))));
    assert!(!cursor.goto_next_sibling());
    assert!(cursor.goto_previous_sibling());
    assert!(cursor.goto_parent());
    assert_eq!(cursor.depth(), 0);
}

#[test]
fn edit_and_reserialize() {
    let mut document = parse("{{a|b}} c");
    let Some(Block::Paragraph(paragraph)) = document.lines.last_mut() else {
        panic!("expected paragraph");
    };
    let Some(Inline::Template(template)) = paragraph.content.inlines.get_mut(0) else {
        panic!("expected template");
    };
    template.name = Run::from_text("z");
    let argument = template.arguments[0].clone();
    template.arguments.attach(argument);
    assert_eq!(document.to_string(), "{{z|b|b}} c");
}
