use super::*;
use crate::wikitext::Block;
use std::cell::Cell;

/// 2024-02-29T13:05:09Z
const NOW: i64 = 1_709_211_909;

fn options() -> ExpansionOptions {
    ExpansionOptions {
        now: Some(NOW),
        local_offset: Some(3600),
        ..Default::default()
    }
}

#[track_caller]
fn expand_with(options: ExpansionOptions, templates: &[(&str, &str)], text: &str) -> String {
    let _ = env_logger::try_init();
    let provider = templates.iter().copied().collect::<MapProvider>();
    TemplateExpander::new(ParserOptions::default(), options)
        .expand(text, &provider)
        .unwrap()
}

#[track_caller]
fn expand(templates: &[(&str, &str)], text: &str) -> String {
    expand_with(options(), templates, text)
}

#[test]
fn plain_text() {
    let text = "== Heading ==\n''text'' with [[a link|links]]\n* and a list";
    assert_eq!(expand(&[], text), text, "text without templates is unchanged");
}

#[test]
fn argument_defaults() {
    let templates = [("Greet", "Hello, {{{1|World}}}!")];
    assert_eq!(expand(&templates, "{{Greet}}"), "Hello, World!");
    assert_eq!(expand(&templates, "{{Greet|Alice}}"), "Hello, Alice!");
    assert_eq!(expand(&templates, "{{greet|1=Bob}}"), "Hello, Bob!");
    assert_eq!(
        expand(&templates, "{{Template:greet|Carol}}"),
        "Hello, Carol!",
        "namespace prefix"
    );
}

#[test]
fn arguments() {
    let templates = [("T", "({{{1}}}/{{{a}}}/{{{b|B}}})")];
    assert_eq!(
        expand(&templates, "{{T| x | a = y }}"),
        "( x /y/B)",
        "positional values are untrimmed, named values are trimmed"
    );
    assert_eq!(
        expand(&templates, "{{T|x|1=z}}"),
        "(z/{{{a}}}/B)",
        "later arguments win and unbound references are kept"
    );
}

#[test]
fn arguments_expand_in_caller_scope() {
    let templates = [
        ("Outer", "{{Inner|{{{1}}}|x={{{2|two}}}}}"),
        ("Inner", "({{{1}}}:{{{x}}})"),
    ];
    assert_eq!(expand(&templates, "{{Outer|one}}"), "(one:two)");
    assert_eq!(expand(&templates, "{{Outer|one|2}}"), "(one:2)");
}

#[test]
fn top_level_arguments() {
    assert_eq!(expand(&[], "{{{1}}} {{{1|d}}}"), "{{{1}}} d");
}

#[test]
fn template_loop() {
    let templates = [("A", "a{{B}}"), ("B", "b{{A}}")];
    assert_eq!(
        expand(&templates, "{{A}}"),
        r#"ab<span class="error">Template loop detected: [[Template:A]]</span>"#
    );

    let options = ExpansionOptions {
        max_depth: 5,
        ..options()
    };
    assert_eq!(
        expand_with(options, &[("Deep", "{{Deep}}")], "{{Deep}}"),
        r#"<span class="error">Template loop detected: [[Template:Deep]]</span>"#,
        "self-transclusion is a loop"
    );
}

#[test]
fn depth_limit() {
    let _ = env_logger::try_init();
    let provider = (1..10)
        .map(|n| (format!("L{n}"), format!("{n}{{{{L{}}}}}", n + 1)))
        .collect::<MapProvider>();
    let expander = TemplateExpander::new(
        ParserOptions::default(),
        ExpansionOptions {
            max_depth: 5,
            ..options()
        },
    );
    assert_eq!(
        expander.expand("{{L1}}", &provider).unwrap(),
        r#"12345<span class="error">Template recursion depth limit exceeded (5)</span>"#
    );
}

#[test]
fn missing_templates() {
    assert_eq!(expand(&[], "{{Nope|a}}"), "{{Nope|a}}");

    let options = ExpansionOptions {
        missing_template: MissingTemplate::NameOnly,
        ..options()
    };
    assert_eq!(expand_with(options, &[], "{{ nope |a}}"), "{{nope}}");
}

#[test]
fn templates_are_loaded_once() {
    let _ = env_logger::try_init();
    let calls = Cell::new(0);
    let provider = |name: &str| {
        calls.set(calls.get() + 1);
        (name == "T").then(|| "t".to_string())
    };
    let expander = TemplateExpander::default();
    assert_eq!(expander.expand("{{T}}{{t}}{{T}}", &provider).unwrap(), "ttt");
    assert_eq!(calls.get(), 1, "content is cached by normalised name");
}

#[test]
fn transclusion_tags() {
    let templates = [
        ("T", "a<noinclude>doc</noinclude><includeonly>b</includeonly>c"),
        (
            "O",
            "junk<onlyinclude>one</onlyinclude>more<onlyinclude>two</onlyinclude>",
        ),
    ];
    assert_eq!(expand(&templates, "{{T}}"), "abc");
    assert_eq!(
        expand(&templates, "x<includeonly>y</includeonly><noinclude>z</noinclude>"),
        "xz",
        "top level"
    );
    assert_eq!(expand(&templates, "{{O}}"), "onetwo");
    assert_eq!(expand(&templates, "<onlyinclude>v</onlyinclude>"), "v");
}

#[test]
fn templates_inside_other_nodes() {
    let templates = [("T", "x")];
    assert_eq!(expand(&templates, "[[{{T}}|{{T}}]]"), "[[x|x]]");
    assert_eq!(expand(&templates, "'''{{T}}'''"), "'''x'''");
    assert_eq!(
        expand(&templates, "<span title=\"{{T}}\">{{T}}</span>"),
        "<span title=\"x\">x</span>"
    );
}

#[test]
fn dynamic_names() {
    let templates = [("Name", "Greet"), ("Greet", "hi {{{1}}}")];
    assert_eq!(expand(&templates, "{{ {{Name}} |you}}"), "hi you");
    assert_eq!(expand(&templates, "{{subst:lc:ABC}}"), "abc");
}

#[test]
fn unknown_parser_function() {
    assert_eq!(expand(&[], "{{#nope: x}}"), "{{#nope: x}}");
}

#[test]
fn cancellation() {
    let _ = env_logger::try_init();
    let provider = MapProvider::from_iter([("A", "a")]);
    let expander = TemplateExpander::default();

    let token = CancellationToken::new();
    assert_eq!(
        expander.expand_cancellable("{{A}}", &provider, &token).unwrap(),
        "a"
    );

    token.cancel();
    assert!(matches!(
        expander.expand_cancellable("{{A}}", &provider, &token),
        Err(Error::Parse(wikitext::Error::Cancelled))
    ));
}

#[test]
fn expand_to_document() {
    let _ = env_logger::try_init();
    let provider = MapProvider::from_iter([("H", "== {{{1}}} ==")]);
    let document = TemplateExpander::default()
        .expand_to_document("{{H|Title}}", &provider)
        .unwrap();
    assert!(
        matches!(&*document.lines, [Block::Heading(_)]),
        "{document:#?}"
    );
    assert_eq!(document.to_string(), "== Title ==");
}

#[test]
fn context_chain() {
    let root = ExpansionContext::default();
    let child = ExpansionContext {
        depth: 1,
        name: Some("A".into()),
        parent: Some(&root),
        ..Default::default()
    };
    let grandchild = ExpansionContext {
        depth: 2,
        name: Some("B".into()),
        parent: Some(&child),
        ..Default::default()
    };

    assert_eq!(root.name(), None);
    assert_eq!(grandchild.depth(), 2);
    assert!(grandchild.contains("A"));
    assert!(grandchild.contains("B"));
    assert!(!grandchild.contains("C"));
    assert!(!root.contains("A"));
    assert!(!grandchild.has_argument("1"));
}

#[test]
fn options_from_json() {
    let options =
        ExpansionOptions::from_json(r#"{ "max_depth": 3, "missing_template": "NameOnly" }"#)
            .unwrap();
    assert_eq!(options.max_depth, 3);
    assert_eq!(options.missing_template, MissingTemplate::NameOnly);
    assert_eq!(options.max_async_rounds, 40);
    assert!(matches!(
        ExpansionOptions::from_json(r#"{ "max_depth": "x" }"#),
        Err(Error::InvalidOptions(_))
    ));
}

#[tokio::test]
async fn async_provider() {
    let _ = env_logger::try_init();
    let provider = MapProvider::from_iter([("A", "{{B}}!"), ("B", "b{{{1|}}}")]);

    let expander = TemplateExpander::default();
    assert_eq!(
        expander.expand_async("{{A}} {{C}}", &provider).await.unwrap(),
        "b! {{C}}"
    );

    let expander = TemplateExpander::new(
        ParserOptions::default(),
        ExpansionOptions {
            max_async_rounds: 1,
            ..Default::default()
        },
    );
    assert_eq!(
        expander.expand_async("{{A}}", &provider).await.unwrap(),
        "{{A}}",
        "nothing is fetched before the first round"
    );
}
