//! Namespaces and title normalisation for template lookups.

use html_escape::decode_html_entities;
use std::borrow::Cow;

/// An article namespace.
#[derive(Debug, Eq)]
pub struct Namespace {
    /// The namespace ID.
    pub id: i32,
    /// The display name of the namespace.
    pub name: &'static str,
    /// The canonical name of the namespace, if it differs from the display
    /// name.
    pub canonical: Option<&'static str>,
    /// Named aliases for the namespace.
    pub aliases: &'static [&'static str],
}

impl PartialEq for Namespace {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Namespace {
    /// The main namespace ID.
    pub const MAIN: i32 = 0;
    /// The template namespace ID.
    pub const TEMPLATE: i32 = 10;

    /// Finds the namespace with the given numeric ID.
    pub fn find_by_id(id: i32) -> Option<&'static Self> {
        NAMESPACES.iter().find(|ns| ns.id == id)
    }

    /// Finds the namespace with the given case-insensitive name. Searches the
    /// name, canonical name, and all aliases. Underscores match spaces.
    pub fn find_by_name(name: &str) -> Option<&'static Self> {
        let name = normalize(name);
        NAMESPACES.iter().find(|ns| {
            ns.name.eq_ignore_ascii_case(&name)
                || ns
                    .canonical
                    .is_some_and(|canonical| name.eq_ignore_ascii_case(canonical))
                || ns
                    .aliases
                    .iter()
                    .any(|alias| alias.eq_ignore_ascii_case(&name))
        })
    }
}

/// The standard namespaces of a MediaWiki installation.
static NAMESPACES: &[Namespace] = &[
    Namespace { id: -2, name: "Media", canonical: None, aliases: &[] },
    Namespace { id: -1, name: "Special", canonical: None, aliases: &[] },
    Namespace { id: 0, name: "", canonical: None, aliases: &[] },
    Namespace { id: 1, name: "Talk", canonical: None, aliases: &[] },
    Namespace { id: 2, name: "User", canonical: None, aliases: &[] },
    Namespace { id: 3, name: "User talk", canonical: None, aliases: &[] },
    Namespace { id: 4, name: "Project", canonical: None, aliases: &["WP", "Wikipedia"] },
    Namespace { id: 5, name: "Project talk", canonical: None, aliases: &["WT"] },
    Namespace { id: 6, name: "File", canonical: None, aliases: &["Image"] },
    Namespace { id: 7, name: "File talk", canonical: None, aliases: &["Image talk"] },
    Namespace { id: 8, name: "MediaWiki", canonical: None, aliases: &[] },
    Namespace { id: 9, name: "MediaWiki talk", canonical: None, aliases: &[] },
    Namespace { id: 10, name: "Template", canonical: None, aliases: &["T"] },
    Namespace { id: 11, name: "Template talk", canonical: None, aliases: &[] },
    Namespace { id: 12, name: "Help", canonical: None, aliases: &[] },
    Namespace { id: 13, name: "Help talk", canonical: None, aliases: &[] },
    Namespace { id: 14, name: "Category", canonical: None, aliases: &[] },
    Namespace { id: 15, name: "Category talk", canonical: None, aliases: &[] },
    Namespace { id: 828, name: "Module", canonical: None, aliases: &[] },
    Namespace { id: 829, name: "Module talk", canonical: None, aliases: &[] },
];

/// Normalises the target of a transclusion into the key used to fetch and
/// cache template content, and to detect loops.
///
/// A leading `subst:` or `safesubst:` is removed. A leading `:` selects the
/// main namespace and is kept, so that `{{:Foo}}` and `{{Foo}}` are different
/// pages. A `Template:` prefix (or an alias of it) is removed, since it is the
/// default namespace. Prefixes of other namespaces are kept with their
/// display name. The first letter of the page name is capitalised.
pub fn template_title(name: &str) -> String {
    let name = normalize(name);
    let name = strip_subst(&name);

    if let Some(rest) = name.strip_prefix(':') {
        return format!(":{}", ucfirst(&normalize(rest)));
    }

    if let Some((prefix, rest)) = name.split_once(':')
        && let Some(ns) = Namespace::find_by_name(prefix)
    {
        let rest = ucfirst(rest.trim_start());
        return if ns.id == Namespace::TEMPLATE {
            rest
        } else if ns.id == Namespace::MAIN {
            format!(":{rest}")
        } else {
            format!("{}:{rest}", ns.name)
        };
    }

    ucfirst(name)
}

/// Removes a `subst:` or `safesubst:` prefix from a template name.
pub fn strip_subst(name: &str) -> &str {
    let name = name.trim_start();
    for prefix in ["subst:", "safesubst:"] {
        if name.len() >= prefix.len()
            && name.is_char_boundary(prefix.len())
            && name[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            return name[prefix.len()..].trim_start();
        }
    }
    name
}

/// Capitalises the first character of `text`.
fn ucfirst(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Returns true if the given character `c` is a bidirectional text control
/// character.
fn bidi(c: char) -> bool {
    ('\u{200e}'..='\u{200f}').contains(&c) || ('\u{202a}'..='\u{202e}').contains(&c)
}

/// Normalises a title text part by decoding HTML entities and converting
/// runs of whitespace + underscore to a single space character.
pub fn normalize(text: &str) -> Cow<'_, str> {
    let decoded = decode_html_entities(text);
    let mut out = String::new();
    let mut flushed = 0;
    let mut iter = decoded.char_indices().peekable();

    while let Some((index, c)) = iter.next() {
        // Peek to avoid switching to owned-mode when encountering a single
        // space
        if trimmable(c) && (c != ' ' || matches!(iter.peek(), Some((_, c)) if trimmable(*c))) {
            while iter.next_if(|(_, c)| trimmable(*c)).is_some() {}

            // Acts like `trim`, not emitting a space at the start or end of
            // the text.
            if let Some((next_index, _)) = iter.peek() {
                out += &decoded[flushed..index];
                flushed = *next_index;
                if index != 0 && spacelike(c) {
                    out.push(' ');
                }
            }
        }
    }

    if flushed == 0 {
        match decoded {
            Cow::Borrowed(b) => Cow::Borrowed(b.trim_matches(trimmable)),
            Cow::Owned(o) => Cow::Owned(o.trim_matches(trimmable).to_string()),
        }
    } else {
        out += decoded[flushed..].trim_end_matches(trimmable);
        Cow::Owned(out)
    }
}

/// Returns true if the character `c` is considered like whitespace in title
/// text.
fn spacelike(c: char) -> bool {
    c == '_' || c.is_whitespace()
}

/// Returns true if the character `c` is trimmable in title text.
fn trimmable(c: char) -> bool {
    bidi(c) || spacelike(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize() {
        assert_eq!(super::normalize("A b"), Cow::Borrowed("A b"));
        assert_eq!(super::normalize("A_b"), "A b");
        assert_eq!(super::normalize("A__  __b"), "A b");
        assert_eq!(super::normalize("   A b   "), Cow::Borrowed("A b"));
        assert_eq!(super::normalize(" \t A b"), Cow::Borrowed("A b"));
        assert_eq!(super::normalize("\u{200e}A b   \u{202e}"), "A b");
    }

    #[test]
    fn template_titles() {
        assert_eq!(template_title("foo"), "Foo");
        assert_eq!(template_title(" foo_bar "), "Foo bar");
        assert_eq!(template_title("Template:foo"), "Foo");
        assert_eq!(template_title("template: foo"), "Foo");
        assert_eq!(template_title("subst:foo"), "Foo");
        assert_eq!(template_title("SafeSubst: foo"), "Foo");
        assert_eq!(template_title(":foo"), ":Foo");
        assert_eq!(template_title("user:bob/box"), "User:Bob/box");
        assert_eq!(template_title("Not a namespace: x"), "Not a namespace: x");
        assert_eq!(template_title("\u{e9}t\u{e9}"), "\u{c9}t\u{e9}");
    }

    #[test]
    fn namespaces() {
        assert_eq!(Namespace::find_by_id(10).map(|ns| ns.name), Some("Template"));
        assert_eq!(
            Namespace::find_by_name("user_talk").map(|ns| ns.id),
            Some(3)
        );
        assert_eq!(Namespace::find_by_name("image").map(|ns| ns.id), Some(6));
        assert_eq!(Namespace::find_by_name("nope"), None);
    }
}
