//! Parser configuration data.

use phf::Set;
use serde::Deserialize;

/// Options which control what the parser recognises.
///
/// The defaults correspond to a stock MediaWiki installation with the common
/// extensions installed. Options can be loaded from JSON using
/// [`ParserOptions::from_json`]; any omitted field keeps its default.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Tag names of extension tags whose content is captured as raw text,
    /// lowercased.
    pub parser_tags: Vec<String>,

    /// Tag names of HTML tags which never have content or a closing tag,
    /// lowercased.
    pub self_closing_tags: Vec<String>,

    /// Tag names of HTML tags whose content is parsed as Wikitext,
    /// lowercased.
    pub html_tags: Vec<String>,

    /// Namespace names, and aliases, which make a link into an image link.
    pub image_namespaces: Vec<String>,

    /// Magic words which are only recognised with exact case.
    pub magic_words_case_sensitive: Vec<String>,

    /// Magic words which are recognised in any case, lowercased.
    pub magic_words_case_insensitive: Vec<String>,

    /// Whether `{{}}` is accepted as a template with an empty name.
    pub allow_empty_template_name: bool,

    /// Whether `[[]]` is accepted as a link with an empty target.
    pub allow_empty_wiki_link_target: bool,

    /// Whether `[]` is accepted as an external link with an empty target.
    pub allow_empty_external_link_target: bool,

    /// Whether constructs with a missing closing delimiter are accepted at the
    /// end of the input, with [`NodeMeta::inferred_closing_mark`] set.
    ///
    /// [`NodeMeta::inferred_closing_mark`]: super::NodeMeta::inferred_closing_mark
    pub allow_closing_mark_inference: bool,

    /// Whether every node records its position in the source text.
    pub track_source_spans: bool,
}

impl ParserOptions {
    /// Loads options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, super::Error> {
        serde_json::from_str(json).map_err(super::Error::InvalidOptions)
    }

    /// Returns true if `name` is the name of a raw-content extension tag.
    pub fn is_parser_tag(&self, name: &str) -> bool {
        contains_ignore_case(&self.parser_tags, name)
    }

    /// Returns true if `name` is the name of a void HTML tag.
    pub fn is_self_closing_tag(&self, name: &str) -> bool {
        contains_ignore_case(&self.self_closing_tags, name)
    }

    /// Returns true if `name` is the name of a known HTML tag, including
    /// void tags.
    pub fn is_html_tag(&self, name: &str) -> bool {
        contains_ignore_case(&self.html_tags, name) || self.is_self_closing_tag(name)
    }

    /// Returns true if `name` is an image namespace.
    pub fn is_image_namespace(&self, name: &str) -> bool {
        contains_ignore_case(&self.image_namespaces, name.trim())
    }

    /// Returns true if `name` is a magic word or parser function name. Any
    /// name starting with `#` is considered a parser function.
    pub fn is_magic_word(&self, name: &str) -> bool {
        let name = name.trim();
        if name.len() > 1 && name.starts_with('#') {
            return true;
        }
        self.magic_words_case_sensitive.iter().any(|word| word == name)
            || contains_ignore_case(&self.magic_words_case_insensitive, name)
    }
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            parser_tags: to_owned(&EXTENSION_TAGS),
            self_closing_tags: to_owned(&VOID_TAGS),
            html_tags: to_owned(&HTML5_TAGS),
            image_namespaces: vec!["File".into(), "Image".into()],
            magic_words_case_sensitive: to_owned(&VARIABLES),
            magic_words_case_insensitive: to_owned(&FUNCTION_HOOKS),
            allow_empty_template_name: false,
            allow_empty_wiki_link_target: false,
            allow_empty_external_link_target: false,
            allow_closing_mark_inference: false,
            track_source_spans: false,
        }
    }
}

/// Returns true if `list` contains `value`, ignoring ASCII case.
fn contains_ignore_case(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(value))
}

/// Copies a static set into a sorted owned list.
fn to_owned(set: &Set<&'static str>) -> Vec<String> {
    let mut list = set.iter().map(|item| (*item).to_string()).collect::<Vec<_>>();
    list.sort_unstable();
    list
}

/// URL protocols recognised for external links, lowercased.
pub(crate) static PROTOCOLS: &[&str] = &[
    "bitcoin:", "ftp://", "ftps://", "geo:", "git://", "gopher://", "http://",
    "https://", "irc://", "ircs://", "magnet:", "mailto:", "matrix:", "mms://",
    "news:", "nntp://", "redis://", "sftp://", "sip:", "sips:", "sms:", "ssh://",
    "svn://", "tel:", "telnet://", "urn:", "worldwind://", "xmpp:", "//",
];

/// Extension tags with raw text content.
static EXTENSION_TAGS: Set<&str> = phf::phf_set! {
    "pre", "nowiki", "gallery", "indicator", "graph", "timeline", "hiero",
    "charinsert", "ref", "references", "inputbox", "imagemap", "source",
    "syntaxhighlight", "poem", "categorytree", "section", "score",
    "templatestyles", "templatedata", "math", "ce", "chem", "maplink",
    "mapframe",
};

/// HTML tags which are always empty.
static VOID_TAGS: Set<&str> = phf::phf_set! {
    "br", "hr", "wbr",
};

/// HTML5 tags allowed in Wikitext, plus the transclusion control tags.
static HTML5_TAGS: Set<&str> = phf::phf_set! {
    // Explicit `<a>` tags are forbidden in Wikitext.
    "abbr",
    "b", "bdi", "bdo", "big", "blockquote",
    "caption", "center", "cite", "code",
    "data", "dd", "del", "dfn", "div", "dl", "dt",
    "em",
    "font",
    "h1", "h2", "h3", "h4", "h5", "h6",
    "i", "includeonly", "ins",
    "kbd",
    "li",
    "mark",
    "noinclude",
    "ol", "onlyinclude",
    "p",
    "q",
    "rb", "rp", "rt", "rtc", "ruby",
    "s", "samp", "small", "span", "strike", "strong", "sub", "sup",
    "table", "td", "th", "time", "tr", "tt",
    "u", "ul",
    "var",
};

/// Case-sensitive magic word variables.
static VARIABLES: Set<&str> = phf::phf_set! {
    "!", "=", "CURRENTYEAR", "CURRENTMONTH", "CURRENTMONTH1", "CURRENTMONTH2",
    "CURRENTMONTHNAME", "CURRENTMONTHABBREV", "CURRENTDAY", "CURRENTDAY2",
    "CURRENTDAYNAME", "CURRENTDOW", "CURRENTHOUR", "CURRENTTIME",
    "CURRENTTIMESTAMP", "CURRENTWEEK", "LOCALYEAR", "LOCALMONTH", "LOCALMONTH1",
    "LOCALMONTH2", "LOCALMONTHNAME", "LOCALMONTHABBREV", "LOCALDAY", "LOCALDAY2",
    "LOCALDAYNAME", "LOCALDOW", "LOCALHOUR", "LOCALTIME", "LOCALTIMESTAMP",
    "LOCALWEEK",
};

/// Case-insensitive parser function names that are used without a `#`.
static FUNCTION_HOOKS: Set<&str> = phf::phf_set! {
    "ns", "urlencode", "lcfirst", "ucfirst", "lc", "uc", "formatnum", "plural",
    "padleft", "padright", "anchorencode",
};
