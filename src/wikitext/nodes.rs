//! Wikitext syntax tree types.
//!
//! The tree is a strict single-owner tree: every node is owned by exactly one
//! parent collection. Attaching a node that is still owned elsewhere requires
//! going through [`NodeList::attach_cloned`], which deep-copies it. Parent and
//! sibling navigation is provided by [`TreeCursor`], which records the path
//! from the root instead of storing back-references in every node.

use super::codemap::SourceSpan;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
};

/// A side-channel value that can be attached to any node.
pub trait Annotation: Any + fmt::Debug + Send + Sync {
    /// Clones this annotation into a new box.
    fn clone_box(&self) -> Box<dyn Annotation>;
    /// Upcasts to [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Upcasts to [`Any`] for mutable downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T> Annotation for T
where
    T: Any + Clone + fmt::Debug + Send + Sync,
{
    fn clone_box(&self) -> Box<dyn Annotation> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An open-ended bag of annotations, keyed by type.
///
/// Annotations do not participate in node equality.
#[derive(Debug, Default)]
pub struct Annotations(HashMap<TypeId, Box<dyn Annotation>>);

impl Annotations {
    /// Stores `value`, replacing any existing annotation of the same type.
    /// Returns true if a value was replaced.
    pub fn insert<T: Annotation>(&mut self, value: T) -> bool {
        self.0.insert(TypeId::of::<T>(), Box::new(value)).is_some()
    }

    /// Gets the annotation of type `T`.
    pub fn get<T: Annotation>(&self) -> Option<&T> {
        self.0
            .get(&TypeId::of::<T>())
            .and_then(|value| value.as_ref().as_any().downcast_ref::<T>())
    }

    /// Gets the annotation of type `T` mutably.
    pub fn get_mut<T: Annotation>(&mut self) -> Option<&mut T> {
        self.0
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.as_mut().as_any_mut().downcast_mut::<T>())
    }

    /// Removes the annotation of type `T`. Returns true if one existed.
    pub fn remove<T: Annotation>(&mut self) -> bool {
        self.0.remove(&TypeId::of::<T>()).is_some()
    }

    /// Returns true if there are no annotations.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of annotations.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Clone for Annotations {
    fn clone(&self) -> Self {
        Self(
            self.0
                .iter()
                .map(|(key, value)| (*key, value.as_ref().clone_box()))
                .collect(),
        )
    }
}

impl PartialEq for Annotations {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl Eq for Annotations {}

/// Data common to every node.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NodeMeta {
    /// The location of the node in the source text, if spans were tracked.
    pub span: Option<SourceSpan>,
    /// Whether the closing delimiter of the node was synthesised instead of
    /// being present in the source.
    pub inferred_closing_mark: bool,
    /// Arbitrary side-channel data.
    pub annotations: Annotations,
}

/// An ordered collection of child nodes owned by a single parent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeList<T>(Vec<T>);

impl<T> Default for NodeList<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> NodeList<T> {
    /// Creates an empty list.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends `node`, taking ownership of it.
    pub fn attach(&mut self, node: T) {
        self.0.push(node);
    }

    /// Inserts `node` before the child at `index`.
    ///
    /// # Panics
    ///
    /// If `index > len`.
    pub fn insert_before(&mut self, index: usize, node: T) {
        self.0.insert(index, node);
    }

    /// Inserts `node` after the child at `index`.
    ///
    /// # Panics
    ///
    /// If `index >= len`.
    pub fn insert_after(&mut self, index: usize, node: T) {
        assert!(index < self.0.len(), "insert_after index out of range");
        self.0.insert(index + 1, node);
    }

    /// Removes and returns the child at `index`, leaving it parentless.
    ///
    /// # Panics
    ///
    /// If `index >= len`.
    pub fn detach(&mut self, index: usize) -> T {
        self.0.remove(index)
    }

    /// Removes all children.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Returns the last child mutably.
    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.0.last_mut()
    }

    /// Returns the child at `index` mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.0.get_mut(index)
    }

    /// Iterates the children mutably.
    pub fn iter_mut(&mut self) -> core::slice::IterMut<'_, T> {
        self.0.iter_mut()
    }

    /// Consumes the list, returning its children.
    pub fn into_vec(self) -> Vec<T> {
        self.0
    }
}

impl<T: Clone> NodeList<T> {
    /// Appends a deep copy of `node`, which is owned by another parent.
    pub fn attach_cloned(&mut self, node: &T) {
        self.0.push(node.clone());
    }
}

impl<T> core::ops::Deref for NodeList<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> From<Vec<T>> for NodeList<T> {
    fn from(value: Vec<T>) -> Self {
        Self(value)
    }
}

impl<T> FromIterator<T> for NodeList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T> IntoIterator for NodeList<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a NodeList<T> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The root of a parsed Wikitext tree, or a nested sub-document.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Document {
    /// The block-level lines of the document.
    pub lines: NodeList<Block>,
    /// Node metadata.
    pub meta: NodeMeta,
}

impl Document {
    /// Returns true if the document has no content at all.
    pub fn is_empty(&self) -> bool {
        match &*self.lines {
            [] => true,
            [Block::Paragraph(p)] => p.compact && p.content.inlines.is_empty(),
            _ => false,
        }
    }
}

/// A block-level node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Block {
    /// A paragraph.
    Paragraph(Paragraph),
    /// A section heading.
    Heading(Heading),
    /// A list item or indented preformatted line.
    ListItem(ListItem),
    /// A horizontal rule.
    HorizontalRule(HorizontalRule),
    /// A table.
    Table(Table),
}

impl Block {
    /// The metadata of the node.
    pub fn meta(&self) -> &NodeMeta {
        match self {
            Block::Paragraph(node) => &node.meta,
            Block::Heading(node) => &node.meta,
            Block::ListItem(node) => &node.meta,
            Block::HorizontalRule(node) => &node.meta,
            Block::Table(node) => &node.meta,
        }
    }

    /// The metadata of the node, mutably.
    pub fn meta_mut(&mut self) -> &mut NodeMeta {
        match self {
            Block::Paragraph(node) => &mut node.meta,
            Block::Heading(node) => &mut node.meta,
            Block::ListItem(node) => &mut node.meta,
            Block::HorizontalRule(node) => &mut node.meta,
            Block::Table(node) => &mut node.meta,
        }
    }
}

/// A paragraph of inline content.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Paragraph {
    /// The content of the paragraph.
    pub content: Run,
    /// True if the paragraph has not been closed by a blank line, which means
    /// following text lines continue it.
    pub compact: bool,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// A section heading, like `== Heading ==`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Heading {
    /// The heading level, from 1 to 6.
    pub level: u8,
    /// The heading text.
    pub content: Run,
    /// Whitespace after the closing `=` run.
    pub suffix: Run,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// A list item, like `*# item`, or an indented preformatted line.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ListItem {
    /// The list markers, one per nesting level (`*`, `#`, `:`, `;`), or a
    /// single space for preformatted text.
    pub prefix: String,
    /// The item content.
    pub content: Run,
    /// Node metadata.
    pub meta: NodeMeta,
}

impl ListItem {
    /// The nesting depth of the item.
    pub fn depth(&self) -> usize {
        self.prefix.len()
    }

    /// Returns true if this line is indented preformatted text rather than
    /// a list item.
    pub fn is_preformatted(&self) -> bool {
        self.prefix == " "
    }
}

/// A horizontal rule, `----`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HorizontalRule {
    /// The number of dashes, at least 4.
    pub dashes: usize,
    /// Whitespace after the dashes.
    pub suffix: String,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// A table, `{| ... |}`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Table {
    /// The table attributes.
    pub attributes: AttributeList,
    /// Content between the attribute line and the first table marker.
    pub prelude: Option<Run>,
    /// The table caption, `|+ caption`.
    pub caption: Option<TableCaption>,
    /// The table rows.
    pub rows: NodeList<TableRow>,
    /// Content following the closing `|}` on the same line.
    pub suffix: Run,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// A table caption.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TableCaption {
    /// The caption attributes, if an attribute section terminated by `|`
    /// was present.
    pub attributes: Option<AttributeList>,
    /// The caption text.
    pub content: Run,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// A table row.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TableRow {
    /// True if the row began with a `|-` marker. Only the first row of a
    /// table may omit it.
    pub has_marker: bool,
    /// The row attributes.
    pub attributes: AttributeList,
    /// Content between the row marker line and the first cell.
    pub prelude: Option<Run>,
    /// The row cells.
    pub cells: NodeList<TableCell>,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// A table data or header cell.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableCell {
    /// True for header cells (`!`).
    pub is_header: bool,
    /// True if the cell was introduced by `||` or `!!` on the same line as
    /// the previous cell.
    pub is_inline_sibling: bool,
    /// The marker character, `|` or `!`.
    pub marker: char,
    /// The cell attributes, if an attribute section terminated by `|` was
    /// present.
    pub attributes: Option<AttributeList>,
    /// The cell content.
    pub content: Run,
    /// Tables nested inside the cell, followed by any content after them.
    pub nested: NodeList<Block>,
    /// Node metadata.
    pub meta: NodeMeta,
}

impl Default for TableCell {
    fn default() -> Self {
        Self {
            is_header: false,
            is_inline_sibling: false,
            marker: '|',
            attributes: None,
            content: Run::default(),
            nested: NodeList::new(),
            meta: NodeMeta::default(),
        }
    }
}

/// A list of tag or table attributes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttributeList {
    /// The attributes.
    pub attributes: NodeList<TagAttribute>,
    /// Whitespace after the last attribute.
    pub trailing_whitespace: String,
}

impl AttributeList {
    /// Finds the value of the first attribute with the given name,
    /// case-insensitively.
    pub fn get(&self, name: &str) -> Option<&TagAttribute> {
        self.attributes
            .iter()
            .find(|attr| attr.name.to_string().trim().eq_ignore_ascii_case(name))
    }
}

/// The quoting style of an attribute value.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Quote {
    /// `name=value`
    #[default]
    None,
    /// `name='value'`
    Single,
    /// `name="value"`
    Double,
}

impl Quote {
    /// The quote character, as a string.
    pub fn as_str(self) -> &'static str {
        match self {
            Quote::None => "",
            Quote::Single => "'",
            Quote::Double => "\"",
        }
    }
}

/// A single tag attribute, `name = "value"`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TagAttribute {
    /// Whitespace before the attribute name.
    pub leading_whitespace: String,
    /// The attribute name.
    pub name: Run,
    /// Whitespace between the name and `=`.
    pub whitespace_before_eq: String,
    /// Whitespace between `=` and the value.
    pub whitespace_after_eq: String,
    /// The attribute value. If `None`, there was no `=`.
    pub value: Option<Document>,
    /// The value quote style.
    pub quote: Quote,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// A sequence of inline nodes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Run {
    /// The inline nodes.
    pub inlines: NodeList<Inline>,
    /// Node metadata.
    pub meta: NodeMeta,
}

impl Run {
    /// Creates a run containing a single plain text node.
    pub fn from_text(text: impl Into<String>) -> Self {
        let mut run = Self::default();
        run.push_text(&text.into());
        run
    }

    /// Appends text, merging it into a trailing plain text node if there is
    /// one.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Inline::PlainText(last)) = self.inlines.last_mut() {
            last.content += text;
        } else {
            self.inlines.attach(Inline::PlainText(PlainText::new(text)));
        }
    }

    /// Appends a node, merging adjacent plain text.
    pub fn push(&mut self, node: Inline) {
        match node {
            Inline::PlainText(text) if text.meta.span.is_none() => self.push_text(&text.content),
            node => self.inlines.attach(node),
        }
    }

    /// Returns true if the run has no content.
    pub fn is_empty(&self) -> bool {
        self.inlines.is_empty()
    }
}

/// An inline node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Inline {
    /// Literal text.
    PlainText(PlainText),
    /// An internal link, `[[target|text]]`.
    WikiLink(WikiLink),
    /// An external link, `[url text]` or a bare URL.
    ExternalLink(ExternalLink),
    /// An image link, `[[File:x.png|thumb|caption]]`.
    ImageLink(ImageLink),
    /// A template transclusion or parser function call.
    Template(Template),
    /// A template argument reference, `{{{name|default}}}`.
    ArgumentReference(ArgumentReference),
    /// A bold or italic toggle.
    FormatSwitch(FormatSwitch),
    /// An HTML comment.
    Comment(Comment),
    /// An HTML tag with parsed content.
    HtmlTag(HtmlTag),
    /// An extension tag with raw content.
    ParserTag(ParserTag),
}

impl Inline {
    /// The metadata of the node.
    pub fn meta(&self) -> &NodeMeta {
        match self {
            Inline::PlainText(node) => &node.meta,
            Inline::WikiLink(node) => &node.meta,
            Inline::ExternalLink(node) => &node.meta,
            Inline::ImageLink(node) => &node.meta,
            Inline::Template(node) => &node.meta,
            Inline::ArgumentReference(node) => &node.meta,
            Inline::FormatSwitch(node) => &node.meta,
            Inline::Comment(node) => &node.meta,
            Inline::HtmlTag(node) => &node.meta,
            Inline::ParserTag(node) => &node.meta,
        }
    }

    /// The metadata of the node, mutably.
    pub fn meta_mut(&mut self) -> &mut NodeMeta {
        match self {
            Inline::PlainText(node) => &mut node.meta,
            Inline::WikiLink(node) => &mut node.meta,
            Inline::ExternalLink(node) => &mut node.meta,
            Inline::ImageLink(node) => &mut node.meta,
            Inline::Template(node) => &mut node.meta,
            Inline::ArgumentReference(node) => &mut node.meta,
            Inline::FormatSwitch(node) => &mut node.meta,
            Inline::Comment(node) => &mut node.meta,
            Inline::HtmlTag(node) => &mut node.meta,
            Inline::ParserTag(node) => &mut node.meta,
        }
    }
}

/// Literal text.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PlainText {
    /// The text.
    pub content: String,
    /// Node metadata.
    pub meta: NodeMeta,
}

impl PlainText {
    /// Creates a new plain text node.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            meta: NodeMeta::default(),
        }
    }
}

/// An internal link.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WikiLink {
    /// The link target.
    pub target: Run,
    /// The display text, if a `|` was present.
    pub text: Option<Run>,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// An external link.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExternalLink {
    /// The URL.
    pub target: Run,
    /// The display text, including the whitespace that separates it from the
    /// URL.
    pub text: Option<Run>,
    /// True if the link was written in brackets; false for a bare URL.
    pub brackets: bool,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// A link to an image.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ImageLink {
    /// The image title, including the namespace.
    pub target: Run,
    /// The image options and caption.
    pub arguments: NodeList<ImageLinkArgument>,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// One `|`-separated part of an image link.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ImageLinkArgument {
    /// The option name, for `name=value` parts.
    pub name: Option<Run>,
    /// The value.
    pub value: Run,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// A template transclusion, magic word, or parser function call.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Template {
    /// The template name, or the function name for magic words.
    pub name: Run,
    /// The arguments.
    pub arguments: NodeList<TemplateArgument>,
    /// True if the name is a magic word. For magic words, the first argument
    /// is separated from the name by `:` instead of `|`.
    pub is_magic_word: bool,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// A template argument.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TemplateArgument {
    /// The argument name, for `name=value` arguments.
    pub name: Option<Document>,
    /// The argument value.
    pub value: Document,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// A reference to a template argument.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ArgumentReference {
    /// The argument name.
    pub name: Document,
    /// The value used when the argument is not bound.
    pub default: Option<Document>,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// A bold and/or italic toggle. Two switches with the same flag bracket a
/// formatted region.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FormatSwitch {
    /// Toggles bold.
    pub switch_bold: bool,
    /// Toggles italics.
    pub switch_italics: bool,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// An HTML comment.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Comment {
    /// The text between `<!--` and `-->`.
    pub content: String,
    /// Node metadata.
    pub meta: NodeMeta,
}

/// How a tag is closed.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum TagStyle {
    /// `<tag>content</tag>`
    #[default]
    Normal,
    /// `<tag/>`
    SelfClosing,
    /// `<tag>content` with no closing tag, as for void tags and `<li>`.
    Unclosed,
}

/// An HTML-like tag.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TagNode<C> {
    /// The tag name, as written.
    pub name: String,
    /// The tag attributes.
    pub attributes: AttributeList,
    /// How the tag is closed.
    pub style: TagStyle,
    /// The tag content.
    pub content: C,
    /// The tag name in the closing tag, as written.
    pub closing_name: String,
    /// Whitespace between the closing tag name and `>`.
    pub closing_whitespace: String,
    /// Node metadata.
    pub meta: NodeMeta,
}

impl<C> TagNode<C> {
    /// The lowercased tag name.
    pub fn normalized_name(&self) -> String {
        self.name.to_ascii_lowercase()
    }
}

/// An HTML tag whose content is Wikitext.
pub type HtmlTag = TagNode<Document>;

/// An extension tag whose content is raw text.
pub type ParserTag = TagNode<String>;

/// A borrowed reference to any node in a tree.
#[derive(Clone, Copy, Debug)]
pub enum NodeRef<'a> {
    /// A document.
    Document(&'a Document),
    /// A block.
    Block(&'a Block),
    /// An inline.
    Inline(&'a Inline),
    /// A run.
    Run(&'a Run),
    /// A template argument.
    TemplateArgument(&'a TemplateArgument),
    /// An image link argument.
    ImageLinkArgument(&'a ImageLinkArgument),
    /// A tag attribute.
    TagAttribute(&'a TagAttribute),
    /// A table caption.
    TableCaption(&'a TableCaption),
    /// A table row.
    TableRow(&'a TableRow),
    /// A table cell.
    TableCell(&'a TableCell),
}

impl<'a> NodeRef<'a> {
    /// The metadata of the node.
    pub fn meta(self) -> &'a NodeMeta {
        match self {
            NodeRef::Document(node) => &node.meta,
            NodeRef::Block(node) => node.meta(),
            NodeRef::Inline(node) => node.meta(),
            NodeRef::Run(node) => &node.meta,
            NodeRef::TemplateArgument(node) => &node.meta,
            NodeRef::ImageLinkArgument(node) => &node.meta,
            NodeRef::TagAttribute(node) => &node.meta,
            NodeRef::TableCaption(node) => &node.meta,
            NodeRef::TableRow(node) => &node.meta,
            NodeRef::TableCell(node) => &node.meta,
        }
    }

    /// The direct children of the node, in source order.
    pub fn children(self) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        match self {
            NodeRef::Document(node) => out.extend(node.lines.iter().map(NodeRef::Block)),
            NodeRef::Block(node) => match node {
                Block::Paragraph(node) => out.push(NodeRef::Run(&node.content)),
                Block::Heading(node) => {
                    out.push(NodeRef::Run(&node.content));
                    out.push(NodeRef::Run(&node.suffix));
                }
                Block::ListItem(node) => out.push(NodeRef::Run(&node.content)),
                Block::HorizontalRule(_) => {}
                Block::Table(node) => {
                    attribute_children(&mut out, &node.attributes);
                    out.extend(node.prelude.as_ref().map(NodeRef::Run));
                    out.extend(node.caption.as_ref().map(NodeRef::TableCaption));
                    out.extend(node.rows.iter().map(NodeRef::TableRow));
                    out.push(NodeRef::Run(&node.suffix));
                }
            },
            NodeRef::Inline(node) => match node {
                Inline::PlainText(_) | Inline::FormatSwitch(_) | Inline::Comment(_) => {}
                Inline::WikiLink(node) => {
                    out.push(NodeRef::Run(&node.target));
                    out.extend(node.text.as_ref().map(NodeRef::Run));
                }
                Inline::ExternalLink(node) => {
                    out.push(NodeRef::Run(&node.target));
                    out.extend(node.text.as_ref().map(NodeRef::Run));
                }
                Inline::ImageLink(node) => {
                    out.push(NodeRef::Run(&node.target));
                    out.extend(node.arguments.iter().map(NodeRef::ImageLinkArgument));
                }
                Inline::Template(node) => {
                    out.push(NodeRef::Run(&node.name));
                    out.extend(node.arguments.iter().map(NodeRef::TemplateArgument));
                }
                Inline::ArgumentReference(node) => {
                    out.push(NodeRef::Document(&node.name));
                    out.extend(node.default.as_ref().map(NodeRef::Document));
                }
                Inline::HtmlTag(node) => {
                    attribute_children(&mut out, &node.attributes);
                    out.push(NodeRef::Document(&node.content));
                }
                Inline::ParserTag(node) => attribute_children(&mut out, &node.attributes),
            },
            NodeRef::Run(node) => out.extend(node.inlines.iter().map(NodeRef::Inline)),
            NodeRef::TemplateArgument(node) => {
                out.extend(node.name.as_ref().map(NodeRef::Document));
                out.push(NodeRef::Document(&node.value));
            }
            NodeRef::ImageLinkArgument(node) => {
                out.extend(node.name.as_ref().map(NodeRef::Run));
                out.push(NodeRef::Run(&node.value));
            }
            NodeRef::TagAttribute(node) => {
                out.push(NodeRef::Run(&node.name));
                out.extend(node.value.as_ref().map(NodeRef::Document));
            }
            NodeRef::TableCaption(node) => {
                if let Some(attributes) = &node.attributes {
                    attribute_children(&mut out, attributes);
                }
                out.push(NodeRef::Run(&node.content));
            }
            NodeRef::TableRow(node) => {
                attribute_children(&mut out, &node.attributes);
                out.extend(node.prelude.as_ref().map(NodeRef::Run));
                out.extend(node.cells.iter().map(NodeRef::TableCell));
            }
            NodeRef::TableCell(node) => {
                if let Some(attributes) = &node.attributes {
                    attribute_children(&mut out, attributes);
                }
                out.push(NodeRef::Run(&node.content));
                out.extend(node.nested.iter().map(NodeRef::Block));
            }
        }
        out
    }

    /// Iterates over this node and all of its descendants, depth-first, in
    /// source order.
    pub fn descendants(self) -> impl Iterator<Item = NodeRef<'a>> {
        let mut stack = vec![self];
        core::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children().into_iter().rev());
            Some(node)
        })
    }

    /// Returns true if both references point at the same node.
    pub fn ptr_eq(self, other: NodeRef<'_>) -> bool {
        core::ptr::eq(self.meta(), other.meta())
    }
}

/// Adds each attribute in `list` to `out`.
fn attribute_children<'a>(out: &mut Vec<NodeRef<'a>>, list: &'a AttributeList) {
    out.extend(list.attributes.iter().map(NodeRef::TagAttribute));
}

/// A cursor for navigating a tree with access to parents and siblings.
#[derive(Clone, Debug)]
pub struct TreeCursor<'a> {
    /// The path from the root to the current node, with each node’s index
    /// within its parent.
    path: Vec<(NodeRef<'a>, usize)>,
}

impl<'a> TreeCursor<'a> {
    /// Creates a cursor positioned at `root`.
    pub fn new(root: NodeRef<'a>) -> Self {
        Self {
            path: vec![(root, 0)],
        }
    }

    /// The current node.
    pub fn node(&self) -> NodeRef<'a> {
        // The path is never empty; `goto_parent` refuses to pop the root.
        self.path[self.path.len() - 1].0
    }

    /// The depth of the current node; the root is at depth 0.
    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    /// The parent of the current node.
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.path.len().checked_sub(2).map(|index| self.path[index].0)
    }

    /// The sibling before the current node.
    pub fn previous_sibling(&self) -> Option<NodeRef<'a>> {
        let (_, index) = *self.path.last()?;
        let parent = self.parent()?;
        index
            .checked_sub(1)
            .and_then(|index| parent.children().get(index).copied())
    }

    /// The sibling after the current node.
    pub fn next_sibling(&self) -> Option<NodeRef<'a>> {
        let (_, index) = *self.path.last()?;
        self.parent()?.children().get(index + 1).copied()
    }

    /// Moves to the parent node. Returns false at the root.
    pub fn goto_parent(&mut self) -> bool {
        if self.path.len() > 1 {
            self.path.pop();
            true
        } else {
            false
        }
    }

    /// Moves to the first child. Returns false if there are no children.
    pub fn goto_first_child(&mut self) -> bool {
        if let Some(child) = self.node().children().first().copied() {
            self.path.push((child, 0));
            true
        } else {
            false
        }
    }

    /// Moves to the next sibling. Returns false if there is none.
    pub fn goto_next_sibling(&mut self) -> bool {
        self.goto_sibling(1)
    }

    /// Moves to the previous sibling. Returns false if there is none.
    pub fn goto_previous_sibling(&mut self) -> bool {
        self.goto_sibling(-1)
    }

    /// Moves by `delta` siblings.
    fn goto_sibling(&mut self, delta: isize) -> bool {
        let Some(parent) = self.parent() else {
            return false;
        };
        let len = self.path.len();
        let Some(index) = self.path[len - 1].1.checked_add_signed(delta) else {
            return false;
        };
        if let Some(sibling) = parent.children().get(index).copied() {
            self.path[len - 1] = (sibling, index);
            true
        } else {
            false
        }
    }
}
