//! Helper trait for implementing syntax tree visitors.
//!
//! The default implementation of every method walks the node and emits its
//! exact source text through [`Visitor::visit_text`], so a visitor that only
//! implements `visit_text` reproduces the original Wikitext. Visitors which
//! transform the tree override the methods for the nodes they care about and
//! call the free `visit_*` functions to fall back to the default walk.

use super::nodes::{
    ArgumentReference, AttributeList, Block, Comment, Document, ExternalLink, FormatSwitch,
    Heading, HorizontalRule, HtmlTag, ImageLink, ImageLinkArgument, Inline, ListItem, Paragraph,
    ParserTag, PlainText, Run, Table, TableCaption, TableCell, TableRow, TagAttribute, TagNode,
    TagStyle, Template, TemplateArgument, WikiLink,
};
use core::fmt;

/// A trait for visiting the nodes of a syntax tree.
pub trait Visitor<'tt, E> {
    /// Visits a fragment of source text. Delimiters are emitted through this
    /// method as well as the content of text nodes.
    fn visit_text(&mut self, text: &str) -> Result<(), E>;

    /// Visits a [`Document`].
    #[inline]
    fn visit_document(&mut self, node: &'tt Document) -> Result<(), E> {
        visit_document(self, node)
    }

    /// Visits a [`Block`].
    #[inline]
    fn visit_block(&mut self, node: &'tt Block) -> Result<(), E> {
        visit_block(self, node)
    }

    /// Visits a [`Paragraph`].
    #[inline]
    fn visit_paragraph(&mut self, node: &'tt Paragraph) -> Result<(), E> {
        visit_paragraph(self, node)
    }

    /// Visits a [`Heading`].
    #[inline]
    fn visit_heading(&mut self, node: &'tt Heading) -> Result<(), E> {
        visit_heading(self, node)
    }

    /// Visits a [`ListItem`].
    #[inline]
    fn visit_list_item(&mut self, node: &'tt ListItem) -> Result<(), E> {
        visit_list_item(self, node)
    }

    /// Visits a [`HorizontalRule`].
    #[inline]
    fn visit_horizontal_rule(&mut self, node: &'tt HorizontalRule) -> Result<(), E> {
        visit_horizontal_rule(self, node)
    }

    /// Visits a [`Table`].
    #[inline]
    fn visit_table(&mut self, node: &'tt Table) -> Result<(), E> {
        visit_table(self, node)
    }

    /// Visits a [`TableCaption`].
    #[inline]
    fn visit_table_caption(&mut self, node: &'tt TableCaption) -> Result<(), E> {
        visit_table_caption(self, node)
    }

    /// Visits a [`TableRow`].
    #[inline]
    fn visit_table_row(&mut self, node: &'tt TableRow) -> Result<(), E> {
        visit_table_row(self, node)
    }

    /// Visits a [`TableCell`].
    #[inline]
    fn visit_table_cell(&mut self, node: &'tt TableCell) -> Result<(), E> {
        visit_table_cell(self, node)
    }

    /// Visits an [`AttributeList`].
    #[inline]
    fn visit_attributes(&mut self, node: &'tt AttributeList) -> Result<(), E> {
        visit_attributes(self, node)
    }

    /// Visits a [`TagAttribute`].
    #[inline]
    fn visit_tag_attribute(&mut self, node: &'tt TagAttribute) -> Result<(), E> {
        visit_tag_attribute(self, node)
    }

    /// Visits a [`Run`].
    #[inline]
    fn visit_run(&mut self, node: &'tt Run) -> Result<(), E> {
        visit_run(self, node)
    }

    /// Visits an [`Inline`].
    #[inline]
    fn visit_inline(&mut self, node: &'tt Inline) -> Result<(), E> {
        visit_inline(self, node)
    }

    /// Visits a [`PlainText`].
    #[inline]
    fn visit_plain_text(&mut self, node: &'tt PlainText) -> Result<(), E> {
        self.visit_text(&node.content)
    }

    /// Visits a [`WikiLink`].
    #[inline]
    fn visit_wiki_link(&mut self, node: &'tt WikiLink) -> Result<(), E> {
        visit_wiki_link(self, node)
    }

    /// Visits an [`ExternalLink`].
    #[inline]
    fn visit_external_link(&mut self, node: &'tt ExternalLink) -> Result<(), E> {
        visit_external_link(self, node)
    }

    /// Visits an [`ImageLink`].
    #[inline]
    fn visit_image_link(&mut self, node: &'tt ImageLink) -> Result<(), E> {
        visit_image_link(self, node)
    }

    /// Visits an [`ImageLinkArgument`].
    #[inline]
    fn visit_image_link_argument(&mut self, node: &'tt ImageLinkArgument) -> Result<(), E> {
        visit_image_link_argument(self, node)
    }

    /// Visits a [`Template`].
    #[inline]
    fn visit_template(&mut self, node: &'tt Template) -> Result<(), E> {
        visit_template(self, node)
    }

    /// Visits a [`TemplateArgument`].
    #[inline]
    fn visit_template_argument(&mut self, node: &'tt TemplateArgument) -> Result<(), E> {
        visit_template_argument(self, node)
    }

    /// Visits an [`ArgumentReference`].
    #[inline]
    fn visit_argument_reference(&mut self, node: &'tt ArgumentReference) -> Result<(), E> {
        visit_argument_reference(self, node)
    }

    /// Visits a [`FormatSwitch`].
    #[inline]
    fn visit_format_switch(&mut self, node: &'tt FormatSwitch) -> Result<(), E> {
        visit_format_switch(self, node)
    }

    /// Visits a [`Comment`].
    #[inline]
    fn visit_comment(&mut self, node: &'tt Comment) -> Result<(), E> {
        visit_comment(self, node)
    }

    /// Visits an [`HtmlTag`].
    #[inline]
    fn visit_html_tag(&mut self, node: &'tt HtmlTag) -> Result<(), E> {
        visit_tag(self, node, |visitor, content| visitor.visit_document(content))
    }

    /// Visits a [`ParserTag`].
    #[inline]
    fn visit_parser_tag(&mut self, node: &'tt ParserTag) -> Result<(), E> {
        visit_tag(self, node, |visitor, content| visitor.visit_text(content))
    }
}

/// Default implementation of [`Visitor::visit_document`].
pub fn visit_document<'tt, V, E>(visitor: &mut V, node: &'tt Document) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    for (index, line) in node.lines.iter().enumerate() {
        if index != 0 {
            visitor.visit_text("\n")?;
        }
        visitor.visit_block(line)?;
    }
    Ok(())
}

/// Default implementation of [`Visitor::visit_block`].
pub fn visit_block<'tt, V, E>(visitor: &mut V, node: &'tt Block) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    match node {
        Block::Paragraph(node) => visitor.visit_paragraph(node),
        Block::Heading(node) => visitor.visit_heading(node),
        Block::ListItem(node) => visitor.visit_list_item(node),
        Block::HorizontalRule(node) => visitor.visit_horizontal_rule(node),
        Block::Table(node) => visitor.visit_table(node),
    }
}

/// Default implementation of [`Visitor::visit_paragraph`].
pub fn visit_paragraph<'tt, V, E>(visitor: &mut V, node: &'tt Paragraph) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    visitor.visit_run(&node.content)?;
    if !node.compact {
        visitor.visit_text("\n")?;
    }
    Ok(())
}

/// Default implementation of [`Visitor::visit_heading`].
pub fn visit_heading<'tt, V, E>(visitor: &mut V, node: &'tt Heading) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    let marks = &"======"[..usize::from(node.level.clamp(1, 6))];
    visitor.visit_text(marks)?;
    visitor.visit_run(&node.content)?;
    visitor.visit_text(marks)?;
    visitor.visit_run(&node.suffix)
}

/// Default implementation of [`Visitor::visit_list_item`].
pub fn visit_list_item<'tt, V, E>(visitor: &mut V, node: &'tt ListItem) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    visitor.visit_text(&node.prefix)?;
    visitor.visit_run(&node.content)
}

/// Default implementation of [`Visitor::visit_horizontal_rule`].
pub fn visit_horizontal_rule<'tt, V, E>(visitor: &mut V, node: &'tt HorizontalRule) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    visitor.visit_text(&"-".repeat(node.dashes))?;
    visitor.visit_text(&node.suffix)
}

/// Default implementation of [`Visitor::visit_table`].
pub fn visit_table<'tt, V, E>(visitor: &mut V, node: &'tt Table) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    visitor.visit_text("{|")?;
    visitor.visit_attributes(&node.attributes)?;
    if let Some(prelude) = &node.prelude {
        visitor.visit_run(prelude)?;
    }
    if let Some(caption) = &node.caption {
        visitor.visit_table_caption(caption)?;
    }
    for row in &node.rows {
        visitor.visit_table_row(row)?;
    }
    if !node.meta.inferred_closing_mark {
        visitor.visit_text("\n|}")?;
    }
    visitor.visit_run(&node.suffix)
}

/// Default implementation of [`Visitor::visit_table_caption`].
pub fn visit_table_caption<'tt, V, E>(visitor: &mut V, node: &'tt TableCaption) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    visitor.visit_text("\n|+")?;
    if let Some(attributes) = &node.attributes {
        visitor.visit_attributes(attributes)?;
        visitor.visit_text("|")?;
    }
    visitor.visit_run(&node.content)
}

/// Default implementation of [`Visitor::visit_table_row`].
pub fn visit_table_row<'tt, V, E>(visitor: &mut V, node: &'tt TableRow) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    if node.has_marker {
        visitor.visit_text("\n|-")?;
        visitor.visit_attributes(&node.attributes)?;
    }
    if let Some(prelude) = &node.prelude {
        visitor.visit_run(prelude)?;
    }
    for cell in &node.cells {
        visitor.visit_table_cell(cell)?;
    }
    Ok(())
}

/// Default implementation of [`Visitor::visit_table_cell`].
pub fn visit_table_cell<'tt, V, E>(visitor: &mut V, node: &'tt TableCell) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    let mut marker = [0; 4];
    let marker = node.marker.encode_utf8(&mut marker);
    if node.is_inline_sibling {
        visitor.visit_text(marker)?;
    } else {
        visitor.visit_text("\n")?;
    }
    visitor.visit_text(marker)?;
    if let Some(attributes) = &node.attributes {
        visitor.visit_attributes(attributes)?;
        visitor.visit_text("|")?;
    }
    visitor.visit_run(&node.content)?;
    for block in &node.nested {
        visitor.visit_text("\n")?;
        visitor.visit_block(block)?;
    }
    Ok(())
}

/// Default implementation of [`Visitor::visit_attributes`].
pub fn visit_attributes<'tt, V, E>(visitor: &mut V, node: &'tt AttributeList) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    for attribute in &node.attributes {
        visitor.visit_tag_attribute(attribute)?;
    }
    visitor.visit_text(&node.trailing_whitespace)
}

/// Default implementation of [`Visitor::visit_tag_attribute`].
pub fn visit_tag_attribute<'tt, V, E>(visitor: &mut V, node: &'tt TagAttribute) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    visitor.visit_text(&node.leading_whitespace)?;
    visitor.visit_run(&node.name)?;
    if let Some(value) = &node.value {
        visitor.visit_text(&node.whitespace_before_eq)?;
        visitor.visit_text("=")?;
        visitor.visit_text(&node.whitespace_after_eq)?;
        visitor.visit_text(node.quote.as_str())?;
        visitor.visit_document(value)?;
        if !node.meta.inferred_closing_mark {
            visitor.visit_text(node.quote.as_str())?;
        }
    }
    Ok(())
}

/// Default implementation of [`Visitor::visit_run`].
pub fn visit_run<'tt, V, E>(visitor: &mut V, node: &'tt Run) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    for inline in &node.inlines {
        visitor.visit_inline(inline)?;
    }
    Ok(())
}

/// Default implementation of [`Visitor::visit_inline`].
pub fn visit_inline<'tt, V, E>(visitor: &mut V, node: &'tt Inline) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    match node {
        Inline::PlainText(node) => visitor.visit_plain_text(node),
        Inline::WikiLink(node) => visitor.visit_wiki_link(node),
        Inline::ExternalLink(node) => visitor.visit_external_link(node),
        Inline::ImageLink(node) => visitor.visit_image_link(node),
        Inline::Template(node) => visitor.visit_template(node),
        Inline::ArgumentReference(node) => visitor.visit_argument_reference(node),
        Inline::FormatSwitch(node) => visitor.visit_format_switch(node),
        Inline::Comment(node) => visitor.visit_comment(node),
        Inline::HtmlTag(node) => visitor.visit_html_tag(node),
        Inline::ParserTag(node) => visitor.visit_parser_tag(node),
    }
}

/// Default implementation of [`Visitor::visit_wiki_link`].
pub fn visit_wiki_link<'tt, V, E>(visitor: &mut V, node: &'tt WikiLink) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    visitor.visit_text("[[")?;
    visitor.visit_run(&node.target)?;
    if let Some(text) = &node.text {
        visitor.visit_text("|")?;
        visitor.visit_run(text)?;
    }
    if !node.meta.inferred_closing_mark {
        visitor.visit_text("]]")?;
    }
    Ok(())
}

/// Default implementation of [`Visitor::visit_external_link`].
pub fn visit_external_link<'tt, V, E>(visitor: &mut V, node: &'tt ExternalLink) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    if node.brackets {
        visitor.visit_text("[")?;
    }
    visitor.visit_run(&node.target)?;
    if let Some(text) = &node.text {
        visitor.visit_run(text)?;
    }
    if node.brackets && !node.meta.inferred_closing_mark {
        visitor.visit_text("]")?;
    }
    Ok(())
}

/// Default implementation of [`Visitor::visit_image_link`].
pub fn visit_image_link<'tt, V, E>(visitor: &mut V, node: &'tt ImageLink) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    visitor.visit_text("[[")?;
    visitor.visit_run(&node.target)?;
    for argument in &node.arguments {
        visitor.visit_text("|")?;
        visitor.visit_image_link_argument(argument)?;
    }
    if !node.meta.inferred_closing_mark {
        visitor.visit_text("]]")?;
    }
    Ok(())
}

/// Default implementation of [`Visitor::visit_image_link_argument`].
pub fn visit_image_link_argument<'tt, V, E>(
    visitor: &mut V,
    node: &'tt ImageLinkArgument,
) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    if let Some(name) = &node.name {
        visitor.visit_run(name)?;
        visitor.visit_text("=")?;
    }
    visitor.visit_run(&node.value)
}

/// Default implementation of [`Visitor::visit_template`].
pub fn visit_template<'tt, V, E>(visitor: &mut V, node: &'tt Template) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    visitor.visit_text("{{")?;
    visitor.visit_run(&node.name)?;
    for (index, argument) in node.arguments.iter().enumerate() {
        visitor.visit_text(if index == 0 && node.is_magic_word {
            ":"
        } else {
            "|"
        })?;
        visitor.visit_template_argument(argument)?;
    }
    if !node.meta.inferred_closing_mark {
        visitor.visit_text("}}")?;
    }
    Ok(())
}

/// Default implementation of [`Visitor::visit_template_argument`].
pub fn visit_template_argument<'tt, V, E>(
    visitor: &mut V,
    node: &'tt TemplateArgument,
) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    if let Some(name) = &node.name {
        visitor.visit_document(name)?;
        visitor.visit_text("=")?;
    }
    visitor.visit_document(&node.value)
}

/// Default implementation of [`Visitor::visit_argument_reference`].
pub fn visit_argument_reference<'tt, V, E>(
    visitor: &mut V,
    node: &'tt ArgumentReference,
) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    visitor.visit_text("{{{")?;
    visitor.visit_document(&node.name)?;
    if let Some(default) = &node.default {
        visitor.visit_text("|")?;
        visitor.visit_document(default)?;
    }
    if !node.meta.inferred_closing_mark {
        visitor.visit_text("}}}")?;
    }
    Ok(())
}

/// Default implementation of [`Visitor::visit_format_switch`].
pub fn visit_format_switch<'tt, V, E>(visitor: &mut V, node: &'tt FormatSwitch) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    visitor.visit_text(match (node.switch_bold, node.switch_italics) {
        (true, true) => "'''''",
        (true, false) => "'''",
        (false, true) => "''",
        (false, false) => "",
    })
}

/// Default implementation of [`Visitor::visit_comment`].
pub fn visit_comment<'tt, V, E>(visitor: &mut V, node: &'tt Comment) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    visitor.visit_text("<!--")?;
    visitor.visit_text(&node.content)?;
    if !node.meta.inferred_closing_mark {
        visitor.visit_text("-->")?;
    }
    Ok(())
}

/// Default implementation of [`Visitor::visit_html_tag`] and
/// [`Visitor::visit_parser_tag`]. `content` visits the body of the tag.
pub fn visit_tag<'tt, V, E, C>(
    visitor: &mut V,
    node: &'tt TagNode<C>,
    content: impl FnOnce(&mut V, &'tt C) -> Result<(), E>,
) -> Result<(), E>
where
    V: Visitor<'tt, E> + ?Sized,
{
    visitor.visit_text("<")?;
    visitor.visit_text(&node.name)?;
    visitor.visit_attributes(&node.attributes)?;
    match node.style {
        TagStyle::SelfClosing => visitor.visit_text("/>"),
        TagStyle::Unclosed => {
            visitor.visit_text(">")?;
            content(visitor, &node.content)
        }
        TagStyle::Normal => {
            visitor.visit_text(">")?;
            content(visitor, &node.content)?;
            if !node.meta.inferred_closing_mark {
                visitor.visit_text("</")?;
                visitor.visit_text(&node.closing_name)?;
                visitor.visit_text(&node.closing_whitespace)?;
                visitor.visit_text(">")?;
            }
            Ok(())
        }
    }
}

/// A visitor which writes the source text of a tree to a formatter.
struct SourceWriter<'a, 'b>(&'a mut fmt::Formatter<'b>);

impl Visitor<'_, fmt::Error> for SourceWriter<'_, '_> {
    fn visit_text(&mut self, text: &str) -> fmt::Result {
        self.0.write_str(text)
    }
}

/// Implements [`fmt::Display`] as the source text of a node.
macro_rules! source_display {
    ($($ty:ty => $visit:ident),* $(,)?) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                SourceWriter(f).$visit(self)
            }
        })*
    };
}

source_display! {
    Document => visit_document,
    Block => visit_block,
    Paragraph => visit_paragraph,
    Heading => visit_heading,
    ListItem => visit_list_item,
    HorizontalRule => visit_horizontal_rule,
    Table => visit_table,
    TableCaption => visit_table_caption,
    TableRow => visit_table_row,
    TableCell => visit_table_cell,
    AttributeList => visit_attributes,
    TagAttribute => visit_tag_attribute,
    Run => visit_run,
    Inline => visit_inline,
    PlainText => visit_plain_text,
    WikiLink => visit_wiki_link,
    ExternalLink => visit_external_link,
    ImageLink => visit_image_link,
    ImageLinkArgument => visit_image_link_argument,
    Template => visit_template,
    TemplateArgument => visit_template_argument,
    ArgumentReference => visit_argument_reference,
    FormatSwitch => visit_format_switch,
    Comment => visit_comment,
    HtmlTag => visit_html_tag,
    ParserTag => visit_parser_tag,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wikitext::nodes::{NodeMeta, Quote};

    #[test]
    fn template_separators() {
        let mut template = Template {
            name: Run::from_text("#if"),
            is_magic_word: true,
            ..Default::default()
        };
        for value in ["x", "y"] {
            let mut argument = TemplateArgument::default();
            argument.value.lines.attach(Block::Paragraph(Paragraph {
                content: Run::from_text(value),
                compact: true,
                meta: NodeMeta::default(),
            }));
            template.arguments.attach(argument);
        }
        assert_eq!(template.to_string(), "{{#if:x|y}}");
        template.is_magic_word = false;
        assert_eq!(template.to_string(), "{{#if|x|y}}");
        template.meta.inferred_closing_mark = true;
        assert_eq!(template.to_string(), "{{#if|x|y", "inferred marks are not emitted");
    }

    #[test]
    fn tag_styles() {
        let mut tag = ParserTag {
            name: "ref".into(),
            content: "a".into(),
            closing_name: "REF".into(),
            closing_whitespace: " ".into(),
            ..Default::default()
        };
        tag.attributes.attributes.attach(TagAttribute {
            leading_whitespace: " ".into(),
            name: Run::from_text("name"),
            value: Some(Document::default()),
            quote: Quote::Double,
            ..Default::default()
        });
        assert_eq!(tag.to_string(), r#"<ref name="">a</REF >"#);
        tag.style = TagStyle::SelfClosing;
        assert_eq!(tag.to_string(), r#"<ref name=""/>"#);
    }
}
