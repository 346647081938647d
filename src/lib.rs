//! A MediaWiki Wikitext parser which produces a round-trippable syntax tree,
//! and a template expansion engine which works over that tree.
//!
//! ```
//! use wikitext_ast::{
//!     expand::{MapProvider, TemplateExpander},
//!     wikitext::Parser,
//! };
//!
//! let text = "Hello, {{Who|world}}!";
//! let document = Parser::default().parse(text);
//! assert_eq!(document.to_string(), text);
//!
//! let templates = MapProvider::from_iter([("Who", "{{ucfirst:{{{1}}}}}")]);
//! let expanded = TemplateExpander::default().expand(text, &templates).unwrap();
//! assert_eq!(expanded, "Hello, World!");
//! ```

pub mod expand;
pub mod wikitext;

mod common;
mod title;
