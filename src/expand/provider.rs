//! Sources of template content.
//!
//! Template names passed to a provider are normalised by
//! [`template_title`](crate::title::template_title): templates in the
//! `Template:` namespace are named without their prefix (`Greet`), pages in
//! other namespaces keep theirs (`User:Bob/box`), and main namespace pages
//! start with a colon (`:Main Page`).

use crate::title::template_title;
use std::{cell::RefCell, collections::HashMap};

/// A synchronous source of raw template Wikitext.
pub trait ContentProvider {
    /// Returns the content of the template with the given normalised name, or
    /// `None` if it does not exist.
    fn content(&self, name: &str) -> Option<String>;
}

impl<F> ContentProvider for F
where
    F: Fn(&str) -> Option<String>,
{
    fn content(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// An asynchronous source of raw template Wikitext, for content which lives
/// behind I/O.
pub trait AsyncContentProvider {
    /// Fetches the content of the template with the given normalised name,
    /// or `None` if it does not exist.
    fn fetch(&self, name: &str) -> impl Future<Output = Option<String>> + Send;
}

/// An in-memory content provider.
#[derive(Clone, Debug, Default)]
pub struct MapProvider(HashMap<String, String>);

impl MapProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a template. The name is normalised, so `Template:greet` and
    /// `Greet` are the same template.
    pub fn insert(&mut self, name: &str, content: impl Into<String>) -> Option<String> {
        self.0.insert(template_title(name), content.into())
    }

    /// Returns true if there are no templates.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of templates.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for MapProvider {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut provider = Self::new();
        for (name, content) in iter {
            provider.insert(name.as_ref(), content);
        }
        provider
    }
}

impl ContentProvider for MapProvider {
    fn content(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}

impl AsyncContentProvider for MapProvider {
    fn fetch(&self, name: &str) -> impl Future<Output = Option<String>> + Send {
        core::future::ready(self.0.get(name).cloned())
    }
}

/// Content fetched by earlier rounds of an asynchronous expansion. Names which
/// have not been fetched yet are recorded as misses.
pub(super) struct Prefetched<'a> {
    /// Fetched content, by name. `None` if the template does not exist.
    fetched: &'a HashMap<String, Option<String>>,
    /// Names which were requested but not fetched.
    misses: RefCell<Vec<String>>,
}

impl<'a> Prefetched<'a> {
    /// Creates a provider over already fetched content.
    pub fn new(fetched: &'a HashMap<String, Option<String>>) -> Self {
        Self {
            fetched,
            misses: RefCell::default(),
        }
    }

    /// Consumes the provider, returning the names which need to be fetched.
    pub fn into_misses(self) -> Vec<String> {
        self.misses.into_inner()
    }
}

impl ContentProvider for Prefetched<'_> {
    fn content(&self, name: &str) -> Option<String> {
        if let Some(content) = self.fetched.get(name) {
            return content.clone();
        }

        let mut misses = self.misses.borrow_mut();
        if !misses.iter().any(|miss| miss == name) {
            misses.push(name.to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_provider() {
        let provider = MapProvider::from_iter([
            ("Template:greet", "Hello"),
            ("user:bob/box", "Box"),
            (":main", "Main"),
        ]);
        assert_eq!(provider.len(), 3);
        assert_eq!(provider.content("Greet").as_deref(), Some("Hello"));
        assert_eq!(provider.content("User:Bob/box").as_deref(), Some("Box"));
        assert_eq!(provider.content(":Main").as_deref(), Some("Main"));
        assert_eq!(provider.content("Nope"), None);
    }

    #[test]
    fn prefetched_records_misses() {
        let fetched = HashMap::from([
            ("A".to_string(), Some("a".to_string())),
            ("B".to_string(), None),
        ]);
        let provider = Prefetched::new(&fetched);
        assert_eq!(provider.content("A").as_deref(), Some("a"));
        assert_eq!(provider.content("B"), None);
        assert_eq!(provider.content("C"), None);
        assert_eq!(provider.content("C"), None);
        assert_eq!(provider.into_misses(), ["C"], "misses are recorded once");
    }

    #[test]
    fn closure_provider() {
        let provider = |name: &str| (name == "A").then(|| "a".to_string());
        assert_eq!(provider.content("A").as_deref(), Some("a"));
        assert_eq!(provider.content("B"), None);
    }
}
