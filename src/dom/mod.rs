//! DOM access for the test engine
//!
//! Wraps a parsed [`scraper::Html`] document. Every query returns elements in
//! document order, which is the order tests are executed in.

use std::path::Path;
use std::rc::Rc;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::common::{Error, Result};

/// Turns an element into a CSS selector string that identifies it
pub type SelectorGenerator = Rc<dyn Fn(ElementRef<'_>) -> String>;

/// A parsed HTML document tests are run against
pub struct Document {
    html: Html,
}

impl Document {
    /// Parse a full HTML document
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    /// Read and parse a document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Ok(Self::parse(&source))
    }

    /// The underlying scraper document
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// All elements matching `selector`, in document order
    pub fn query_all(&self, selector: &str) -> Result<Vec<ElementRef<'_>>> {
        let parsed = parse_selector(selector)?;
        Ok(self.html.select(&parsed).collect())
    }

    /// First element matching `selector`
    pub fn query(&self, selector: &str) -> Result<Option<ElementRef<'_>>> {
        let parsed = parse_selector(selector)?;
        Ok(self.html.select(&parsed).next())
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("errors", &self.html.errors.len())
            .finish_non_exhaustive()
    }
}

/// Descendants of `element` matching `selector`, in document order
pub fn select_within<'a>(element: ElementRef<'a>, selector: &str) -> Result<Vec<ElementRef<'a>>> {
    let parsed = parse_selector(selector)?;
    Ok(element.select(&parsed).collect())
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| Error::invalid_selector(selector, e))
}

/// Default selector generator
///
/// Uses `#id` when the element carries a plain identifier, otherwise a
/// `tag:nth-of-type(n)` chain up to the nearest ancestor with an id or the root.
pub fn unique_selector(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    let mut current = Some(element);

    while let Some(el) = current {
        if let Some(id) = el.value().id().filter(|id| is_plain_ident(id)) {
            parts.push(format!("#{id}"));
            break;
        }

        let name = el.value().name();
        let parent = el.parent().and_then(ElementRef::wrap);
        if parent.is_none() {
            parts.push(name.to_string());
            break;
        }

        let position = el
            .prev_siblings()
            .filter_map(ElementRef::wrap)
            .filter(|sibling| sibling.value().name() == name)
            .count()
            + 1;
        parts.push(format!("{name}:nth-of-type({position})"));
        current = parent;
    }

    parts.reverse();
    parts.join(" > ")
}

/// Identifiers that need no CSS escaping
fn is_plain_ident(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Snapshot of an element taken when a test ran against it
///
/// Holds copies, never a reference into the document, so results stay valid
/// after the document is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementInfo {
    pub selector: String,
    pub tag_name: String,
    pub text_content: String,
    pub outer_html: String,
}

impl ElementInfo {
    /// Capture `element` under the given generated selector
    pub fn capture(element: ElementRef<'_>, selector: String) -> Self {
        Self {
            selector,
            tag_name: element.value().name().to_ascii_uppercase(),
            text_content: element.text().collect(),
            outer_html: element.html(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><body>
  <main id="content">
    <p>one</p>
    <p>two <img src="a.png"></p>
    <section><p>three</p></section>
  </main>
  <img src="b.png" alt="logo">
</body></html>"#;

    #[test]
    fn test_query_all_in_document_order() {
        let doc = Document::parse(PAGE);
        let images = doc.query_all("img").unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].value().attr("src"), Some("a.png"));
        assert_eq!(images[1].value().attr("src"), Some("b.png"));
    }

    #[test]
    fn test_invalid_selector() {
        let doc = Document::parse(PAGE);
        let err = doc.query_all("p[").unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { ref selector, .. } if selector == "p["));
    }

    #[test]
    fn test_unique_selector_stops_at_id() {
        let doc = Document::parse(PAGE);
        let paragraphs = doc.query_all("p").unwrap();
        assert_eq!(unique_selector(paragraphs[1]), "#content > p:nth-of-type(2)");
        assert_eq!(
            unique_selector(paragraphs[2]),
            "#content > section:nth-of-type(1) > p:nth-of-type(1)"
        );
    }

    #[test]
    fn test_unique_selector_round_trips_through_query() {
        let doc = Document::parse(PAGE);
        for element in doc.query_all("img, p").unwrap() {
            let selector = unique_selector(element);
            let found = doc.query_all(&selector).unwrap();
            assert_eq!(found.len(), 1, "selector {selector} is not unique");
            assert_eq!(found[0].id(), element.id());
        }
    }

    #[test]
    fn test_element_info_snapshot() {
        let doc = Document::parse(PAGE);
        let image = doc.query("img[alt]").unwrap().unwrap();
        let info = ElementInfo::capture(image, unique_selector(image));
        assert_eq!(info.tag_name, "IMG");
        assert_eq!(info.text_content, "");
        assert!(info.outer_html.contains("alt=\"logo\""));
        assert_eq!(info.selector, "html > body:nth-of-type(1) > img:nth-of-type(1)");
    }

    #[test]
    fn test_select_within() {
        let doc = Document::parse(PAGE);
        let main = doc.query("main").unwrap().unwrap();
        assert_eq!(select_within(main, "p").unwrap().len(), 3);
        assert!(select_within(main, "img[alt]").unwrap().is_empty());
    }

    #[test]
    fn test_plain_ident() {
        assert!(is_plain_ident("content"));
        assert!(is_plain_ident("_x-1"));
        assert!(!is_plain_ident("1abc"));
        assert!(!is_plain_ident("a b"));
        assert!(!is_plain_ident(""));
    }
}
