//! HTML parsing and DOM navigation.
//!
//! This module provides the [`Document`] and [`Element`] types for parsing
//! HTML and navigating the DOM tree using CSS selectors.
//!
//! # Example
//!
//! ```rust
//! use splice_core::parse::Document;
//!
//! let html = r#"
//!     <html>
//!         <head><link rel="stylesheet" href="css/site.css"></head>
//!         <body>
//!             <section class="hero"><h1>Title</h1></section>
//!         </body>
//!     </html>
//! "#;
//!
//! let doc = Document::parse(html).unwrap();
//! let hero = doc.select_first("section.hero").unwrap();
//! assert_eq!(hero.text(), "Title");
//! assert_eq!(doc.stylesheet_hrefs(), vec!["css/site.css".to_string()]);
//! ```

use scraper::{ElementRef, Html, Node, Selector};

use crate::{Result, SpliceError};

/// Elements whose text never renders.
const NON_VISUAL_TAGS: &[&str] = &["script", "style", "noscript", "template"];

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| SpliceError::HtmlParseError(format!("Invalid selector `{selector}`: {e}")))
}

/// Escapes `&`, `<`, `>`, `"` and `'` for use in HTML text and attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverses the escaping an HTML serializer applies to attribute values.
pub(crate) fn unescape_attribute(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

/// Represents a parsed HTML document.
///
/// # Example
///
/// ```rust
/// use splice_core::parse::Document;
///
/// let html = "<html><head><title>Test</title></head><body><p>Hello</p></body></html>";
/// let doc = Document::parse(html).unwrap();
/// assert_eq!(doc.title(), Some("Test".to_string()));
/// ```
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses HTML from a string.
    pub fn parse(html: &str) -> Result<Self> {
        let html = Html::parse_document(html);
        Ok(Self { html })
    }

    /// Selects elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`SpliceError::HtmlParseError`] if the selector is invalid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use splice_core::parse::Document;
    ///
    /// let html = r#"<p class="content">First</p><p class="content">Second</p>"#;
    /// let doc = Document::parse(html).unwrap();
    /// let elements = doc.select("p.content").unwrap();
    /// assert_eq!(elements.len(), 2);
    /// ```
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = parse_selector(selector)?;
        Ok(self.html.select(&sel).map(|el| Element { element: el }).collect())
    }

    /// Selects the first element matching a CSS selector.
    ///
    /// # Errors
    ///
    /// [`SpliceError::HtmlParseError`] for an invalid selector,
    /// [`SpliceError::SelectorNotFound`] when nothing matches.
    pub fn select_first(&'_ self, selector: &str) -> Result<Element<'_>> {
        let sel = parse_selector(selector)?;
        self.html
            .select(&sel)
            .next()
            .map(|el| Element { element: el })
            .ok_or_else(|| SpliceError::SelectorNotFound { selector: selector.to_string() })
    }

    /// Number of elements a selector matches; zero for invalid selectors.
    pub fn count(&self, selector: &str) -> usize {
        Selector::parse(selector).map(|sel| self.html.select(&sel).count()).unwrap_or(0)
    }

    /// The `<body>` element. html5ever always synthesizes one.
    pub fn body(&'_ self) -> Option<Element<'_>> {
        let sel = Selector::parse("body").ok()?;
        self.html.select(&sel).next().map(|el| Element { element: el })
    }

    /// Gets the title of the document.
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.html
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Gets all visible text content from the document.
    pub fn text_content(&self) -> String {
        Element { element: self.html.root_element() }.text()
    }

    /// `href`s of `<link rel="stylesheet">` elements in document order.
    pub fn stylesheet_hrefs(&self) -> Vec<String> {
        self.select("link[href]")
            .unwrap_or_default()
            .into_iter()
            .filter(|link| {
                link.attr("rel")
                    .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")))
            })
            .filter_map(|link| link.attr("href").map(str::to_string))
            .collect()
    }

    /// `src`s of `<script src>` elements in document order.
    pub fn script_srcs(&self) -> Vec<String> {
        self.select("script[src]")
            .unwrap_or_default()
            .into_iter()
            .filter_map(|script| script.attr("src").map(str::to_string))
            .collect()
    }
}

/// A wrapper around scraper's ElementRef for easier DOM navigation.
///
/// # Example
///
/// ```rust
/// use splice_core::parse::Document;
///
/// let html = r#"<a href="https://example.com">Link text</a>"#;
/// let doc = Document::parse(html).unwrap();
/// let link = &doc.select("a").unwrap()[0];
///
/// assert_eq!(link.text(), "Link text");
/// assert_eq!(link.attr("href"), Some("https://example.com"));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Element<'a> {
    element: ElementRef<'a>,
}

impl<'a> Element<'a> {
    /// Gets the inner HTML of this element.
    pub fn inner_html(&self) -> String {
        self.element.inner_html()
    }

    /// Gets the outer HTML of this element.
    pub fn outer_html(&self) -> String {
        self.element.html()
    }

    /// Gets the visible text of this element.
    ///
    /// Text inside `script`, `style`, `noscript` and `template` is skipped
    /// and runs of whitespace collapse to one space.
    pub fn text(&self) -> String {
        let mut raw = String::new();
        collect_visible_text(self.element, &mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Whether this element has non-whitespace text nodes as direct children.
    pub fn has_direct_text(&self) -> bool {
        self.element.children().any(|child| match child.value() {
            Node::Text(text) => !text.trim().is_empty(),
            _ => false,
        })
    }

    /// Gets the value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Gets the lowercase tag name.
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }

    /// The `id` attribute, if non-empty.
    pub fn id(&self) -> Option<&'a str> {
        self.element.value().id().filter(|id| !id.is_empty())
    }

    /// Class names in attribute order.
    pub fn classes(&self) -> Vec<&'a str> {
        self.element.value().classes().collect()
    }

    /// Child elements in document order.
    pub fn children(&self) -> Vec<Element<'a>> {
        self.element.children().filter_map(ElementRef::wrap).map(|el| Element { element: el }).collect()
    }

    /// Parent element, if any.
    pub fn parent(&self) -> Option<Element<'a>> {
        self.element.parent().and_then(ElementRef::wrap).map(|el| Element { element: el })
    }

    /// 1-based position among preceding siblings with the same tag name.
    pub fn nth_of_type(&self) -> usize {
        let name = self.element.value().name();
        1 + self
            .element
            .prev_siblings()
            .filter_map(ElementRef::wrap)
            .filter(|sib| sib.value().name() == name)
            .count()
    }

    /// Selects descendant elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`SpliceError::HtmlParseError`] if the selector is invalid.
    pub fn select(&self, selector: &str) -> Result<Vec<Element<'a>>> {
        let sel = parse_selector(selector)?;
        Ok(self.element.select(&sel).map(|el| Element { element: el }).collect())
    }
}

fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) if NON_VISUAL_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_visible_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
        <!DOCTYPE html>
        <html lang="en">
        <head>
            <meta charset="UTF-8">
            <title>Test Page</title>
            <link rel="stylesheet" href="css/site.css">
            <link rel="icon" href="favicon.ico">
            <script src="js/head.js"></script>
        </head>
        <body>
            <h1>Heading</h1>
            <p class="content">Paragraph 1</p>
            <p class="content">Paragraph 2</p>
            <a href="https://example.com">Link</a>
            <script>var hidden = "not text";</script>
            <script src="/js/app.js"></script>
        </body>
        </html>
    "#;

    #[test]
    fn test_parse_document() {
        let doc = Document::parse(SAMPLE_HTML).unwrap();
        assert_eq!(doc.title(), Some("Test Page".to_string()));
    }

    #[test]
    fn test_select_elements() {
        let doc = Document::parse(SAMPLE_HTML).unwrap();
        let elements = doc.select("p.content").unwrap();

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].text(), "Paragraph 1");
        assert_eq!(elements[1].text(), "Paragraph 2");
        assert_eq!(elements[1].nth_of_type(), 2);
    }

    #[test]
    fn test_invalid_selector() {
        let doc = Document::parse(SAMPLE_HTML).unwrap();
        assert!(matches!(doc.select("[[invalid"), Err(SpliceError::HtmlParseError(_))));
    }

    #[test]
    fn test_select_first_not_found() {
        let doc = Document::parse(SAMPLE_HTML).unwrap();
        assert!(matches!(doc.select_first("#nope"), Err(SpliceError::SelectorNotFound { .. })));
    }

    #[test]
    fn test_text_skips_scripts() {
        let doc = Document::parse(SAMPLE_HTML).unwrap();
        let text = doc.text_content();

        assert!(text.contains("Heading"));
        assert!(text.contains("Paragraph 2"));
        assert!(!text.contains("not text"));
    }

    #[test]
    fn test_asset_references() {
        let doc = Document::parse(SAMPLE_HTML).unwrap();
        assert_eq!(doc.stylesheet_hrefs(), vec!["css/site.css"]);
        assert_eq!(doc.script_srcs(), vec!["js/head.js", "/js/app.js"]);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<b>"Tom" & 'Jerry'</b>"#), "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;");
    }

    #[test]
    fn test_unescape_attribute() {
        assert_eq!(unescape_attribute("img/a.png?x=1&amp;y=2"), "img/a.png?x=1&y=2");
        assert_eq!(unescape_attribute("&amp;quot;"), "&quot;");
        assert_eq!(unescape_attribute("plain"), "plain");
    }

    #[test]
    fn test_direct_text() {
        let doc = Document::parse("<div id='a'>hello <span>x</span></div><div id='b'> <span>y</span> </div>").unwrap();
        assert!(doc.select_first("#a").unwrap().has_direct_text());
        assert!(!doc.select_first("#b").unwrap().has_direct_text());
    }
}
