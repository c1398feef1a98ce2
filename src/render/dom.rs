// src/render/dom.rs
// =============================================================================
// A structured, engine-independent snapshot of a rendered page.
//
// The analyzer rules only ever see these plain structs, never a live DOM.
// That keeps every rule a pure function that can be tested with a string of
// HTML.
// =============================================================================

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// The parts of a page the analyzer cares about
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomSnapshot {
    /// The document URL (after redirects)
    pub url: String,
    pub title: String,
    pub anchors: Vec<Anchor>,
    pub images: Vec<Image>,
    pub buttons: Vec<Button>,
    pub forms: Vec<Form>,
}

/// An <a> element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// The raw href attribute, exactly as written
    pub href: Option<String>,
    pub text: String,
}

/// An <img> element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Absolute source URL when it resolves, otherwise the raw attribute
    pub src: String,
    pub alt: Option<String>,
    /// Whether the image finished loading
    pub complete: bool,
    /// Intrinsic width, None when the engine has no layout information
    pub natural_width: Option<u32>,
}

/// A <button> element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    /// The explicit type attribute, lowercased
    pub button_type: Option<String>,
    pub in_form: bool,
    /// Every attribute name on the element, lowercased
    pub attributes: Vec<String>,
}

/// A <form> element and the controls inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub action: Option<String>,
    pub controls: Vec<FormControl>,
}

/// A <button> or <input> inside a form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormControl {
    pub tag: String,
    pub control_type: Option<String>,
}

impl DomSnapshot {
    /// Parses an HTML document into a snapshot
    ///
    /// Images come out as not yet loaded; the engine fills in `complete`
    /// and `natural_width` once it knows more.
    pub fn from_html(html: &str, page_url: &str) -> Self {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();

        // Selectors are constants, so parsing them cannot fail
        let anchor_selector = Selector::parse("a").unwrap();
        let image_selector = Selector::parse("img").unwrap();
        let button_selector = Selector::parse("button").unwrap();
        let form_selector = Selector::parse("form").unwrap();
        let control_selector = Selector::parse("button, input").unwrap();

        let title = title_of(&document);

        let anchors = document
            .select(&anchor_selector)
            .map(|a| Anchor {
                href: a.value().attr("href").map(str::to_string),
                text: collapse_text(a),
            })
            .collect();

        let images = document
            .select(&image_selector)
            .map(|img| {
                let raw = img.value().attr("src").unwrap_or("").trim();
                let src = match (&base, raw.is_empty()) {
                    (Some(base), false) => base
                        .join(raw)
                        .map(|u| u.to_string())
                        .unwrap_or_else(|_| raw.to_string()),
                    _ => raw.to_string(),
                };
                Image {
                    src,
                    alt: img.value().attr("alt").map(str::to_string),
                    complete: false,
                    natural_width: None,
                }
            })
            .collect();

        let buttons = document
            .select(&button_selector)
            .map(|button| Button {
                text: collapse_text(button),
                button_type: lowercase_attr(button, "type"),
                in_form: button.value().attr("form").is_some() || inside_form(button),
                attributes: button
                    .value()
                    .attrs()
                    .map(|(name, _)| name.to_ascii_lowercase())
                    .collect(),
            })
            .collect();

        let forms = document
            .select(&form_selector)
            .map(|form| Form {
                action: form.value().attr("action").map(str::to_string),
                controls: form
                    .select(&control_selector)
                    .map(|control| FormControl {
                        tag: control.value().name().to_ascii_lowercase(),
                        control_type: lowercase_attr(control, "type"),
                    })
                    .collect(),
            })
            .collect();

        Self {
            url: page_url.to_string(),
            title,
            anchors,
            images,
            buttons,
            forms,
        }
    }
}

// Visible text with runs of whitespace squashed to single spaces
/// The document's title with whitespace collapsed; empty when there is none
pub fn document_title(html: &str) -> String {
    title_of(&Html::parse_document(html))
}

fn title_of(document: &Html) -> String {
    let selector = Selector::parse("title").unwrap();
    document
        .select(&selector)
        .next()
        .map(collapse_text)
        .unwrap_or_default()
}

fn collapse_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn lowercase_attr(element: ElementRef<'_>, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(|v| v.trim().to_ascii_lowercase())
}

fn inside_form(element: ElementRef<'_>) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .map(|e| e.name().eq_ignore_ascii_case("form"))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_and_anchors() {
        let html = r#"<html><head><title>  Home
            page </title></head><body>
            <a href="/about">About   us</a>
            <a>No href</a>
        </body></html>"#;
        let snapshot = DomSnapshot::from_html(html, "https://example.test/");

        assert_eq!(snapshot.title, "Home page");
        assert_eq!(document_title(html), snapshot.title);
        assert_eq!(snapshot.anchors.len(), 2);
        assert_eq!(snapshot.anchors[0].href.as_deref(), Some("/about"));
        assert_eq!(snapshot.anchors[0].text, "About us");
        assert_eq!(snapshot.anchors[1].href, None);
    }

    #[test]
    fn test_image_src_resolved_against_page() {
        let html = r#"<img src="img/logo.png" alt="Logo"><img>"#;
        let snapshot = DomSnapshot::from_html(html, "https://example.test/docs/");

        assert_eq!(snapshot.images[0].src, "https://example.test/docs/img/logo.png");
        assert_eq!(snapshot.images[0].alt.as_deref(), Some("Logo"));
        assert!(!snapshot.images[0].complete);
        assert_eq!(snapshot.images[1].src, "");
        assert_eq!(snapshot.images[1].alt, None);
    }

    #[test]
    fn test_buttons_know_their_form() {
        let html = r#"
            <button onclick="go()">Go</button>
            <form><div><button type="SUBMIT">Send</button></div></form>
            <button form="signup">Detached</button>
        "#;
        let snapshot = DomSnapshot::from_html(html, "https://example.test/");

        assert!(!snapshot.buttons[0].in_form);
        assert!(snapshot.buttons[0].attributes.contains(&"onclick".to_string()));
        assert!(snapshot.buttons[1].in_form);
        assert_eq!(snapshot.buttons[1].button_type.as_deref(), Some("submit"));
        assert!(snapshot.buttons[2].in_form);
    }

    #[test]
    fn test_form_controls_collected() {
        let html = r#"
            <form action="/search"><input type="text" name="q"><input type="submit"></form>
            <form></form>
        "#;
        let snapshot = DomSnapshot::from_html(html, "https://example.test/");

        assert_eq!(snapshot.forms.len(), 2);
        assert_eq!(snapshot.forms[0].action.as_deref(), Some("/search"));
        assert_eq!(snapshot.forms[0].controls.len(), 2);
        assert_eq!(snapshot.forms[0].controls[1].control_type.as_deref(), Some("submit"));
        assert!(snapshot.forms[1].controls.is_empty());
    }
}
