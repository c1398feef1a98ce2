// src/analyzer/rules.rs
// =============================================================================
// Detection rules - pure functions from a DomSnapshot to findings.
//
// Every heuristic lives in one of the tables below so it can be read (and
// changed) in one place:
// - EXCLUDED_LINK_SCHEMES: hrefs that are not navigations
// - DEAD_HREFS: hrefs that go nowhere
// - CLICK_BINDING_ATTRIBUTES: attributes frameworks use to wire up clicks
// - EXEMPT_BUTTON_TYPES: button types that do something on their own
// =============================================================================

use url::Url;

use crate::findings::{DeadButton, ElementKind, FormDefect, FormIssue, MissingAlt, MissingImage};
use crate::render::{Button, DomSnapshot, FormControl, Image};

/// Link schemes that are never followed
pub const EXCLUDED_LINK_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:"];

/// Anchor hrefs that make a link dead
pub const DEAD_HREFS: &[&str] = &["#", "javascript:void(0)", "javascript:;"];

/// Inline handler attribute on buttons
pub const INLINE_CLICK_HANDLER: &str = "onclick";

/// Framework attributes that bind a click handler
pub const CLICK_BINDING_ATTRIBUTES: &[&str] = &[
    "ng-click",
    "v-on:click",
    "@click",
    "x-on:click",
    "(click)",
    "data-action",
    "data-toggle",
    "data-bs-toggle",
    "data-dismiss",
    "data-bs-dismiss",
    "hx-get",
    "hx-post",
    "hx-put",
    "hx-patch",
    "hx-delete",
];

/// Button types that act without any handler
pub const EXEMPT_BUTTON_TYPES: &[&str] = &["submit", "reset"];

/// Longest visible text we keep for a dead control
pub const MAX_TEXT_CHARS: usize = 50;

const NO_ALT: &str = "(no alt)";

/// All anchor hrefs, minus the non-navigation schemes
///
/// Links are returned raw and in document order; callers resolve and dedupe.
pub fn outbound_links(snapshot: &DomSnapshot) -> Vec<String> {
    snapshot
        .anchors
        .iter()
        .filter_map(|a| a.href.as_deref())
        .filter(|href| !has_excluded_scheme(href))
        .map(str::to_string)
        .collect()
}

fn has_excluded_scheme(href: &str) -> bool {
    let href = href.trim_start().to_ascii_lowercase();
    EXCLUDED_LINK_SCHEMES
        .iter()
        .any(|scheme| href.starts_with(scheme))
}

/// Resolves `href` against `base`, keeping only http(s) and dropping fragments
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let mut resolved = base.join(href.trim()).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved)
}

/// Images that are not fully loaded or have no intrinsic width
pub fn unloaded_images(snapshot: &DomSnapshot) -> Vec<MissingImage> {
    snapshot
        .images
        .iter()
        .filter(|image| is_unloaded(image))
        .map(|image| MissingImage {
            src: image.src.clone(),
            alt: image
                .alt
                .clone()
                .filter(|alt| !alt.is_empty())
                .unwrap_or_else(|| NO_ALT.to_string()),
        })
        .collect()
}

fn is_unloaded(image: &Image) -> bool {
    !image.complete || image.natural_width == Some(0)
}

/// Images whose alt text is missing, empty or only whitespace
pub fn images_missing_alt(snapshot: &DomSnapshot) -> Vec<MissingAlt> {
    snapshot
        .images
        .iter()
        .filter(|image| image.alt.as_deref().map_or(true, |alt| alt.trim().is_empty()))
        .map(|image| MissingAlt {
            src: image.src.clone(),
        })
        .collect()
}

/// Links that go nowhere and buttons that nothing listens to
pub fn dead_controls(snapshot: &DomSnapshot) -> Vec<DeadButton> {
    let dead_links = snapshot
        .anchors
        .iter()
        .filter(|anchor| match anchor.href.as_deref() {
            None => true,
            Some(href) => {
                let href = href.trim();
                DEAD_HREFS.iter().any(|dead| href.eq_ignore_ascii_case(dead))
            }
        })
        .map(|anchor| DeadButton {
            element: ElementKind::Link,
            text: truncate(&anchor.text),
        });

    let dead_buttons = snapshot
        .buttons
        .iter()
        .filter(|button| is_dead_button(button))
        .map(|button| DeadButton {
            element: ElementKind::Button,
            text: truncate(&button.text),
        });

    dead_links.chain(dead_buttons).collect()
}

fn is_dead_button(button: &Button) -> bool {
    let has_attr = |name: &str| button.attributes.iter().any(|a| a == name);

    let inline_handler = has_attr(INLINE_CLICK_HANDLER);
    let exempt_type = button
        .button_type
        .as_deref()
        .map_or(false, |t| EXEMPT_BUTTON_TYPES.contains(&t));
    let bound = CLICK_BINDING_ATTRIBUTES.iter().any(|attr| has_attr(attr));

    !inline_handler && !exempt_type && !button.in_form && !bound
}

fn truncate(text: &str) -> String {
    text.trim().chars().take(MAX_TEXT_CHARS).collect()
}

/// Forms without a real action and forms nobody can submit
pub fn form_issues(snapshot: &DomSnapshot) -> Vec<FormIssue> {
    let page = Url::parse(&snapshot.url).ok();
    let mut issues = Vec::new();

    for (index, form) in snapshot.forms.iter().enumerate() {
        let label = format!("Form {}", index + 1);

        if !has_real_action(form.action.as_deref(), page.as_ref()) {
            issues.push(FormIssue {
                form: label.clone(),
                issue: FormDefect::NoAction,
            });
        }
        if !form.controls.iter().any(is_submit_control) {
            issues.push(FormIssue {
                form: label,
                issue: FormDefect::NoSubmitButton,
            });
        }
    }

    issues
}

// An action counts only if it is present and points somewhere other than the page itself
fn has_real_action(action: Option<&str>, page: Option<&Url>) -> bool {
    let action = match action.map(str::trim) {
        Some(a) if !a.is_empty() => a,
        _ => return false,
    };
    match page {
        Some(page) => match page.join(action) {
            Ok(target) => target != *page,
            Err(_) => true,
        },
        None => true,
    }
}

fn is_submit_control(control: &FormControl) -> bool {
    match control.tag.as_str() {
        // A button's default type is submit
        "button" => matches!(control.control_type.as_deref(), None | Some("") | Some("submit")),
        "input" => matches!(control.control_type.as_deref(), Some("submit") | Some("image")),
        _ => false,
    }
}
