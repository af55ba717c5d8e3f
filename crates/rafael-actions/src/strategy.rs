//! Label → node resolution.
//!
//! The backend only knows elements by the labels it saw in the semantic tree.
//! Each [`Strategy`] is one pure lookup over the whole document in document
//! order; a cascade is an ordered slice of strategies and the first one that
//! yields an acceptable node wins. Visibility is not considered.

use std::fmt;

use rafael_dom::{Document, NodeId};

/// Tags whose text counts as a clickable caption.
const TEXT_TARGET_TAGS: &[&str] = &["button", "a"];

/// One way of finding an element from a label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// `aria-label` equals the label.
    AriaLabelExact,
    /// `aria-label` contains the label.
    AriaLabelPartial,
    /// Text of a button, link or `[role=button]` equals the label.
    TextExact,
    /// Text of a button, link or `[role=button]` contains the label.
    TextPartial,
    /// `data-testid` equals the label.
    TestId,
    /// `placeholder` contains the label.
    Placeholder,
    /// A `<label>` whose text contains the label, followed to its control.
    LabelText,
}

/// Cascade for `click_element` and tooltip anchors.
pub const CLICKABLE: &[Strategy] = &[
    Strategy::AriaLabelExact,
    Strategy::AriaLabelPartial,
    Strategy::TextExact,
    Strategy::TextPartial,
    Strategy::TestId,
    Strategy::Placeholder,
];

/// Cascade for `fill_field` and `select_option`.
pub const FILLABLE: &[Strategy] = &[
    Strategy::AriaLabelExact,
    Strategy::Placeholder,
    Strategy::LabelText,
];

/// Cascade for `scroll_to` and `wait_for`.
pub const TEXT_ONLY: &[Strategy] = &[Strategy::TextPartial];

impl Strategy {
    /// Stable name reported in `details.strategy`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AriaLabelExact => "aria_label_exact",
            Self::AriaLabelPartial => "aria_label_partial",
            Self::TextExact => "text_exact",
            Self::TextPartial => "text_partial",
            Self::TestId => "test_id",
            Self::Placeholder => "placeholder",
            Self::LabelText => "label_text",
        }
    }

    /// First node in document order this strategy matches and `accept` allows.
    pub fn find(
        self,
        doc: &Document,
        label: &str,
        accept: impl Fn(&Document, NodeId) -> bool,
    ) -> Option<NodeId> {
        match self {
            Self::AriaLabelExact => first(doc, &accept, |n| doc.attr(n, "aria-label") == Some(label)),
            Self::AriaLabelPartial => first(doc, &accept, |n| {
                doc.attr(n, "aria-label").is_some_and(|v| v.contains(label))
            }),
            Self::TextExact => first(doc, &accept, |n| {
                is_text_target(doc, n) && doc.text_content(n) == label
            }),
            Self::TextPartial => first(doc, &accept, |n| {
                is_text_target(doc, n) && doc.text_content(n).contains(label)
            }),
            Self::TestId => first(doc, &accept, |n| doc.attr(n, "data-testid") == Some(label)),
            Self::Placeholder => first(doc, &accept, |n| {
                doc.attr(n, "placeholder").is_some_and(|v| v.contains(label))
            }),
            Self::LabelText => doc
                .elements()
                .filter(|&n| doc.tag(n) == Some("label") && doc.text_content(n).contains(label))
                .filter_map(|l| doc.labeled_control(l))
                .find(|&n| accept(doc, n)),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn first(
    doc: &Document,
    accept: &impl Fn(&Document, NodeId) -> bool,
    matches: impl Fn(NodeId) -> bool,
) -> Option<NodeId> {
    doc.elements().find(|&n| matches(n) && accept(doc, n))
}

fn is_text_target(doc: &Document, id: NodeId) -> bool {
    doc.tag(id).is_some_and(|t| TEXT_TARGET_TAGS.contains(&t))
        || doc.attr(id, "role") == Some("button")
}

/// A resolved element and the strategy that found it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// The element.
    pub node: NodeId,
    /// Winning strategy.
    pub strategy: Strategy,
}

/// Run `cascade` in order and return the first hit.
pub fn resolve(
    doc: &Document,
    cascade: &[Strategy],
    label: &str,
    accept: impl Fn(&Document, NodeId) -> bool,
) -> Option<Resolution> {
    cascade.iter().find_map(|&strategy| {
        strategy
            .find(doc, label, &accept)
            .map(|node| Resolution { node, strategy })
    })
}

/// Accepts any element.
pub fn any_element(doc: &Document, id: NodeId) -> bool {
    doc.is_element(id)
}

/// Accepts text inputs and textareas.
pub fn text_control(doc: &Document, id: NodeId) -> bool {
    matches!(doc.tag(id), Some("input" | "textarea"))
}

/// Accepts `<select>` elements.
pub fn select_control(doc: &Document, id: NodeId) -> bool {
    doc.tag(id) == Some("select")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Document {
        Document::parse(&format!("<html><body>{body}</body></html>"), "https://app.test/").unwrap()
    }

    fn resolved(doc: &Document, cascade: &[Strategy], label: &str) -> Option<(String, Strategy)> {
        resolve(doc, cascade, label, any_element).map(|r| {
            let name = doc
                .attr(r.node, "id")
                .map_or_else(|| doc.tag(r.node).unwrap_or_default().to_owned(), str::to_owned);
            (name, r.strategy)
        })
    }

    #[test]
    fn aria_exact_beats_text_exact() {
        let d = doc(r#"<button id="by-text">Save</button><button id="by-aria" aria-label="Save">S</button>"#);
        assert_eq!(
            resolved(&d, CLICKABLE, "Save"),
            Some(("by-aria".into(), Strategy::AriaLabelExact))
        );
    }

    #[test]
    fn aria_partial_beats_text() {
        let d = doc(r#"<a id="link">settings</a><div id="wrap" aria-label="Open settings"></div>"#);
        assert_eq!(
            resolved(&d, CLICKABLE, "settings"),
            Some(("wrap".into(), Strategy::AriaLabelPartial))
        );
    }

    #[test]
    fn text_exact_beats_text_partial_regardless_of_order() {
        let d = doc(r#"<button id="long">Log in now</button><button id="exact">Log in</button>"#);
        assert_eq!(
            resolved(&d, CLICKABLE, "Log in"),
            Some(("exact".into(), Strategy::TextExact))
        );
    }

    #[test]
    fn text_matching_is_limited_to_buttons_and_links() {
        let d = doc(r#"<p id="para">Continue</p><span id="fake" role="button">Continue</span>"#);
        assert_eq!(
            resolved(&d, CLICKABLE, "Continue"),
            Some(("fake".into(), Strategy::TextExact))
        );
    }

    #[test]
    fn text_is_whitespace_collapsed() {
        let d = doc("<button id=\"b\">\n  Sign\n   up  </button>");
        assert_eq!(
            resolved(&d, CLICKABLE, "Sign up"),
            Some(("b".into(), Strategy::TextExact))
        );
    }

    #[test]
    fn test_id_and_placeholder_are_last_resorts() {
        let d = doc(r#"<div id="t" data-testid="checkout"></div><input id="p" placeholder="Search products">"#);
        assert_eq!(
            resolved(&d, CLICKABLE, "checkout"),
            Some(("t".into(), Strategy::TestId))
        );
        assert_eq!(
            resolved(&d, CLICKABLE, "Search"),
            Some(("p".into(), Strategy::Placeholder))
        );
    }

    #[test]
    fn matching_is_case_sensitive() {
        let d = doc("<button>Save</button>");
        assert_eq!(resolved(&d, CLICKABLE, "save"), None);
    }

    #[test]
    fn hidden_elements_still_resolve() {
        let d = doc(r#"<button id="h" style="display: none">Hidden</button>"#);
        assert_eq!(
            resolved(&d, CLICKABLE, "Hidden"),
            Some(("h".into(), Strategy::TextExact))
        );
    }

    #[test]
    fn label_text_follows_for_and_nesting() {
        let d = doc(concat!(
            r#"<label for="email">Work email</label><input id="email">"#,
            r#"<label>Phone number <input id="phone"></label>"#,
        ));
        assert_eq!(
            resolved(&d, FILLABLE, "email"),
            Some(("email".into(), Strategy::LabelText))
        );
        assert_eq!(
            resolved(&d, FILLABLE, "Phone"),
            Some(("phone".into(), Strategy::LabelText))
        );
    }

    #[test]
    fn accept_filter_skips_wrong_controls() {
        let d = doc(concat!(
            r#"<button id="b" aria-label="Country">Pick</button>"#,
            r#"<label for="c">Country</label><select id="c"><option>NZ</option></select>"#,
        ));
        let r = resolve(&d, FILLABLE, "Country", select_control).unwrap();
        assert_eq!(d.attr(r.node, "id"), Some("c"));
        assert_eq!(r.strategy, Strategy::LabelText);
        assert!(resolve(&d, FILLABLE, "Country", text_control).is_none());
    }

    #[test]
    fn scroll_cascade_is_text_only() {
        let d = doc(r##"<div aria-label="Pricing"></div><a id="p" href="#pricing">See pricing</a>"##);
        assert_eq!(
            resolved(&d, TEXT_ONLY, "pricing"),
            Some(("p".into(), Strategy::TextPartial))
        );
        assert_eq!(resolved(&d, TEXT_ONLY, "Pricing"), None);
    }

    #[test]
    fn resolution_is_deterministic() {
        let d = doc(r#"<button>Next</button><button>Next</button>"#);
        let a = resolve(&d, CLICKABLE, "Next", any_element);
        let b = resolve(&d, CLICKABLE, "Next", any_element);
        assert_eq!(a, b);
    }

    #[test]
    fn strategy_names_are_snake_case() {
        assert_eq!(Strategy::AriaLabelExact.to_string(), "aria_label_exact");
        assert_eq!(Strategy::LabelText.as_str(), "label_text");
    }
}
