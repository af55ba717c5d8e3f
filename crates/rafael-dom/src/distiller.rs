//! Semantic distiller: document → bounded, privacy-scrubbed [`SemanticTree`].
//!
//! Traversal is pre-order from `<body>` (or the document node when there is
//! none). Elements that are neither interactive nor meaningful are skipped but
//! their descendants are still visited, so a button inside a plain `<div>` is
//! found. Sensitive fields are dropped before insertion and never count
//! towards the cap; once the cap is reached later elements are dropped and
//! the tree is marked truncated.

use rafael_core::clock::{SharedClock, system_clock};
use rafael_core::page::{SemanticElement, SemanticTree};
use rafael_core::text::truncate_chars;
use rafael_settings::DistillerSettings;
use tracing::{debug, instrument, trace};

use crate::document::{Document, NodeId};
use crate::layout::Layout;
use crate::pii::is_pii_element;

/// Upper bound on captured element text; containers can hold a whole page.
pub const MAX_TEXT_CHARS: usize = 200;

const INTERACTIVE_TAGS: &[&str] = &[
    "button", "a", "input", "select", "textarea", "checkbox", "radio",
];
const INTERACTIVE_ROLES: &[&str] = &["button", "link", "menuitem", "checkbox", "radio"];
const MEANINGFUL_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "nav", "header", "footer", "section", "article",
];
const MEANINGFUL_ROLES: &[&str] = &[
    "banner",
    "navigation",
    "main",
    "complementary",
    "contentinfo",
];

/// Whether the element is something a user can operate.
pub fn is_interactive(doc: &Document, id: NodeId) -> bool {
    let Some(el) = doc.element(id) else {
        return false;
    };
    INTERACTIVE_TAGS.contains(&el.tag())
        || el.attr("role").is_some_and(|r| INTERACTIVE_ROLES.contains(&r))
}

/// Whether the element structures the page (headings, landmarks).
pub fn is_meaningful(doc: &Document, id: NodeId) -> bool {
    let Some(el) = doc.element(id) else {
        return false;
    };
    MEANINGFUL_TAGS.contains(&el.tag())
        || el.attr("role").is_some_and(|r| MEANINGFUL_ROLES.contains(&r))
}

/// Captures semantic trees.
pub struct Distiller {
    settings: DistillerSettings,
    clock: SharedClock,
}

impl Distiller {
    /// Distiller stamping trees with the wall clock.
    pub fn new(settings: DistillerSettings) -> Self {
        Self::with_clock(settings, system_clock())
    }

    /// Distiller with an injected clock.
    pub fn with_clock(settings: DistillerSettings, clock: SharedClock) -> Self {
        Self { settings, clock }
    }

    /// Settings in effect.
    pub fn settings(&self) -> &DistillerSettings {
        &self.settings
    }

    /// Snapshot the document. Read-only; identical documents produce
    /// identical trees apart from the timestamp.
    #[instrument(skip_all, fields(url = %doc.href()))]
    pub fn capture(&self, doc: &Document) -> SemanticTree {
        let layout = doc.layout();
        let start = doc.body().unwrap_or(doc.root());
        let max = self.settings.max_elements;

        let mut elements = Vec::new();
        let mut truncated = false;
        let mut rejected = 0usize;

        for id in doc.elements_under(start) {
            if !(is_interactive(doc, id) || is_meaningful(doc, id)) {
                continue;
            }
            let Some(el) = describe(doc, &layout, id) else {
                continue;
            };
            if is_pii_element(&el) {
                rejected += 1;
                trace!(tag = %el.tag, "skipping sensitive field");
                continue;
            }
            if elements.len() >= max {
                truncated = true;
                break;
            }
            elements.push(el);
        }

        debug!(
            count = elements.len(),
            rejected, truncated, "captured semantic tree"
        );

        SemanticTree {
            url: doc.href().to_owned(),
            title: doc.title().to_owned(),
            elements,
            timestamp: self.clock.now_ms(),
            truncated,
        }
    }
}

/// Build the semantic record for one element.
pub fn describe(doc: &Document, layout: &Layout, id: NodeId) -> Option<SemanticElement> {
    let el = doc.element(id)?;
    let attr = |name: &str| el.non_empty_attr(name).map(str::to_owned);

    let classes = el.attr("class").map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "));
    let text = doc.text_content(id);
    let bounds = layout.client_rect(id);

    Some(SemanticElement {
        tag: el.tag().to_owned(),
        id: attr("id"),
        classes: classes.filter(|c| !c.is_empty()),
        label: accessible_label(doc, id),
        placeholder: attr("placeholder"),
        text: (!text.is_empty()).then(|| truncate_chars(&text, MAX_TEXT_CHARS).to_owned()),
        input_type: attr("type"),
        name: attr("name"),
        value: attr("value"),
        href: attr("href"),
        role: attr("role"),
        test_id: attr("data-testid"),
        visible: bounds.has_area(),
        bounds,
    })
}

/// Accessible label: `aria-label`, then `aria-labelledby` text, then an
/// associated `<label>`, then `title`.
pub fn accessible_label(doc: &Document, id: NodeId) -> Option<String> {
    let el = doc.element(id)?;

    if let Some(aria) = el.non_empty_attr("aria-label") {
        return Some(aria.to_owned());
    }

    if let Some(ids) = el.non_empty_attr("aria-labelledby") {
        let text = ids
            .split_whitespace()
            .filter_map(|ref_id| doc.get_element_by_id(ref_id))
            .map(|n| doc.text_content(n))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !text.is_empty() {
            return Some(text);
        }
    }

    if let Some(text) = doc
        .labels_for(id)
        .into_iter()
        .map(|l| doc.text_content(l))
        .find(|t| !t.is_empty())
    {
        return Some(text);
    }

    el.non_empty_attr("title").map(str::to_owned)
}
