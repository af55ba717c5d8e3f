//! Semantic page snapshot types.
//!
//! A [`SemanticTree`] is the backend's only view of the page: an ordered,
//! bounded, privacy-filtered list of [`SemanticElement`]s. Each capture
//! produces a fresh tree; trees are never merged or persisted.
//!
//! Wire format (camelCase, geometry flattened):
//! ```json
//! { "tag": "button", "label": "Submit", "testId": "submit",
//!   "visible": true, "x": 0, "y": 24, "width": 1280, "height": 24 }
//! ```

use serde::{Deserialize, Serialize};

/// Layout rectangle in CSS pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl BoundingBox {
    /// Rectangle with the given geometry.
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the box has a non-zero area.
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Vertical center.
    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }
}

/// Snapshot of one DOM element at capture time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticElement {
    /// Lower-case tag name.
    pub tag: String,
    /// `id` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Space-joined class list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<String>,
    /// Accessible label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// `placeholder` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Trimmed text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// `type` attribute.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    /// `name` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `value` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// `href` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// `role` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// `data-testid` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    /// Whether the element has a non-empty layout box.
    pub visible: bool,
    /// Layout geometry.
    #[serde(flatten)]
    pub bounds: BoundingBox,
}

impl SemanticElement {
    /// The label shown to the backend: label → text → placeholder → testId →
    /// `tag#index`.
    pub fn display_label(&self, index: usize) -> String {
        [&self.label, &self.text, &self.placeholder, &self.test_id]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("{}#{index}", self.tag))
    }
}

/// Bounded semantic view of one page.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticTree {
    /// Page URL at capture time.
    pub url: String,
    /// Document title.
    pub title: String,
    /// Elements in document order.
    pub elements: Vec<SemanticElement>,
    /// Capture time, ms since the Unix epoch.
    pub timestamp: u64,
    /// Whether the element cap dropped later elements.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}
