//! Block-flow geometry.
//!
//! Without a rendering engine, geometry is approximated as a single column
//! of block boxes: every rendered element spans the viewport width and
//! stacks its children vertically. An element gets one [`ROW_HEIGHT`] row of
//! its own when it has direct text, or when it is a control or replaced
//! element with no child boxes. Hidden subtrees get a zero box. A layout
//! provider can pin any element's box with [`Document::set_rect`].
//!
//! Boxes are stored in document space; [`Layout::client_rect`] shifts them by
//! the scroll offset like `getBoundingClientRect`.

use std::collections::HashMap;

use rafael_core::page::BoundingBox;

use crate::document::{Document, NodeId};

/// Height of one line box in CSS pixels.
pub const ROW_HEIGHT: f64 = 24.0;

/// Elements that occupy a row even when empty.
const REPLACED_TAGS: &[&str] = &[
    "button", "input", "select", "textarea", "img", "iframe", "video", "canvas", "svg",
];

/// Geometry of one document at one point in time.
#[derive(Clone, Debug, Default)]
pub struct Layout {
    rects: HashMap<NodeId, BoundingBox>,
    content_height: f64,
    scroll_y: f64,
}

impl Layout {
    /// Lay out every rendered element of `doc`.
    pub fn compute(doc: &Document) -> Self {
        let viewport = doc.viewport();
        let mut layout = Self {
            rects: HashMap::new(),
            content_height: 0.0,
            scroll_y: viewport.scroll_y,
        };
        let mut y = 0.0;
        for &child in doc.children(doc.root()) {
            if doc.is_element(child) {
                y += layout.place(doc, child, y, viewport.width);
            }
        }
        layout.content_height = y;
        layout
    }

    fn place(&mut self, doc: &Document, id: NodeId, top: f64, width: f64) -> f64 {
        let Some(el) = doc.element(id) else {
            return 0.0;
        };
        if doc.is_self_hidden(id) {
            return 0.0;
        }

        let mut y = top;
        let mut has_text = false;
        let mut has_child_boxes = false;
        for &child in doc.children(id) {
            if doc.is_element(child) {
                let h = self.place(doc, child, y, width);
                has_child_boxes |= h > 0.0;
                y += h;
            } else if doc.text(child).is_some_and(|t| !t.trim().is_empty()) {
                has_text = true;
            }
        }

        let mut height = y - top;
        if has_text || (!has_child_boxes && REPLACED_TAGS.contains(&el.tag())) {
            height += ROW_HEIGHT;
        }

        let rect = doc
            .rect_override(id)
            .unwrap_or_else(|| BoundingBox::new(0.0, top, width, height));
        let _ = self.rects.insert(id, rect);
        height
    }

    /// Document-space box; zero for hidden or unknown nodes.
    pub fn document_rect(&self, id: NodeId) -> BoundingBox {
        self.rects.get(&id).copied().unwrap_or_default()
    }

    /// Viewport-relative box; zero for hidden or unknown nodes.
    pub fn client_rect(&self, id: NodeId) -> BoundingBox {
        match self.rects.get(&id) {
            Some(r) => BoundingBox::new(r.x, r.y - self.scroll_y, r.width, r.height),
            None => BoundingBox::default(),
        }
    }

    /// Total flow height of the page.
    pub fn content_height(&self) -> f64 {
        self.content_height
    }
}

#[cfg(test)]
mod tests {
    use crate::document::ScrollAlign;

    use super::*;

    fn doc(html: &str) -> Document {
        Document::parse(html, "https://app.test/").unwrap()
    }

    fn id(d: &Document, id: &str) -> NodeId {
        d.get_element_by_id(id).unwrap()
    }

    #[test]
    fn siblings_stack_vertically() {
        let d = doc(r#"<body><h1 id="a">Title</h1><button id="b">Go</button></body>"#);
        let l = d.layout();
        let a = l.client_rect(id(&d, "a"));
        let b = l.client_rect(id(&d, "b"));
        assert!((a.y - 0.0).abs() < f64::EPSILON);
        assert!((b.y - ROW_HEIGHT).abs() < f64::EPSILON);
        assert!((b.width - 1280.0).abs() < f64::EPSILON);
        assert!(b.has_area());
    }

    #[test]
    fn container_wraps_children() {
        let d = doc(r#"<body><nav id="n"><a href="/">Home</a><a href="/x">X</a></nav></body>"#);
        let rect = d.client_rect(id(&d, "n"));
        assert!((rect.height - 2.0 * ROW_HEIGHT).abs() < f64::EPSILON);
    }

    #[test]
    fn hidden_and_empty_elements_have_no_area() {
        let d = doc(
            r#"<body><div hidden><button id="h">x</button></div><a id="e" href="/"></a><button id="c"></button></body>"#,
        );
        let l = d.layout();
        assert!(!l.client_rect(id(&d, "h")).has_area());
        assert!(!l.client_rect(id(&d, "e")).has_area());
        assert!(l.client_rect(id(&d, "c")).has_area());
    }

    #[test]
    fn override_replaces_flow_box() {
        let mut d = doc(r#"<body><button id="b">Go</button></body>"#);
        let b = id(&d, "b");
        d.set_rect(b, BoundingBox::new(10.0, 20.0, 0.0, 0.0));
        assert!(!d.client_rect(b).has_area());
    }

    #[test]
    fn scrolling_shifts_client_rects() {
        let html: String = (0..100)
            .map(|i| format!(r#"<p id="p{i}">row {i}</p>"#))
            .collect();
        let mut d = doc(&format!("<body>{html}</body>"));
        let target = id(&d, "p80");
        d.scroll_into_view(target, ScrollAlign::Center);
        let rect = d.client_rect(target);
        let vh = d.viewport().height;
        assert!((rect.center_y() - vh / 2.0).abs() < 1.0);
    }

    #[test]
    fn scroll_is_clamped_at_top() {
        let mut d = doc(r#"<body><p id="p">first</p></body>"#);
        d.scroll_into_view(id(&d, "p"), ScrollAlign::Center);
        assert!((d.viewport().scroll_y - 0.0).abs() < f64::EPSILON);
    }
}
