//! Arena-backed page model.
//!
//! A [`Document`] is parsed once from HTML and then mutated only through the
//! operations an action can perform: setting form values, scrolling,
//! dispatching events, changing the location and showing tooltips. Scheduled
//! [`PageMutation`]s stand in for the page's own scripts; they are applied
//! when the owner advances the page clock.
//!
//! Node ids are indices into the arena and stay valid for the lifetime of
//! the document. Nodes removed from the tree are detached, never freed, so
//! traversal from the root simply stops reaching them.

use std::collections::HashMap;
use std::time::Duration;

use rafael_core::page::BoundingBox;
use rafael_core::text::collapse_whitespace;
use scraper::{Html, Selector};
use url::Url;

use crate::errors::{DomError, Result};
use crate::layout::Layout;

/// Default viewport width in CSS pixels.
pub const DEFAULT_VIEWPORT_WIDTH: f64 = 1280.0;
/// Default viewport height in CSS pixels.
pub const DEFAULT_VIEWPORT_HEIGHT: f64 = 800.0;

/// Elements that never produce a box.
const NON_RENDERED_TAGS: &[&str] = &[
    "head", "script", "style", "title", "meta", "link", "template", "noscript",
];

/// Elements whose text never counts as page text.
const TEXTLESS_TAGS: &[&str] = &["script", "style", "template", "noscript"];

/// Form controls a `<label>` can be associated with.
const LABELABLE_TAGS: &[&str] = &["input", "select", "textarea"];

// ─────────────────────────────────────────────────────────────────────────────
// Nodes
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a node in one [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Arena index.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Tag and attributes of an element node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
}

impl ElementData {
    /// Element with a lower-cased tag.
    pub fn new(tag: &str, attrs: Vec<(String, String)>) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs,
        }
    }

    /// Lower-case tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value, treating an empty string as absent.
    pub fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).filter(|v| !v.is_empty())
    }

    /// Whether the attribute is present.
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(k, _)| k == name)
    }

    /// All attributes in source order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| k == name) {
            value.clone_into(&mut slot.1);
        } else {
            self.attrs.push((name.to_owned(), value.to_owned()));
        }
    }

    fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }
}

#[derive(Clone, Debug)]
enum NodeData {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Clone, Debug)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Page state
// ─────────────────────────────────────────────────────────────────────────────

/// Visible area of the page.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Width in CSS pixels.
    pub width: f64,
    /// Height in CSS pixels.
    pub height: f64,
    /// Vertical scroll offset.
    pub scroll_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_VIEWPORT_WIDTH,
            height: DEFAULT_VIEWPORT_HEIGHT,
            scroll_y: 0.0,
        }
    }
}

/// Where a scrolled element should land in the viewport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScrollAlign {
    /// Top edge aligned with the viewport top.
    Start,
    /// Centered vertically.
    #[default]
    Center,
    /// Bottom edge aligned with the viewport bottom.
    End,
}

impl ScrollAlign {
    /// Map a `position` hint (`top`, `center`, `bottom`). Unknown hints center.
    pub fn from_position(position: Option<&str>) -> Self {
        match position {
            Some("top") => Self::Start,
            Some("bottom") => Self::End,
            _ => Self::Center,
        }
    }
}

/// Synthetic DOM event types the executor dispatches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DomEventKind {
    /// Pointer pressed.
    MouseDown,
    /// Pointer released.
    MouseUp,
    /// Activation.
    Click,
    /// Value changed by one keystroke.
    Input,
    /// Value committed.
    Change,
}

impl DomEventKind {
    /// DOM event name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MouseDown => "mousedown",
            Self::MouseUp => "mouseup",
            Self::Click => "click",
            Self::Input => "input",
            Self::Change => "change",
        }
    }
}

/// One dispatched event. All events bubble.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomEvent {
    /// Event target.
    pub target: NodeId,
    /// Event type.
    pub kind: DomEventKind,
    /// Target's value when the event fired, for form controls.
    pub value: Option<String>,
}

/// A guidance tooltip shown to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tooltip {
    /// Label the backend pointed at.
    pub label: String,
    /// Text shown.
    pub message: String,
    /// Element the tooltip is attached to, when it resolved.
    pub anchor: Option<NodeId>,
}

/// A change the page makes to itself, applied by [`Document::advance`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageMutation {
    /// Replace a node's children with one text node.
    SetText {
        /// Target element.
        node: NodeId,
        /// New text.
        text: String,
    },
    /// Parse `html` and append it under `parent`.
    AppendHtml {
        /// Container.
        parent: NodeId,
        /// Markup fragment.
        html: String,
    },
    /// Set an attribute.
    SetAttribute {
        /// Target element.
        node: NodeId,
        /// Attribute name.
        name: String,
        /// Attribute value.
        value: String,
    },
    /// Remove an attribute.
    RemoveAttribute {
        /// Target element.
        node: NodeId,
        /// Attribute name.
        name: String,
    },
}

#[derive(Clone, Debug)]
struct Scheduled {
    due: Duration,
    mutation: PageMutation,
}

// ─────────────────────────────────────────────────────────────────────────────
// Document
// ─────────────────────────────────────────────────────────────────────────────

/// A parsed page with its live state.
#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<Node>,
    location: Url,
    title: String,
    viewport: Viewport,
    values: HashMap<NodeId, String>,
    rect_overrides: HashMap<NodeId, BoundingBox>,
    events: Vec<DomEvent>,
    tooltips: Vec<Tooltip>,
    scheduled: Vec<Scheduled>,
    elapsed: Duration,
}

impl Document {
    /// Parse `html` as the page at `url`.
    ///
    /// HTML parsing is error tolerant; only an unparseable URL fails.
    pub fn parse(html: &str, url: &str) -> Result<Self> {
        let location = parse_url(url)?;
        let parsed = Html::parse_document(html);
        let title = extract_title(&parsed);

        let mut doc = Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
            location,
            title,
            viewport: Viewport::default(),
            values: HashMap::new(),
            rect_overrides: HashMap::new(),
            events: Vec::new(),
            tooltips: Vec::new(),
            scheduled: Vec::new(),
            elapsed: Duration::ZERO,
        };
        let root = doc.root();
        let _ = doc.import(&parsed, root, false);
        Ok(doc)
    }

    /// Copy the scraper tree under `parent`, returning the top-level nodes.
    ///
    /// Fragments are wrapped in a synthetic `<html>` element by the parser;
    /// `fragment` unwraps it.
    fn import(&mut self, parsed: &Html, parent: NodeId, fragment: bool) -> Vec<NodeId> {
        let root = parsed.tree.root();
        let mut stack: Vec<_> = if fragment {
            root.children()
                .filter(|c| c.value().as_element().is_some_and(|e| e.name() == "html"))
                .flat_map(|wrapper| wrapper.children())
                .map(|c| (c, parent))
                .collect()
        } else {
            root.children().map(|c| (c, parent)).collect()
        };
        stack.reverse();

        let mut top_level = Vec::new();
        while let Some((src, dest)) = stack.pop() {
            let data = match src.value() {
                scraper::Node::Element(el) => NodeData::Element(ElementData::new(
                    el.name(),
                    el.attrs()
                        .map(|(k, v)| (k.to_owned(), v.to_owned()))
                        .collect(),
                )),
                scraper::Node::Text(text) => NodeData::Text(String::from(&**text)),
                _ => continue,
            };
            let id = self.push_node(data, dest);
            if dest == parent {
                top_level.push(id);
            }
            let children: Vec<_> = src.children().collect();
            for child in children.into_iter().rev() {
                stack.push((child, id));
            }
        }
        top_level
    }

    fn push_node(&mut self, data: NodeData, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.push(id);
        }
        id
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    // ── Tree queries ────────────────────────────────────────────────

    /// The document node.
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The `<body>` element, if the page has one.
    pub fn body(&self) -> Option<NodeId> {
        self.elements().find(|&id| self.tag(id) == Some("body"))
    }

    /// Element data for `id`, or `None` for text and document nodes.
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Whether `id` is an element.
    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Text of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Lower-case tag of an element.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(ElementData::tag)
    }

    /// Attribute of an element.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    /// Parent node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    /// Child nodes in order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Ancestors from the parent up to the document node.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// Whether `node` is `ancestor` or inside it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Pre-order descendants of `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            stack: self.children(id).iter().rev().copied().collect(),
        }
    }

    /// Every element in document order.
    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.descendants(self.root())
            .filter(move |&id| self.is_element(id))
    }

    /// Elements inside `id` in document order.
    pub fn elements_under(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.descendants(id).filter(move |&n| self.is_element(n))
    }

    /// First element whose `id` attribute equals `id`.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        if id.is_empty() {
            return None;
        }
        self.elements().find(|&n| self.attr(n, "id") == Some(id))
    }

    // ── Text ────────────────────────────────────────────────────────

    /// Whitespace-collapsed text of `id` and its descendants.
    ///
    /// Script and style contents are excluded.
    pub fn text_content(&self, id: NodeId) -> String {
        collapse_whitespace(&self.raw_text(id))
    }

    fn raw_text(&self, id: NodeId) -> String {
        if let Some(t) = self.text(id) {
            return t.to_owned();
        }
        let mut out = String::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            match self.node(n).map(|node| &node.data) {
                Some(NodeData::Text(t)) => out.push_str(t),
                Some(NodeData::Element(el)) if !TEXTLESS_TAGS.contains(&el.tag()) => {
                    stack.extend(self.children(n).iter().rev().copied());
                }
                _ => {}
            }
        }
        out
    }

    /// Page text as a reader would see it. See [`crate::render`].
    pub fn rendered_text(&self) -> String {
        crate::render::rendered_text(self, self.body().unwrap_or(self.root()))
    }

    // ── Labels ──────────────────────────────────────────────────────

    /// `<label>` elements describing `id`: `label[for=<id>]` first, then a
    /// wrapping label.
    pub fn labels_for(&self, id: NodeId) -> Vec<NodeId> {
        let mut labels = Vec::new();
        if let Some(dom_id) = self.element(id).and_then(|e| e.non_empty_attr("id")) {
            labels.extend(
                self.elements()
                    .filter(|&l| self.tag(l) == Some("label") && self.attr(l, "for") == Some(dom_id)),
            );
        }
        if let Some(wrapping) = self
            .ancestors(id)
            .find(|&a| self.tag(a) == Some("label"))
        {
            if !labels.contains(&wrapping) {
                labels.push(wrapping);
            }
        }
        labels
    }

    /// The control a `<label>` points at: its `for` target, else the first
    /// input, select or textarea inside it.
    pub fn labeled_control(&self, label: NodeId) -> Option<NodeId> {
        if let Some(target) = self.element(label).and_then(|e| e.non_empty_attr("for")) {
            return self.get_element_by_id(target);
        }
        self.elements_under(label)
            .find(|&n| self.tag(n).is_some_and(|t| LABELABLE_TAGS.contains(&t)))
    }

    // ── Form values ─────────────────────────────────────────────────

    /// Current value of a form control, `None` for other elements.
    pub fn value(&self, id: NodeId) -> Option<String> {
        let el = self.element(id)?;
        if let Some(v) = self.values.get(&id) {
            return Some(v.clone());
        }
        match el.tag() {
            "input" => Some(el.attr("value").unwrap_or_default().to_owned()),
            "textarea" => Some(self.raw_text(id)),
            "select" => {
                let options: Vec<NodeId> = self
                    .elements_under(id)
                    .filter(|&n| self.tag(n) == Some("option"))
                    .collect();
                options
                    .iter()
                    .find(|&&o| self.element(o).is_some_and(|e| e.has_attr("selected")))
                    .or(options.first())
                    .map(|&o| self.option_value(o))
            }
            _ => None,
        }
    }

    /// Value of an `<option>`: its `value` attribute, else its text.
    pub fn option_value(&self, option: NodeId) -> String {
        self.attr(option, "value")
            .map_or_else(|| self.text_content(option), str::to_owned)
    }

    /// Set a control's value. For a `<select>`, the matching option becomes
    /// the only selected one.
    pub fn set_value(&mut self, id: NodeId, value: &str) {
        if !self.is_element(id) {
            return;
        }
        let _ = self.values.insert(id, value.to_owned());
        if self.tag(id) == Some("select") {
            let options: Vec<NodeId> = self
                .elements_under(id)
                .filter(|&n| self.tag(n) == Some("option"))
                .collect();
            for option in options {
                let selected = self.option_value(option) == value;
                if selected {
                    self.set_attribute(option, "selected", "");
                } else {
                    self.remove_attribute(option, "selected");
                }
            }
        }
    }

    /// Set an attribute on an element.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(Node {
            data: NodeData::Element(el),
            ..
        }) = self.nodes.get_mut(id.0)
        {
            el.set_attr(name, value);
        }
    }

    /// Remove an attribute from an element.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(Node {
            data: NodeData::Element(el),
            ..
        }) = self.nodes.get_mut(id.0)
        {
            el.remove_attr(name);
        }
    }

    // ── Visibility and geometry ─────────────────────────────────────

    /// Whether the element itself is hidden, ignoring ancestors.
    pub(crate) fn is_self_hidden(&self, id: NodeId) -> bool {
        let Some(el) = self.element(id) else {
            return false;
        };
        if NON_RENDERED_TAGS.contains(&el.tag()) || el.has_attr("hidden") {
            return true;
        }
        if el.tag() == "input" && el.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden")) {
            return true;
        }
        el.attr("style").is_some_and(|style| {
            let style: String = style
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            style.contains("display:none") || style.contains("visibility:hidden")
        })
    }

    /// Whether the node or any ancestor is hidden.
    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.is_self_hidden(id) || self.ancestors(id).any(|a| self.is_self_hidden(a))
    }

    /// Compute geometry for every rendered element.
    pub fn layout(&self) -> Layout {
        Layout::compute(self)
    }

    /// Viewport-relative box of one element.
    pub fn client_rect(&self, id: NodeId) -> BoundingBox {
        self.layout().client_rect(id)
    }

    /// Pin an element's document-space box, replacing the flow layout.
    pub fn set_rect(&mut self, id: NodeId, rect: BoundingBox) {
        let _ = self.rect_overrides.insert(id, rect);
    }

    pub(crate) fn rect_override(&self, id: NodeId) -> Option<BoundingBox> {
        self.rect_overrides.get(&id).copied()
    }

    /// Current viewport.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Resize the viewport.
    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        self.viewport.width = width;
        self.viewport.height = height;
    }

    /// Scroll so `id` lands at `align`, clamped to the scrollable range.
    pub fn scroll_into_view(&mut self, id: NodeId, align: ScrollAlign) {
        let layout = self.layout();
        let rect = layout.document_rect(id);
        let vh = self.viewport.height;
        let target = match align {
            ScrollAlign::Start => rect.y,
            ScrollAlign::Center => rect.center_y() - vh / 2.0,
            ScrollAlign::End => rect.y + rect.height - vh,
        };
        let max = (layout.content_height() - vh).max(0.0);
        self.viewport.scroll_y = target.clamp(0.0, max);
    }

    // ── Events and tooltips ─────────────────────────────────────────

    /// Record an event on `target`, snapshotting its value.
    pub fn dispatch(&mut self, target: NodeId, kind: DomEventKind) {
        let value = self.value(target);
        self.events.push(DomEvent {
            target,
            kind,
            value,
        });
    }

    /// Every event dispatched so far.
    pub fn events(&self) -> &[DomEvent] {
        &self.events
    }

    /// Drain the event log.
    pub fn take_events(&mut self) -> Vec<DomEvent> {
        std::mem::take(&mut self.events)
    }

    /// Show a tooltip.
    pub fn show_tooltip(&mut self, label: &str, message: &str, anchor: Option<NodeId>) {
        self.tooltips.push(Tooltip {
            label: label.to_owned(),
            message: message.to_owned(),
            anchor,
        });
    }

    /// Tooltips shown so far.
    pub fn tooltips(&self) -> &[Tooltip] {
        &self.tooltips
    }

    // ── Location ────────────────────────────────────────────────────

    /// Current location.
    pub fn url(&self) -> &Url {
        &self.location
    }

    /// Current location as a string.
    pub fn href(&self) -> &str {
        self.location.as_str()
    }

    /// Document title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Replace the whole location.
    pub fn navigate(&mut self, href: &str) -> Result<()> {
        self.location = parse_url(href)?;
        self.viewport.scroll_y = 0.0;
        Ok(())
    }

    /// Replace only the path, keeping origin, query and fragment.
    pub fn set_path(&mut self, path: &str) -> Result<()> {
        if self.location.cannot_be_a_base() {
            return Err(DomError::Navigation {
                target: path.to_owned(),
                reason: format!("{} has no path to replace", self.location),
            });
        }
        self.location.set_path(path);
        self.viewport.scroll_y = 0.0;
        Ok(())
    }

    // ── Page scripts ────────────────────────────────────────────────

    /// Parse `html` and append it under `parent`. Returns the new top-level
    /// nodes.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        if self.node(parent).is_none() {
            return Vec::new();
        }
        let parsed = Html::parse_fragment(html);
        self.import(&parsed, parent, true)
    }

    /// Queue a mutation to apply once the page clock passes `delay` from now.
    pub fn schedule(&mut self, delay: Duration, mutation: PageMutation) {
        self.scheduled.push(Scheduled {
            due: self.elapsed.saturating_add(delay),
            mutation,
        });
    }

    /// Move the page clock forward, applying due mutations in due order.
    /// Returns how many were applied.
    pub fn advance(&mut self, by: Duration) -> usize {
        self.elapsed = self.elapsed.saturating_add(by);
        let now = self.elapsed;
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.scheduled)
            .into_iter()
            .partition(|s| s.due <= now);
        self.scheduled = pending;
        due.sort_by_key(|s| s.due);
        let applied = due.len();
        for s in due {
            self.apply(s.mutation);
        }
        applied
    }

    /// Time the page clock has advanced since parsing.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    fn apply(&mut self, mutation: PageMutation) {
        match mutation {
            PageMutation::SetText { node, text } => {
                if !self.is_element(node) {
                    return;
                }
                let old = self
                    .nodes
                    .get_mut(node.0)
                    .map(|n| std::mem::take(&mut n.children))
                    .unwrap_or_default();
                for child in old {
                    if let Some(c) = self.nodes.get_mut(child.0) {
                        c.parent = None;
                    }
                }
                let _ = self.push_node(NodeData::Text(text), node);
            }
            PageMutation::AppendHtml { parent, html } => {
                let _ = self.append_html(parent, &html);
            }
            PageMutation::SetAttribute { node, name, value } => {
                self.set_attribute(node, &name, &value);
            }
            PageMutation::RemoveAttribute { node, name } => {
                self.remove_attribute(node, &name);
            }
        }
    }
}

/// Pre-order traversal below a node.
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| DomError::InvalidUrl {
        url: url.to_owned(),
        reason: e.to_string(),
    })
}

fn extract_title(doc: &Html) -> String {
    Selector::parse("title")
        .ok()
        .and_then(|s| doc.select(&s).next())
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn doc(html: &str) -> Document {
        Document::parse(html, "https://app.test/dashboard?tab=1").unwrap()
    }

    fn by_id(d: &Document, id: &str) -> NodeId {
        d.get_element_by_id(id).unwrap()
    }

    #[test]
    fn parses_title_and_body() {
        let d = doc("<html><head><title> My  App </title></head><body><p>hi</p></body></html>");
        assert_eq!(d.title(), "My App");
        assert_eq!(d.body().and_then(|b| d.tag(b)), Some("body"));
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert_matches!(
            Document::parse("<p></p>", "not a url"),
            Err(DomError::InvalidUrl { url, .. }) if url == "not a url"
        );
    }

    #[test]
    fn elements_are_in_document_order() {
        let d = doc(r#"<body><div id="a"><span id="b"></span></div><p id="c"></p></body>"#);
        let ids: Vec<_> = d
            .elements()
            .filter_map(|n| d.attr(n, "id").map(str::to_owned))
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn text_content_skips_scripts_and_collapses() {
        let d = doc("<body><div id=\"x\">Hello\n   <b>world</b><script>var a;</script></div></body>");
        assert_eq!(d.text_content(by_id(&d, "x")), "Hello world");
    }

    #[test]
    fn input_value_defaults_to_attribute() {
        let mut d = doc(r#"<body><input id="q" value="start"></body>"#);
        let q = by_id(&d, "q");
        assert_eq!(d.value(q).as_deref(), Some("start"));
        d.set_value(q, "next");
        assert_eq!(d.value(q).as_deref(), Some("next"));
    }

    #[test]
    fn select_value_tracks_selected_option() {
        let mut d = doc(
            r#"<body><select id="s"><option value="a">A</option><option selected>Beta</option></select></body>"#,
        );
        let s = by_id(&d, "s");
        assert_eq!(d.value(s).as_deref(), Some("Beta"));
        d.set_value(s, "a");
        assert_eq!(d.value(s).as_deref(), Some("a"));
        let selected: Vec<_> = d
            .elements_under(s)
            .filter(|&o| d.attr(o, "selected").is_some())
            .map(|o| d.option_value(o))
            .collect();
        assert_eq!(selected, vec!["a"]);
    }

    #[test]
    fn non_controls_have_no_value() {
        let d = doc(r#"<body><div id="d">x</div></body>"#);
        assert_eq!(d.value(by_id(&d, "d")), None);
    }

    #[test]
    fn hidden_is_inherited() {
        let d = doc(
            r#"<body><div style="display: none"><button id="b">x</button></div><input id="h" type="hidden"><p id="v">v</p></body>"#,
        );
        assert!(d.is_hidden(by_id(&d, "b")));
        assert!(d.is_hidden(by_id(&d, "h")));
        assert!(!d.is_hidden(by_id(&d, "v")));
    }

    #[test]
    fn labels_for_explicit_and_wrapping() {
        let d = doc(
            r#"<body><label id="l1" for="e">Email</label><label id="l2">Name <input id="n"></label><input id="e"></body>"#,
        );
        assert_eq!(d.labels_for(by_id(&d, "e")), vec![by_id(&d, "l1")]);
        assert_eq!(d.labels_for(by_id(&d, "n")), vec![by_id(&d, "l2")]);
        assert_eq!(d.labeled_control(by_id(&d, "l1")), Some(by_id(&d, "e")));
        assert_eq!(d.labeled_control(by_id(&d, "l2")), Some(by_id(&d, "n")));
    }

    #[test]
    fn navigate_and_set_path() {
        let mut d = doc("<body></body>");
        d.set_path("/settings").unwrap();
        assert_eq!(d.href(), "https://app.test/settings?tab=1");
        d.navigate("http://other.test/x").unwrap();
        assert_eq!(d.href(), "http://other.test/x");
        assert!(d.navigate("nope").is_err());
    }

    #[test]
    fn set_path_fails_without_hierarchical_url() {
        let mut d = Document::parse("<body></body>", "about:blank").unwrap();
        assert_matches!(d.set_path("/x"), Err(DomError::Navigation { .. }));
    }

    #[test]
    fn dispatch_snapshots_value() {
        let mut d = doc(r#"<body><input id="q"></body>"#);
        let q = by_id(&d, "q");
        d.set_value(q, "ab");
        d.dispatch(q, DomEventKind::Input);
        assert_eq!(d.events()[0].value.as_deref(), Some("ab"));
        assert_eq!(d.take_events().len(), 1);
        assert!(d.events().is_empty());
    }

    #[test]
    fn scheduled_mutations_apply_when_due() {
        let mut d = doc(r#"<body><div id="list"></div><button id="b">Loading</button></body>"#);
        let list = by_id(&d, "list");
        let b = by_id(&d, "b");
        d.schedule(
            Duration::from_millis(300),
            PageMutation::AppendHtml {
                parent: list,
                html: r#"<a id="late" href="/x">Continue</a>"#.into(),
            },
        );
        d.schedule(
            Duration::from_millis(100),
            PageMutation::SetText {
                node: b,
                text: "Ready".into(),
            },
        );
        assert_eq!(d.advance(Duration::from_millis(150)), 1);
        assert_eq!(d.text_content(b), "Ready");
        assert!(d.get_element_by_id("late").is_none());
        assert_eq!(d.advance(Duration::from_millis(150)), 1);
        let late = by_id(&d, "late");
        assert!(d.contains(list, late));
        assert_eq!(d.elapsed(), Duration::from_millis(300));
    }

    #[test]
    fn append_html_unwraps_fragment() {
        let mut d = doc(r#"<body><ul id="u"></ul></body>"#);
        let u = by_id(&d, "u");
        let added = d.append_html(u, "<li>one</li><li>two</li>");
        assert_eq!(added.len(), 2);
        assert!(added.iter().all(|&n| d.tag(n) == Some("li") && d.parent(n) == Some(u)));
    }

    #[test]
    fn scroll_align_from_position() {
        assert_eq!(ScrollAlign::from_position(Some("top")), ScrollAlign::Start);
        assert_eq!(ScrollAlign::from_position(Some("bottom")), ScrollAlign::End);
        assert_eq!(ScrollAlign::from_position(None), ScrollAlign::Center);
    }
}
