//! # rafael-dom
//!
//! The page every other Rafael component operates on.
//!
//! - [`Document`]: an arena of nodes parsed from HTML with `scraper`, holding
//!   live form values, the current location, a scrollable [`Viewport`], the
//!   log of dispatched [`DomEvent`]s and displayed [`Tooltip`]s
//! - [`layout`]: block-flow geometry approximating `getBoundingClientRect`,
//!   overridable per node
//! - [`Distiller`]: turns a document into a bounded, privacy-scrubbed
//!   [`SemanticTree`](rafael_core::page::SemanticTree)
//! - [`pii`]: the denylist that keeps sensitive fields out of every capture

#![deny(unsafe_code)]

pub mod distiller;
pub mod document;
pub mod errors;
pub mod layout;
pub mod pii;
pub mod render;

pub use distiller::Distiller;
pub use document::{
    Document, DomEvent, DomEventKind, ElementData, NodeId, PageMutation, ScrollAlign, Tooltip,
    Viewport,
};
pub use errors::{DomError, Result};
pub use layout::Layout;
