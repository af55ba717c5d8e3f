//! # rafael-core
//!
//! Foundation types and utilities shared by every Rafael crate.
//!
//! - **Page snapshot**: [`page::SemanticElement`] and [`page::SemanticTree`], the
//!   backend's privacy-scrubbed view of a page
//! - **Tools**: the closed [`tools::BrowserTool`] vocabulary, [`tools::ToolCall`],
//!   typed [`tools::ToolParams`] and the reported [`tools::ActionResult`]
//! - **Runs**: [`agent::AgentStep`], [`agent::AgentResult`] and the request-layer
//!   boundary types
//! - **Routing**: [`routing::ModelRoute`] and the backend variants
//! - **Stream events**: [`events::StreamEvent`] wire format with a typed payload view
//! - **Branded IDs**, an injectable [`clock::Clock`], a TTL [`cache::TtlCache`],
//!   reconnect [`retry::BackoffPolicy`] and `tracing` setup in [`logging`]

#![deny(unsafe_code)]

pub mod agent;
pub mod cache;
pub mod clock;
pub mod constants;
pub mod events;
pub mod ids;
pub mod logging;
pub mod page;
pub mod retry;
pub mod routing;
pub mod text;
pub mod tools;
