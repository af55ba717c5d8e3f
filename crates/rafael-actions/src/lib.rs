//! # rafael-actions
//!
//! Turns a backend tool call into an effect on the page.
//!
//! - **Resolution**: [`strategy::Strategy`] lookups composed into ordered
//!   cascades ([`strategy::CLICKABLE`], [`strategy::FILLABLE`]); the first
//!   strategy that finds an acceptable node wins
//! - **Execution**: [`ActionExecutor`] owns the [`Document`](rafael_dom::Document)
//!   and applies click, fill, select, navigate, scroll, wait, read and tooltip
//!   actions, reporting every expected failure as an
//!   [`ActionResult`](rafael_core::tools::ActionResult)

#![deny(unsafe_code)]

pub mod errors;
pub mod executor;
pub mod strategy;

pub use errors::{ExecutorError, Result};
pub use executor::ActionExecutor;
pub use strategy::{Resolution, Strategy, resolve};
