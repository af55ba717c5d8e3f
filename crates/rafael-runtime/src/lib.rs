//! # rafael-runtime
//!
//! Runs a goal to completion.
//!
//! - **Loop**: [`RafaelAgent`] routes each step to a backend variant
//!   ([`router`]), builds prompts ([`prompts`]), parses the tool call
//!   ([`parse`]) and dispatches it through a [`ToolDispatcher`]
//! - **Backends**: the [`Backend`] seam with HTTP and scripted implementations
//! - **Relay**: [`EventRelay`] indexes and fans out a run's events;
//!   [`RelayHub`] serves them to stream clients in-process
//! - **People**: [`InterventionService`] for `ask_user`
//! - **Admission**: [`RunLauncher`] validates requests and issues stream tokens

#![deny(unsafe_code)]

pub mod agent;
pub mod backend;
pub mod dispatch;
pub mod errors;
pub mod hub;
pub mod interventions;
pub mod launcher;
pub mod parse;
pub mod prompts;
pub mod relay;
pub mod router;

pub use agent::RafaelAgent;
pub use backend::{Backend, BackendResponse, HttpBackend, ScriptedBackend};
pub use dispatch::{HumanChannel, LocalDispatcher, RelayDispatcher, ToolDispatcher};
pub use errors::{BackendError, InterventionError, LaunchError, Result, RuntimeError};
pub use hub::RelayHub;
pub use interventions::{HolMode, Intervention, InterventionService, InterventionStatus};
pub use launcher::{Launch, RunLauncher};
pub use relay::EventRelay;
pub use router::ModelRouter;
