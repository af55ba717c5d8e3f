//! # rafael-stream
//!
//! Client side of a run's progress stream.
//!
//! - [`sse`]: frame parser over a chunked byte stream, plus the matching encoder
//! - [`source`]: the [`StreamSource`] seam and its `reqwest` implementation
//! - [`client`]: [`RealtimeClient`], a reconnecting subscriber with a
//!   bounded exponential backoff, typed and catch-all handlers and an
//!   observable [`ConnectionState`]

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod source;
pub mod sse;

pub use client::{Channel, ConnectionState, HandlerId, RealtimeClient};
pub use errors::{Result, TransportError};
pub use source::{ByteStream, HttpStreamSource, StreamRequest, StreamSource};
