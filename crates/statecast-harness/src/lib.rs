#![forbid(unsafe_code)]

//! Harness: fixtures and recorders for statecast tests.
//!
//! # Role in statecast
//! `statecast-harness` is test support only. [`EventRecorder`] captures the
//! observable steps of the propagation protocol (local notify, handler,
//! root broadcast) into one ordered log; [`fixtures`] builds the canonical
//! trees the integration and property tests run against.

pub mod fixtures;
pub mod recorder;

pub use fixtures::{DocumentFixture, Schemas, chain, fan};
pub use recorder::{EventRecorder, Recorded};
