//! Test harness for the pagewatch crates.
//!
//! Provides scriptable test doubles for the external collaborators --
//! the browser debugging session and the screenshot sink -- plus canned
//! wire-event fixtures for every supported protocol generation. Nothing
//! here talks to a real browser; tests drive the full telemetry path by
//! injecting events into a [`MockSession`].

pub mod fixtures;
pub mod mocks;

pub use mocks::{MockScreenshots, MockSession, MockSessionBuilder};
