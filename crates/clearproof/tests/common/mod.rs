//! Shared test utilities for clearproof integration tests.
//!
//! This module provides:
//! - `TestHarness` with an in-memory database, a temp storage root and
//!   scripted providers
//! - Builders for submissions, reviews and feature rows

pub mod builders;
pub mod harness;
pub mod providers;

pub use builders::*;
pub use harness::TestHarness;
pub use providers::{Reply, ScriptedText, ScriptedVision, TextMode};
