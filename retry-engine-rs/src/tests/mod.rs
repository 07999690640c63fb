//! Scenario tests for retry sessions
//!
//! These drive whole sessions through the public API with a paused clock.

pub mod predicate_tests;
