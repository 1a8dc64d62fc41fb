//! Common test utilities module
//!
//! Provides scratch directories used as temp roots so that integration tests
//! never touch each other's files.

#![allow(dead_code)]

pub mod test_utils;

pub use test_utils::{count_entries, scratch_root, seeded_generator, ScratchRoot};
