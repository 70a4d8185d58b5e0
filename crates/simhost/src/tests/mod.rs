//! Tests for the simhost client against a scripted mock host
//!
//! Covers:
//! - Station lookup, item tree edits and stale handles
//! - Joint validation, moves and program instructions
//! - Joint lists: stop points, in-place rotation, singularity reporting
//! - App settings persistence with backup handling
//! - Filtered event subscriptions and motion cache invalidation
//! - The application run flag

// Test modules use exact float comparisons and test-specific casts
#![allow(clippy::float_cmp, clippy::cast_possible_truncation)]

mod client_tests;
mod event_tests;
mod fixtures;
mod program_tests;
