//! Deterministic, pure logic shared by the agent core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod message;
pub mod outcome;
pub mod rules;
pub mod task;
pub mod tick;
