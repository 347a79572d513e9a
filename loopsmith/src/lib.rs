//! Autonomous task agent driving an OpenAI-compatible chat model.
//!
//! The agent works through a persisted task list one step at a time. Every
//! step goes through a two-phase prompt protocol and at most one function
//! call, dispatched against a fixed registry of local capabilities. The
//! architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (messages, task cursor, tick
//!   planning, failure tagging). No I/O.
//! - **[`io`]**: Side-effecting operations (state files, git, subprocesses,
//!   retrieval, prompt templates).
//! - **[`provider`]** and **[`tools`]**: the two trait seams, chat endpoints
//!   and capabilities, each with a test double in [`test_support`].
//!
//! Orchestration modules ([`orchestrator`], [`session`], [`scheduler`],
//! [`flow`], [`report`]) wire them together for the CLI commands.

pub mod core;
pub mod exit_codes;
pub mod flow;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod provider;
pub mod report;
pub mod scheduler;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
