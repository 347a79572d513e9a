//! Side-effecting operations: filesystem state, subprocesses, git, retrieval.

pub mod activity_log;
pub mod config;
pub mod flow_store;
pub mod git;
pub mod init;
pub mod json_file;
pub mod kv_store;
pub mod memory_log;
pub mod process;
pub mod prompt;
pub mod retrieval;
pub mod task_store;
