//! Git adapter for the git capabilities and flows.
//!
//! A small, explicit wrapper around `git` subprocess calls. A non-zero exit
//! surfaces as [`GitCommandError`] so callers can report the captured output.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// A git invocation that exited non-zero.
#[derive(Debug, Error)]
#[error("git {command} failed: {output}")]
pub struct GitCommandError {
    pub command: String,
    pub output: String,
}

/// Result of `git commit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(String),
    NothingToCommit,
}

/// Wrapper for executing git commands in a repository root.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Open the repository rooted exactly at `folder` (must contain `.git`).
    pub fn open(folder: &Path) -> Result<Self> {
        if !folder.join(".git").exists() {
            return Err(anyhow!("no git repository found at {}", folder.display()));
        }
        Ok(Self::new(folder))
    }

    /// Open the nearest repository containing `start` (walking up parents).
    pub fn discover(start: &Path) -> Result<Self> {
        let mut current = if start.is_dir() {
            start
        } else {
            start.parent().unwrap_or(start)
        };
        loop {
            if current.join(".git").exists() {
                debug!(root = %current.display(), "discovered repository");
                return Ok(Self::new(current));
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => {
                    return Err(anyhow!(
                        "no git repository found for path {}",
                        start.display()
                    ));
                }
            }
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Return the current branch name (errors on detached HEAD).
    #[instrument(skip_all)]
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD"));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    /// Stage the given paths (relative to the repository root).
    pub fn add(&self, paths: &[String]) -> Result<()> {
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run_checked(&args)?;
        Ok(())
    }

    /// Commit staged changes with a message.
    #[instrument(skip_all)]
    pub fn commit(&self, message: &str) -> Result<CommitOutcome> {
        let output = self.run(&["commit", "-m", message])?;
        if output.status.success() {
            return Ok(CommitOutcome::Committed(stdout_of(&output)));
        }
        let err = error_of(&output);
        if err.to_lowercase().contains("nothing to commit") {
            debug!("nothing to commit");
            return Ok(CommitOutcome::NothingToCommit);
        }
        Err(GitCommandError {
            command: "commit".to_string(),
            output: err,
        }
        .into())
    }

    #[instrument(skip_all)]
    pub fn push(&self) -> Result<String> {
        self.run_capture(&["push"])
    }

    #[instrument(skip_all, fields(rebase))]
    pub fn pull(&self, rebase: bool) -> Result<String> {
        if rebase {
            self.run_capture(&["pull", "--rebase"])
        } else {
            self.run_capture(&["pull"])
        }
    }

    pub fn fetch(&self) -> Result<()> {
        self.run_checked(&["fetch"])?;
        Ok(())
    }

    /// Diff the worktree against `reference` without color.
    pub fn diff_against(&self, reference: &str) -> Result<String> {
        self.run_capture(&["diff", "--no-color", reference])
    }

    /// Create and checkout a new branch at current HEAD.
    #[instrument(skip_all, fields(branch))]
    pub fn checkout_new_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "creating and checking out new branch");
        self.run_checked(&["checkout", "-b", branch])?;
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(stdout_of(&output))
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(GitCommandError {
                command: args.join(" "),
                output: error_of(&output),
            }
            .into());
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn error_of(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        stdout_of(output)
    } else {
        stderr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn open_requires_git_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = Git::open(temp.path()).unwrap_err();
        assert!(err.to_string().contains("no git repository"));

        fs::create_dir(temp.path().join(".git")).expect("mkdir .git");
        assert!(Git::open(temp.path()).is_ok());
    }

    #[test]
    fn discover_walks_up_from_nested_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join(".git")).expect("mkdir .git");
        let nested = temp.path().join("a/b");
        fs::create_dir_all(&nested).expect("mkdir nested");
        let file = nested.join("c.txt");
        fs::write(&file, "x").expect("write");

        let git = Git::discover(&file).expect("discover");
        assert_eq!(git.workdir(), temp.path());
    }

    #[test]
    fn command_error_carries_output() {
        let err = GitCommandError {
            command: "push".to_string(),
            output: "rejected".to_string(),
        };
        assert_eq!(err.to_string(), "git push failed: rejected");
    }
}
