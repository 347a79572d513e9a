//! Git capabilities. Each one opens the repository named by `folder_path`.

use serde_json::{Value, json};
use tracing::instrument;

use super::{
    Capability, DispatchError, ToolContext, ToolOutput, optional_bool, optional_str, required_str,
};
use crate::core::message::ArgMap;
use crate::io::git::{CommitOutcome, Git};

fn folder_schema(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

fn open_repo(ctx: &ToolContext, args: &ArgMap) -> Result<Git, DispatchError> {
    let folder = match optional_str(args, "folder_path")? {
        Some(raw) => ctx.resolve(raw),
        None => ctx.root.clone(),
    };
    Ok(Git::open(&folder)?)
}

macro_rules! git_capability {
    ($ty:ident) => {
        pub struct $ty {
            ctx: ToolContext,
        }

        impl $ty {
            pub fn new(ctx: &ToolContext) -> Self {
                Self { ctx: ctx.clone() }
            }
        }
    };
}

git_capability!(GitAdd);
git_capability!(GitCommit);
git_capability!(GitPush);
git_capability!(GitPull);
git_capability!(GitDiff);
git_capability!(CreateGitBranch);

impl Capability for GitAdd {
    fn name(&self) -> &str {
        "git_add"
    }

    fn description(&self) -> &str {
        "Stage changes for commit: everything under folder_path, or only the listed paths"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "folder_path": folder_schema("Path of the folder to stage changes"),
                "paths": {"type": "array", "items": {"type": "string"}}
            }
        })
    }

    #[instrument(skip_all)]
    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError> {
        let paths: Vec<String> = args
            .get("paths")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|p| self.ctx.resolve(p).display().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let git = match optional_str(args, "folder_path")? {
            Some(raw) => Git::open(&self.ctx.resolve(raw))?,
            None if !paths.is_empty() => Git::discover(&self.ctx.resolve(&paths[0]))?,
            None => {
                return Err(DispatchError::HandlerArgumentError(
                    "git_add needs folder_path or paths".to_string(),
                ));
            }
        };
        let targets = if paths.is_empty() {
            vec![".".to_string()]
        } else {
            paths
        };
        git.add(&targets)?;
        Ok(ToolOutput::Text(format!(
            "✅ Staged {} in repo '{}'",
            targets.join(", "),
            git.workdir().display()
        )))
    }
}

impl Capability for GitCommit {
    fn name(&self) -> &str {
        "git_commit"
    }

    fn description(&self) -> &str {
        "Commit staged changes to the local git repository"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "commit_message": {"type": "string", "description": "Commit message for the changes"},
                "folder_path": folder_schema("The folder path to commit changes from")
            },
            "required": ["commit_message"]
        })
    }

    #[instrument(skip_all)]
    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError> {
        let message = required_str(args, "commit_message")?;
        let git = open_repo(&self.ctx, args)?;
        let text = match git.commit(message)? {
            CommitOutcome::Committed(out) => {
                let summary = if out.is_empty() { message } else { out.as_str() };
                format!("✅ Commit successful in {}: {summary}", git.workdir().display())
            }
            CommitOutcome::NothingToCommit => format!(
                "ℹ️ Nothing to commit in {}: working tree clean",
                git.workdir().display()
            ),
        };
        Ok(ToolOutput::Text(text))
    }
}

impl Capability for GitPush {
    fn name(&self) -> &str {
        "git_push"
    }

    fn description(&self) -> &str {
        "Push the current branch of the repository at folder_path"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"folder_path": folder_schema("The folder path to push changes from")},
            "required": ["folder_path"]
        })
    }

    #[instrument(skip_all)]
    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError> {
        let git = open_repo(&self.ctx, args)?;
        let out = git.push()?;
        Ok(ToolOutput::Text(format!(
            "✅ Push successful in {}: {out}",
            git.workdir().display()
        )))
    }
}

impl Capability for GitPull {
    fn name(&self) -> &str {
        "git_pull"
    }

    fn description(&self) -> &str {
        "Pull (optionally with rebase) into the repository at folder_path"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "folder_path": folder_schema("Path of the Git repository"),
                "rebase": {"type": "boolean", "description": "Use --rebase"}
            },
            "required": ["folder_path"]
        })
    }

    #[instrument(skip_all)]
    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError> {
        let rebase = optional_bool(args, "rebase")?.unwrap_or(false);
        let git = open_repo(&self.ctx, args)?;
        let out = git.pull(rebase)?;
        Ok(ToolOutput::Text(format!(
            "✅ Pull successful in {}{}: {out}",
            git.workdir().display(),
            if rebase { " with rebase" } else { "" }
        )))
    }
}

impl Capability for GitDiff {
    fn name(&self) -> &str {
        "git_diff"
    }

    fn description(&self) -> &str {
        "Show git diff between local changes and the remote HEAD for the current branch"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"folder_path": folder_schema("Path of the Git repository to diff")},
            "required": ["folder_path"]
        })
    }

    #[instrument(skip_all)]
    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError> {
        let git = open_repo(&self.ctx, args)?;
        git.fetch()?;
        let branch = git.current_branch()?;
        let diff = git.diff_against(&format!("origin/{branch}"))?;
        if diff.is_empty() {
            return Ok(ToolOutput::Text(format!(
                "ℹ️ No differences between local '{branch}' and 'origin/{branch}'"
            )));
        }
        Ok(ToolOutput::Text(format!("✅ Diff for branch '{branch}':\n{diff}")))
    }
}

impl Capability for CreateGitBranch {
    fn name(&self) -> &str {
        "create_git_branch"
    }

    fn description(&self) -> &str {
        "Create a new branch at HEAD and switch to it"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "folder_path": folder_schema("Path of the Git repository"),
                "branch_name": {"type": "string", "description": "The name of the new branch to create"}
            },
            "required": ["folder_path", "branch_name"]
        })
    }

    #[instrument(skip_all)]
    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError> {
        let branch = required_str(args, "branch_name")?;
        let git = open_repo(&self.ctx, args)?;
        let previous = git.current_branch()?;
        git.checkout_new_branch(branch)?;
        let now = git.current_branch()?;
        if now != branch {
            return Err(DispatchError::HandlerExecutionError(format!(
                "expected to be on '{branch}' after checkout, found '{now}'"
            )));
        }
        Ok(ToolOutput::Text(format!(
            "✅ Created and switched to branch '{branch}' (from '{previous}')"
        )))
    }
}
