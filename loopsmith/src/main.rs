//! Autonomous task agent CLI.
//!
//! Works through `.loopsmith/tasks.json` one step at a time, asking an
//! OpenAI-compatible model for exactly one function call per step.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::info;

use loopsmith::exit_codes;
use loopsmith::flow;
use loopsmith::io::config::load_config_with_env;
use loopsmith::io::init::{AgentPaths, InitOptions, init_workspace};
use loopsmith::logging;
use loopsmith::report::{SelfReport, record_feedback};
use loopsmith::scheduler::{LoopConfig, TaskScheduler};
use loopsmith::session::{Session, SessionOptions};

#[derive(Parser)]
#[command(
    name = "loopsmith",
    version,
    about = "Autonomous task agent driven by an OpenAI-compatible model"
)]
struct Cli {
    /// Project root holding `.loopsmith/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// File whose contents are sent as a system message with every prompt.
    #[arg(short = 'c', long, global = true)]
    context_file: Option<PathBuf>,

    /// Keep session memory from the previous run instead of starting empty.
    #[arg(long, global = true)]
    keep_memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.loopsmith/` scaffolding.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Send one prompt through the validation phase only and print the reply.
    Prompt { text: String },
    /// Send one prompt through both phases, dispatching any function call.
    Run { text: String },
    /// Read prompts from stdin until `exit`.
    Chat,
    /// Work through the task list until interrupted.
    Loop {
        /// Seconds between ticks (defaults to `loop_interval_secs`).
        #[arg(short, long)]
        interval: Option<f64>,
        /// Stop after this many ticks.
        #[arg(long)]
        max_ticks: Option<u64>,
    },
    /// Append feedback for the agent to `.loopsmith/feedback.txt`.
    Feedback { text: String },
    /// Print the self-awareness report.
    Report,
    /// Manage named command flows.
    Flow {
        #[command(subcommand)]
        command: FlowCommand,
    },
}

#[derive(Subcommand)]
enum FlowCommand {
    /// Define a flow. Separate commands with a standalone `;`.
    Define {
        name: String,
        #[arg(last = true, required = true)]
        argv: Vec<String>,
    },
    /// Run a flow from the project root, stopping at the first failure.
    Run { name: String },
    /// List defined flows.
    List,
}

fn main() {
    logging::init();
    let code = match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::FAILURE
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let options = SessionOptions {
        keep_memory: cli.keep_memory,
        context_file: cli.context_file.clone(),
    };
    match cli.command {
        Command::Init { force } => cmd_init(&cli.root, force),
        Command::Prompt { text } => cmd_prompt(&cli.root, &options, &text),
        Command::Run { text } => cmd_run(&cli.root, &options, &text),
        Command::Chat => cmd_chat(&cli.root, &options),
        Command::Loop {
            interval,
            max_ticks,
        } => cmd_loop(&cli.root, &options, interval, max_ticks),
        Command::Feedback { text } => {
            record_feedback(&AgentPaths::new(&cli.root), &text)?;
            println!("[INFO] Feedback received.");
            Ok(exit_codes::OK)
        }
        Command::Report => {
            print!("{}", SelfReport::collect(&AgentPaths::new(&cli.root)).render());
            Ok(exit_codes::OK)
        }
        Command::Flow { command } => cmd_flow(&cli.root, command),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_workspace(root, &InitOptions { force })?;
    println!("initialized {}", paths.state_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_prompt(root: &Path, options: &SessionOptions, text: &str) -> Result<i32> {
    let session = Session::open(root, options)?;
    let reply = session.orchestrator().validate(text, session.context())?;
    if reply.function_call.is_some() {
        println!("⚠️ Function call skipped.");
    } else {
        println!("{}", reply.text());
    }
    session.close()?;
    Ok(exit_codes::OK)
}

fn cmd_run(root: &Path, options: &SessionOptions, text: &str) -> Result<i32> {
    let session = Session::open(root, options)?;
    let result = session.orchestrator().run(text, session.context())?;
    println!("{result}");
    session.close()?;
    Ok(exit_codes::OK)
}

fn cmd_chat(root: &Path, options: &SessionOptions) -> Result<i32> {
    let session = Session::open(root, options)?;
    let orchestrator = session.orchestrator();
    println!("loopsmith chat - type 'exit' to quit.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush().context("flush stdout")?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("read stdin")?;
        let prompt = line.trim();
        if matches!(prompt, "exit" | "quit") {
            break;
        }
        if prompt.is_empty() {
            continue;
        }
        match orchestrator.run(prompt, session.context()) {
            Ok(result) => println!("{result}"),
            Err(err) => println!("[!] Error: {err:#}"),
        }
    }
    println!("Goodbye!");
    session.close()?;
    Ok(exit_codes::OK)
}

fn cmd_loop(
    root: &Path,
    options: &SessionOptions,
    interval: Option<f64>,
    max_ticks: Option<u64>,
) -> Result<i32> {
    let session = Session::open(root, options)?;
    let secs = interval.unwrap_or(session.config().loop_interval_secs);
    let config = LoopConfig {
        interval: Duration::try_from_secs_f64(secs)
            .map_err(|_| anyhow!("interval must be a non-negative number of seconds"))?,
        max_ticks,
    };

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("install interrupt handler")?;

    let retriever = session.retriever();
    let mut scheduler = TaskScheduler::new(
        session.orchestrator(),
        &retriever,
        session.activity(),
        session.paths().tasks_path.clone(),
        session.context(),
    );
    info!(interval_secs = secs, ?max_ticks, "starting loop");
    println!("loopsmith loop - press Ctrl-C to stop.");
    scheduler.run_loop(&config, &stop, |result| match result {
        Ok(outcome) => {
            if let Some(text) = outcome.display_text() {
                println!("{text}");
            }
        }
        Err(err) => println!("[!] Loop error: {err:#}"),
    });
    println!("Goodbye!");
    session.close()?;
    Ok(exit_codes::OK)
}

fn cmd_flow(root: &Path, command: FlowCommand) -> Result<i32> {
    let paths = AgentPaths::new(root);
    match command {
        FlowCommand::Define { name, argv } => {
            let count = flow::define(&paths, &name, &argv)?;
            println!("defined flow '{name}' ({count} commands)");
        }
        FlowCommand::List => {
            for (name, commands) in flow::list(&paths) {
                let joined: Vec<String> = commands.iter().map(|argv| argv.join(" ")).collect();
                println!("{name}: {}", joined.join(" ; "));
            }
        }
        FlowCommand::Run { name } => {
            let limits = load_config_with_env(&paths.config_path)?.command_limits();
            let run = flow::run_flow(&paths, &name, limits)?;
            for step in &run.steps {
                println!("$ {}", step.argv.join(" "));
                let text = step.output.combined_text();
                if !text.is_empty() {
                    println!("{text}");
                }
            }
            if !run.success() {
                return Err(anyhow!(
                    "flow '{name}' failed ({} command(s) skipped)",
                    run.skipped
                ));
            }
        }
    }
    Ok(exit_codes::OK)
}
