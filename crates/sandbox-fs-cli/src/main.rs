//! # sandbox-fs CLI
//!
//! Runs shell commands with the `sandbox_fs` library preloaded, and answers
//! what the library would decide for a given path.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

mod check;
mod env;
mod profile;
mod runner;

use profile::{Overrides, SandboxProfile};

/// Exit status when the command hit its timeout, as timeout(1) reports it.
const EXIT_TIMED_OUT: u8 = 124;

/// Filesystem sandbox launcher for the sandbox_fs LD_PRELOAD library
#[derive(Parser)]
#[command(name = "sandbox-fs")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML profile with a [sandbox] section
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct BlockArgs {
    /// Blocked path prefix (repeatable, replaces the configured list)
    #[arg(long = "blocked", value_name = "PATH")]
    blocked: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a shell command under the sandbox
    Run {
        #[command(flatten)]
        block: BlockArgs,

        /// Path to the sandbox_fs shared library
        #[arg(long, value_name = "FILE")]
        library: Option<PathBuf>,

        /// Print one line per decision from inside the sandbox
        #[arg(long)]
        debug: bool,

        /// Kill the command after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Working directory of the command
        #[arg(long, value_name = "DIR")]
        workdir: Option<PathBuf>,

        /// Extra environment variable (repeatable)
        #[arg(long = "env", value_name = "KEY=VALUE", value_parser = env::parse_env_pair)]
        env: Vec<(String, String)>,

        /// Print the outcome as JSON instead of replaying the output
        #[arg(long)]
        json: bool,

        /// One shell script, or a program and its arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Show the verdict for each path without running anything
    Check {
        #[command(flatten)]
        block: BlockArgs,

        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SANDBOX_LOG")
                .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut profile = SandboxProfile::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Check { block, paths } => {
            profile.apply_overrides(Overrides {
                blocked_paths: block.blocked,
                ..Default::default()
            });
            cmd_check(&profile, &paths)
        }
        Commands::Run {
            block,
            library,
            debug,
            timeout,
            workdir,
            env,
            json,
            command,
        } => {
            profile.apply_overrides(Overrides {
                blocked_paths: block.blocked,
                library_path: library,
                debug,
                timeout_secs: timeout,
                working_dir: workdir,
            });
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            rt.block_on(cmd_run(&profile, &runner::shell_command(&command), &env, json))
        }
    }
}

fn cmd_check(profile: &SandboxProfile, paths: &[PathBuf]) -> Result<ExitCode> {
    let decisions = check::check_paths(profile, paths)?;
    let mut stdout = std::io::stdout().lock();
    for (path, decision) in paths.iter().zip(&decisions) {
        writeln!(stdout, "{}", check::render(path, decision))?;
    }
    if decisions.iter().any(|d| d.is_denied()) {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_run(
    profile: &SandboxProfile,
    command: &str,
    extra_env: &[(String, String)],
    json: bool,
) -> Result<ExitCode> {
    let env = env::build_sandbox_env(std::env::vars_os(), profile, extra_env)?;
    let outcome = runner::run_sandboxed(command, profile, &env)
        .await
        .context("sandboxed command was not run")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        std::io::stdout().write_all(outcome.stdout.as_bytes())?;
        std::io::stderr().write_all(outcome.stderr.as_bytes())?;
        if let Some(error) = &outcome.error {
            eprintln!("sandbox-fs: {}", error);
        }
    }

    if outcome.timed_out {
        return Ok(ExitCode::from(EXIT_TIMED_OUT));
    }
    Ok(ExitCode::from(outcome.return_code.clamp(0, 255) as u8))
}
