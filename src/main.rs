//! `ptyd` CLI front-end: argument parsing and subcommand dispatch only.
//! The wire schema, the daemon lifecycle, and the control file all live in
//! the library; this binary just parses args and calls into it.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ptyd::codec::{Action, Request};
use ptyd::config::SessionConfig;
use ptyd::{client, daemon, keys};

const DEFAULT_COLS: u16 = 120;
const DEFAULT_ROWS: u16 = 40;

#[derive(Parser)]
#[command(name = "ptyd", version)]
struct Cli {
    /// Control file path.
    #[arg(short = 'S', long = "socket", global = true)]
    socket: Option<PathBuf>,

    /// Accepted and ignored: UTF-8 is always on.
    #[arg(short = 'u', global = true)]
    _utf8: bool,

    /// Re-exec hook: this invocation *is* the session daemon, spawned
    /// detached by a prior `new-session` invocation.
    #[arg(long = "internal-serve", hide = true, global = true)]
    internal_serve: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    NewSession {
        #[arg(short = 'd')]
        detach: bool,
        #[arg(short = 's')]
        name: String,
        #[arg(short = 'c')]
        dir: Option<PathBuf>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        cmd: Vec<String>,
    },
    SendKeys {
        #[arg(short = 't')]
        target: Option<String>,
        #[arg(short = 'l')]
        literal: bool,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        keys: Vec<String>,
    },
    CapturePane {
        #[arg(short = 'p')]
        print: bool,
        #[arg(short = 'J')]
        join: bool,
        #[arg(short = 'a')]
        alternate: bool,
        #[arg(short = 't')]
        target: Option<String>,
        #[arg(short = 'N', default_value_t = 50)]
        lines: usize,
    },
    HasSession {
        #[arg(short = 't')]
        target: Option<String>,
    },
    KillSession {
        #[arg(short = 't')]
        target: Option<String>,
    },
    SetOption {
        #[arg(short = 't')]
        target: Option<String>,
        option: String,
        value: String,
    },
    PipePane {
        #[arg(short = 't')]
        target: Option<String>,
        shell_cmd: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        eprintln!("no subcommand given");
        std::process::exit(1);
    };

    if cli.internal_serve {
        return serve(command, cli.socket).await;
    }

    let code = dispatch(command, cli.socket).await?;
    std::process::exit(code);
}

/// This process is the detached daemon: build the session config and run
/// it to completion. Only reachable via `--internal-serve`.
async fn serve(command: Commands, socket: Option<PathBuf>) -> Result<()> {
    let Commands::NewSession { name, dir, cmd, .. } = command else {
        anyhow::bail!("--internal-serve only supports new-session");
    };
    let socket_path = socket.context("-S PATH is required")?;

    let config = SessionConfig {
        socket_path,
        session_name: name,
        working_dir: dir.unwrap_or_else(|| PathBuf::from(".")),
        command: cmd,
        cols: DEFAULT_COLS,
        rows: DEFAULT_ROWS,
    };

    daemon::run(config).await.context("session daemon failed")
}

/// Every other invocation: resolve the control file path, build a request,
/// and either talk to the daemon or (for `new-session`) spawn it detached.
async fn dispatch(command: Commands, socket: Option<PathBuf>) -> Result<i32> {
    let Some(socket_path) = socket else {
        eprintln!("-S PATH is required");
        return Ok(1);
    };

    if let Commands::NewSession { detach: _, name, dir, cmd } = command {
        return Ok(spawn_detached(&socket_path, &name, dir.as_deref(), &cmd));
    }

    let code = match command {
        Commands::NewSession { .. } => unreachable!("handled above"),
        Commands::SendKeys { target: _, literal, keys: tokens } => send_keys(&socket_path, literal, &tokens).await,
        Commands::CapturePane { print: _, join, alternate, target: _, lines } => {
            let request = Request {
                action: Some(Action::CapturePane),
                lines: Some(lines),
                alternate: Some(alternate),
                join: Some(join),
                ..Default::default()
            };
            client::run(&socket_path, Action::CapturePane, request).await
        }
        Commands::HasSession { target: _ } => {
            let request = Request { action: Some(Action::HasSession), ..Default::default() };
            client::run(&socket_path, Action::HasSession, request).await
        }
        Commands::KillSession { target: _ } => {
            let request = Request { action: Some(Action::KillSession), ..Default::default() };
            client::run(&socket_path, Action::KillSession, request).await
        }
        Commands::SetOption { target: _, option, value } => {
            let request = Request {
                action: Some(Action::SetOption),
                option: Some(option),
                value: Some(value),
                ..Default::default()
            };
            client::run(&socket_path, Action::SetOption, request).await
        }
        Commands::PipePane { target: _, shell_cmd } => {
            let request = Request { action: Some(Action::PipePane), shell_cmd: Some(shell_cmd), ..Default::default() };
            client::run(&socket_path, Action::PipePane, request).await
        }
    };
    Ok(code)
}

/// `-l`: join tokens with spaces, send as one literal `send_keys`.
/// Otherwise: per token, a named key goes through `send_key`; anything
/// else is sent as literal text.
async fn send_keys(socket_path: &std::path::Path, literal: bool, tokens: &[String]) -> i32 {
    if literal {
        let request = Request {
            action: Some(Action::SendKeys),
            text: Some(tokens.join(" ")),
            literal: Some(true),
            ..Default::default()
        };
        return client::run(socket_path, Action::SendKeys, request).await;
    }

    for token in tokens {
        let (action, request) = if keys::translate(token).is_ok() {
            (Action::SendKey, Request { action: Some(Action::SendKey), key: Some(token.clone()), ..Default::default() })
        } else {
            (Action::SendKeys, Request { action: Some(Action::SendKeys), text: Some(token.clone()), ..Default::default() })
        };
        let code = client::run(socket_path, action, request).await;
        if code != 0 {
            return code;
        }
    }
    0
}

fn spawn_detached(socket_path: &std::path::Path, name: &str, dir: Option<&std::path::Path>, cmd: &[String]) -> i32 {
    let Ok(exe) = std::env::current_exe() else {
        eprintln!("could not resolve own executable path");
        return 1;
    };

    let mut child = Command::new(exe);
    child.arg("--internal-serve").arg("-S").arg(socket_path);
    child.arg("new-session").arg("-d").arg("-s").arg(name);
    if let Some(dir) = dir {
        child.arg("-c").arg(dir);
    }
    child.args(cmd);
    child.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

    match child.spawn() {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("failed to start session daemon: {}", e);
            1
        }
    }
}
