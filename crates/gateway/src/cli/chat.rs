//! `agentrelay chat`: interactive REPL.
//!
//! Each line is one turn on a single session. `/attach <path>` queues a
//! file for the next message; Ctrl+C during a turn stops it.

use std::path::PathBuf;
use std::sync::Arc;

use ar_domain::config::Config;

use crate::bootstrap;
use crate::runtime::{Session, TurnInput, TurnOutcome};
use crate::state::AppState;
use crate::surface::{starters, ConsoleSurface};

pub async fn chat(config: Arc<Config>, session_key: String) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config).await?;
    let user = super::login_prompt(&state)?;
    let session = state.sessions.get_or_create(&session_key);

    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".agentrelay")
        .join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("agentrelay chat  |  signed in as {user}");
    eprintln!("Session: {session_key}  |  Type /help for commands, Ctrl+D to exit");
    eprintln!();

    let mut pending: Vec<PathBuf> = Vec::new();
    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    if handle_slash_command(trimmed, &state, &mut pending) {
                        break;
                    }
                    continue;
                }

                let input = TurnInput {
                    content: trimmed.to_string(),
                    attachments: std::mem::take(&mut pending),
                };
                if let Err(e) = send_message(&state, &session, input).await {
                    eprintln!("\x1B[31merror: {e}\x1B[0m");
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    eprintln!("Cleaning up remote resources...");
    state.shutdown_sessions().await;
    eprintln!("Goodbye!");
    Ok(())
}

/// Returns `true` if the REPL should exit.
fn handle_slash_command(input: &str, state: &AppState, pending: &mut Vec<PathBuf>) -> bool {
    let (cmd, arg) = match input.split_once(' ') {
        Some((c, a)) => (c, Some(a.trim())),
        None => (input, None),
    };

    match cmd {
        "/exit" | "/quit" => return true,
        "/attach" => match arg.filter(|s| !s.is_empty()) {
            Some(path) => {
                let path = PathBuf::from(path);
                if path.is_file() {
                    eprintln!("Attached {} (sent with your next message)", path.display());
                    pending.push(path);
                } else {
                    eprintln!("No such file: {}", path.display());
                }
            }
            None => eprintln!("Usage: /attach <path>"),
        },
        "/starters" => {
            for (i, s) in starters(&state.config).iter().enumerate() {
                eprintln!("  {}. {}", i + 1, s.message);
            }
        }
        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /attach <path>   Attach a file to the next message");
            eprintln!("  /starters        Show suggested questions");
            eprintln!("  /exit, /quit     Exit the chat");
            eprintln!("  /help            Show this help");
        }
        other => eprintln!("Unknown command: {other}  (type /help for a list)"),
    }
    false
}

async fn send_message(state: &AppState, session: &Session, input: TurnInput) -> anyhow::Result<()> {
    let _permit = state.session_locks.acquire(session.key()).await?;
    let cancel = state.cancel_map.register(session.key());

    let surface = ConsoleSurface::new();
    let turn = state.orchestrator.run_turn(session, &surface, input, &cancel);
    tokio::pin!(turn);
    let result = tokio::select! {
        r = &mut turn => r,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            turn.await
        }
    };
    state.cancel_map.remove(session.key());

    if let TurnOutcome::Cancelled { .. } = result? {
        eprintln!("turn stopped");
    }
    Ok(())
}
