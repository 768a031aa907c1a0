//! Operator console: line-oriented commands on stdin.
//!
//! `help`, `status`, `join`, `leave`, `players`, `coords`; any other
//! non-empty line is sent verbatim as chat. Output goes to stdout — the
//! console is a UI, not a log.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::session::Command;

/// Reads operator commands until stdin closes or the manager goes away.
pub async fn run_console(commands: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !handle_line(line.trim(), &commands).await {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "console read failed");
                break;
            }
        }
    }
}

/// Handles one console line; returns false once the manager is gone.
async fn handle_line(line: &str, commands: &mpsc::Sender<Command>) -> bool {
    if line.is_empty() {
        return true;
    }
    match line {
        "help" => {
            print_help();
            true
        }
        "status" => {
            let (tx, rx) = oneshot::channel();
            if commands.send(Command::Status { reply: tx }).await.is_err() {
                return false;
            }
            if let Ok(status) = rx.await {
                if status.connected {
                    println!("status: connected");
                    println!("  server:   {}:{}", status.host, status.port);
                    println!("  username: {}", status.username);
                    println!("  health:   {}/20", status.health);
                    println!("  food:     {}/20", status.food);
                } else {
                    println!("status: disconnected");
                }
            }
            true
        }
        "join" => {
            let (tx, rx) = oneshot::channel();
            if commands
                .send(Command::Connect { reply: Some(tx) })
                .await
                .is_err()
            {
                return false;
            }
            match rx.await {
                Ok(Ok(())) => println!("connecting..."),
                Ok(Err(e)) => println!("error: {e}"),
                Err(_) => {}
            }
            true
        }
        "leave" => {
            let (tx, rx) = oneshot::channel();
            if commands
                .send(Command::Leave { reply: Some(tx) })
                .await
                .is_err()
            {
                return false;
            }
            match rx.await {
                Ok(Ok(())) => println!("disconnected"),
                Ok(Err(e)) => println!("error: {e}"),
                Err(_) => {}
            }
            true
        }
        "players" => {
            let (tx, rx) = oneshot::channel();
            if commands.send(Command::Players { reply: tx }).await.is_err() {
                return false;
            }
            match rx.await {
                Ok(Some(players)) if players.is_empty() => {
                    println!("no other players online");
                }
                Ok(Some(players)) => {
                    println!("online players ({}):", players.len());
                    for name in players {
                        println!("  - {name}");
                    }
                }
                Ok(None) => println!("error: no active session"),
                Err(_) => {}
            }
            true
        }
        "coords" => {
            let (tx, rx) = oneshot::channel();
            if commands.send(Command::Coords { reply: tx }).await.is_err() {
                return false;
            }
            match rx.await {
                Ok(Some(pos)) => {
                    println!("coordinates:");
                    println!("  x: {:.2}", pos.x);
                    println!("  y: {:.2}", pos.y);
                    println!("  z: {:.2}", pos.z);
                }
                Ok(None) => println!("error: no active session"),
                Err(_) => {}
            }
            true
        }
        chat => commands.send(Command::Chat(chat.to_string())).await.is_ok(),
    }
}

fn print_help() {
    println!("available commands:");
    println!("  help      show this help message");
    println!("  status    show session status");
    println!("  join      connect to the server");
    println!("  leave     disconnect from the server");
    println!("  players   list online players");
    println!("  coords    show current coordinates");
    println!("any other text is sent as a chat message");
}
