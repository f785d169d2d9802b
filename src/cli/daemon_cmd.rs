//! Daemon command handler - forwards a session command to the running daemon

use super::commands::{CommandParseError, SessionCommand};
use super::presenter::Presenter;
use super::session_host::ReplyKind;
use super::socket::{DaemonSocketClient, SocketPath};

/// Handle `daemon <command...>`
pub async fn handle_daemon_command(words: &[String], presenter: &Presenter) -> Result<(), String> {
    let line = words.join(" ");
    let command: SessionCommand = line.parse().map_err(|e: CommandParseError| e.to_string())?;

    let client = DaemonSocketClient::new(SocketPath::new());
    if !client.is_daemon_running() {
        return Err("No daemon running. Start with: sound-recorder --daemon".to_string());
    }

    let reply = client
        .send_command(&command.to_string())
        .await
        .map_err(|e| format!("Failed to communicate with daemon: {}", e))?;

    match reply.kind {
        ReplyKind::Error => Err(reply.message),
        // Plain answers such as `status` are the command's result.
        ReplyKind::Info => {
            presenter.output(&reply.message);
            Ok(())
        }
        _ => {
            presenter.reply(&reply);
            Ok(())
        }
    }
}
