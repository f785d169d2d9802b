//! Unix Domain Socket communication for daemon control
//!
//! One command per connection: the client writes a session command line,
//! the daemon answers with a [`Reply`] in wire form and closes.

use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};

use super::commands::SessionCommand;
use super::session_host::{Reply, SessionRequest};

const SOCKET_FILE_NAME: &str = "sound-recorder.sock";

/// `$XDG_RUNTIME_DIR/<name>`, falling back to the temp directory
pub fn runtime_file(name: &str) -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .map(|dir| PathBuf::from(dir).join(name))
        .unwrap_or_else(|_| std::env::temp_dir().join(name))
}

/// Socket path resolver
#[derive(Debug, Clone)]
pub struct SocketPath {
    path: PathBuf,
}

impl SocketPath {
    /// Create socket path, preferring XDG_RUNTIME_DIR
    pub fn new() -> Self {
        Self {
            path: runtime_file(SOCKET_FILE_NAME),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the socket path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if socket file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Remove socket file if it exists
    pub fn cleanup(&self) -> io::Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

impl Default for SocketPath {
    fn default() -> Self {
        Self::new()
    }
}

/// Daemon socket server - forwards commands to the session loop
pub struct DaemonSocketServer {
    socket_path: SocketPath,
    listener: Option<UnixListener>,
}

impl DaemonSocketServer {
    /// Create a new socket server
    pub fn new(socket_path: SocketPath) -> Self {
        Self {
            socket_path,
            listener: None,
        }
    }

    /// Bind to the socket
    pub fn bind(&mut self) -> io::Result<()> {
        // Remove stale socket file if it exists
        self.socket_path.cleanup()?;

        let listener = UnixListener::bind(self.socket_path.path())?;
        self.listener = Some(listener);
        Ok(())
    }

    /// Get the socket path
    pub fn path(&self) -> &Path {
        self.socket_path.path()
    }

    /// Accept connections until the session loop goes away.
    pub async fn run(&self, tx: mpsc::Sender<SessionRequest>) -> io::Result<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "Socket not bound"))?;

        while !tx.is_closed() {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, tx).await {
                            warn!("socket connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    warn!("socket accept error: {}", e);
                }
            }
        }
        Ok(())
    }

    /// Cleanup socket file
    pub fn cleanup(&self) {
        let _ = self.socket_path.cleanup();
    }
}

impl Drop for DaemonSocketServer {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Handle a single client connection
async fn handle_connection(stream: UnixStream, tx: mpsc::Sender<SessionRequest>) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    debug!("socket command: {}", line.trim());

    let reply = match line.parse::<SessionCommand>() {
        Ok(command) => {
            let (reply_tx, reply_rx) = oneshot::channel();
            let request = SessionRequest {
                command,
                reply: Some(reply_tx),
            };
            if tx.send(request).await.is_err() {
                Reply::error("daemon is shutting down")
            } else {
                reply_rx
                    .await
                    .unwrap_or_else(|_| Reply::error("daemon is shutting down"))
            }
        }
        Err(e) => Reply::error(e.to_string()),
    };

    writer.write_all(reply.to_wire().as_bytes()).await?;
    writer.flush().await?;

    Ok(())
}

/// Daemon socket client - connects and sends commands
pub struct DaemonSocketClient {
    socket_path: SocketPath,
}

impl DaemonSocketClient {
    /// Create a new socket client
    pub fn new(socket_path: SocketPath) -> Self {
        Self { socket_path }
    }

    /// Check if daemon appears to be running (socket exists)
    pub fn is_daemon_running(&self) -> bool {
        self.socket_path.exists()
    }

    /// Send a command line and read the full reply
    pub async fn send_command(&self, cmd: &str) -> io::Result<Reply> {
        let stream = UnixStream::connect(self.socket_path.path()).await?;
        let (mut reader, mut writer) = stream.into_split();

        writer.write_all(format!("{}\n", cmd).as_bytes()).await?;
        writer.flush().await?;

        let mut response = String::new();
        reader.read_to_string(&mut response).await?;

        Ok(Reply::from_wire(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::session_host::ReplyKind;

    #[test]
    fn socket_path_uses_runtime_dir() {
        let expected = std::env::var("XDG_RUNTIME_DIR")
            .map(|dir| PathBuf::from(dir).join(SOCKET_FILE_NAME))
            .unwrap_or_else(|_| std::env::temp_dir().join(SOCKET_FILE_NAME));
        assert_eq!(SocketPath::new().path(), expected.as_path());
    }

    #[tokio::test]
    async fn commands_round_trip_through_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = SocketPath::with_path(dir.path().join("test.sock"));
        let mut server = DaemonSocketServer::new(path.clone());
        server.bind().unwrap();

        let (tx, mut rx) = mpsc::channel::<SessionRequest>(4);
        tokio::spawn(async move {
            let _ = server.run(tx).await;
        });
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let reply = Reply::success(format!("did {}", request.command));
                if let Some(reply_tx) = request.reply {
                    let _ = reply_tx.send(reply);
                }
            }
        });

        let client = DaemonSocketClient::new(path);
        assert!(client.is_daemon_running());

        let reply = client.send_command("play 0.5").await.unwrap();
        assert_eq!(reply.kind, ReplyKind::Info);
        assert_eq!(reply.message, "did play 0.5");

        let reply = client.send_command("dance").await.unwrap();
        assert_eq!(reply.kind, ReplyKind::Error);
        assert!(reply.message.contains("Unknown command"));
    }
}
