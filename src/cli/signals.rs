//! Process signals the session loop reacts to

use colored::Colorize;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

/// Signals forwarded to the session loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// Stop, keep what was recorded and exit (SIGINT/SIGTERM)
    Shutdown,
    /// Detach the foreground session (SIGUSR1)
    Hide,
    /// Reattach the foreground session (SIGUSR2)
    Show,
}

impl SessionSignal {
    fn kinds() -> [(SignalKind, Self, &'static str); 4] {
        [
            (SignalKind::interrupt(), Self::Shutdown, "SIGINT"),
            (SignalKind::terminate(), Self::Shutdown, "SIGTERM"),
            (SignalKind::user_defined1(), Self::Hide, "SIGUSR1"),
            (SignalKind::user_defined2(), Self::Show, "SIGUSR2"),
        ]
    }
}

/// Listens for OS signals and forwards them as [`SessionSignal`]s.
pub struct SignalHandler {
    receiver: mpsc::Receiver<SessionSignal>,
}

impl SignalHandler {
    /// Install the handlers. Must be called from within a tokio runtime.
    pub fn new() -> Result<Self, std::io::Error> {
        let (tx, rx) = mpsc::channel(10);

        for (kind, forwarded, name) in SessionSignal::kinds() {
            let mut stream = signal(kind)?;
            let tx = tx.clone();
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    log::debug!("received {}", name);
                    if forwarded == SessionSignal::Shutdown {
                        eprintln!("{} Received {} (shutdown)", "↓".cyan(), name);
                    }
                    if tx.send(forwarded).await.is_err() {
                        break;
                    }
                }
            });
        }

        Ok(Self { receiver: rx })
    }

    /// Wait for the next signal
    pub async fn recv(&mut self) -> Option<SessionSignal> {
        self.receiver.recv().await
    }
}
