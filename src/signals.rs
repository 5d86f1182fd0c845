use anyhow::Result;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;
use tracing::{info, trace};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}

/// Start listening for termination signals. The receiver gets a single [`Signal::Shutdown`] for
/// the first of SIGINT, SIGTERM, SIGHUP or SIGQUIT.
pub async fn listen() -> Result<broadcast::Receiver<Signal>> {
    let (tx, rx) = broadcast::channel(1);

    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut hup = signal(SignalKind::hangup())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = int.recv() => "SIGINT",
            _ = term.recv() => "SIGTERM",
            _ = hup.recv() => "SIGHUP",
            _ = quit.recv() => "SIGQUIT",
        };
        info!(signal = name, "Shutting down after the current restaurant");
        if tx.send(Signal::Shutdown).is_err() {
            trace!("Nobody listening for shutdown");
        }
    });
    Ok(rx)
}
