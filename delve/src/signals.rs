// Process signals mapped onto crawl control requests

use delve_core::control::ControlSignal;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Listen for SIGINT, SIGUSR1 and SIGUSR2 and forward them as `Interrupt`,
/// `Widen` and `Narrow`. The listener exits once the receiver is dropped.
#[cfg(unix)]
pub fn spawn_signal_listener() -> std::io::Result<mpsc::Receiver<ControlSignal>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut widen = signal(SignalKind::user_defined1())?;
    let mut narrow = signal(SignalKind::user_defined2())?;
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        loop {
            let request = tokio::select! {
                _ = tx.closed() => break,
                Some(()) = interrupt.recv() => {
                    info!("received SIGINT");
                    ControlSignal::Interrupt
                }
                Some(()) = widen.recv() => {
                    info!("received SIGUSR1");
                    ControlSignal::Widen
                }
                Some(()) = narrow.recv() => {
                    info!("received SIGUSR2");
                    ControlSignal::Narrow
                }
                else => break,
            };
            if tx.send(request).await.is_err() {
                break;
            }
        }
        debug!("Signal listener stopped");
    });

    Ok(rx)
}

/// Only ctrl-c is available here; it maps to `Interrupt`.
#[cfg(not(unix))]
pub fn spawn_signal_listener() -> std::io::Result<mpsc::Receiver<ControlSignal>> {
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                result = tokio::signal::ctrl_c() => {
                    if result.is_err() {
                        break;
                    }
                    info!("received ctrl-c");
                    if tx.send(ControlSignal::Interrupt).await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Signal listener stopped");
    });

    Ok(rx)
}
