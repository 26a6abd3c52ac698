use log::{info, warn};

use crate::utils::CancelFlag;

#[macro_export]
macro_rules! exit {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
        std::process::exit(1);
    }};
}
pub use exit;

/// Cancels `cancel` on the first SIGINT (Ctrl+C) or SIGTERM. The handlers are registered
/// before this returns; the signals are awaited on a dedicated thread.
pub fn spawn_signal_listener(cancel: CancelFlag) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_io().build()?;

    #[cfg(unix)]
    let shutdown = {
        use tokio::signal::unix::{signal, SignalKind};
        let _guard = runtime.enter();
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        async move {
            tokio::select! {
                _ = interrupt.recv() => info!("Received Ctrl+C"),
                _ = terminate.recv() => info!("Received SIGTERM"),
            }
        }
    };

    #[cfg(not(unix))]
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C"),
            Err(err) => {
                log::error!("Failed to install Ctrl+C handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    std::thread::Builder::new()
        .name("signal-listener".to_string())
        .spawn(move || {
            runtime.block_on(shutdown);
            warn!("Cancelling run after the current request");
            cancel.cancel();
        })?;
    Ok(())
}
