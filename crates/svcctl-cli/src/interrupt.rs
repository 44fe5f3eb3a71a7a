use svcctl_core::runner::CancelToken;

/// A token that is cancelled on the first Ctrl-C.
///
/// The handler is installed before this returns; any later interrupt
/// cancels the token rather than terminating svcctl. The signal is awaited
/// on a single-threaded runtime parked on a helper thread; orchestration
/// itself stays synchronous.
#[cfg(unix)]
pub fn cancel_on_interrupt() -> anyhow::Result<CancelToken> {
    use tokio::signal::unix::{signal, SignalKind};

    let token = CancelToken::new();
    let trigger = token.clone();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let mut interrupts = rt.block_on(async { signal(SignalKind::interrupt()) })?;

    std::thread::spawn(move || {
        rt.block_on(async {
            if interrupts.recv().await.is_some() {
                tracing::warn!("interrupt received, stopping current command");
                trigger.cancel();
            }
        });
    });

    Ok(token)
}

#[cfg(not(unix))]
pub fn cancel_on_interrupt() -> anyhow::Result<CancelToken> {
    let token = CancelToken::new();
    let trigger = token.clone();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let mut interrupts = rt.block_on(async { tokio::signal::windows::ctrl_c() })?;

    std::thread::spawn(move || {
        rt.block_on(async {
            if interrupts.recv().await.is_some() {
                tracing::warn!("interrupt received, stopping current command");
                trigger.cancel();
            }
        });
    });

    Ok(token)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn interrupt_right_after_setup_cancels_instead_of_exiting() {
        let token = cancel_on_interrupt().unwrap();
        assert!(!token.is_cancelled());

        let status = std::process::Command::new("kill")
            .args(["-INT", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let deadline = Instant::now() + Duration::from_secs(5);
        while !token.is_cancelled() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(token.is_cancelled());
    }
}
