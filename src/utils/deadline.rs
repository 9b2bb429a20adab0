use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// The operation did not finish before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut;

/// Run a blocking operation, giving up after `timeout`.
///
/// Without a timeout the operation runs on the calling thread. Otherwise it runs on a
/// helper thread; when the deadline passes the helper is detached and whatever it
/// eventually returns is dropped there, so values owning resources must release them
/// in `Drop`.
pub fn run_with_timeout<T, F>(timeout: Option<Duration>, op: F) -> Result<T, TimedOut>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let Some(timeout) = timeout else {
        return Ok(op());
    };

    let (tx, rx) = mpsc::sync_channel(1);
    thread::spawn(move || {
        // The receiver is gone once the caller timed out.
        let _ = tx.send(op());
    });

    rx.recv_timeout(timeout).map_err(|_| TimedOut)
}
