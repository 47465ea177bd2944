use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

/// Routes Ctrl-C for the whole session.
///
/// Once a tokio signal listener exists the default SIGINT action is gone for
/// the rest of the process, so a single listener decides: during a watch the
/// interrupt stops the watch, at the prompt it exits.
#[derive(Default)]
pub struct Interrupts {
    watching: AtomicBool,
    notify: Notify,
}

impl Interrupts {
    pub fn begin_watch(&self) {
        self.watching.store(true, Ordering::SeqCst);
    }

    pub fn end_watch(&self) {
        self.watching.store(false, Ordering::SeqCst);
    }

    /// Hands an interrupt to the active watch. Returns `false` when no watch
    /// is running, meaning the caller should exit.
    pub fn deliver(&self) -> bool {
        if self.watching.load(Ordering::SeqCst) {
            self.notify.notify_one();
            true
        } else {
            false
        }
    }

    pub async fn interrupted(&self) {
        self.notify.notified().await;
    }
}

/// Listens for Ctrl-C until the runtime shuts down.
pub async fn listen(interrupts: Arc<Interrupts>) {
    while tokio::signal::ctrl_c().await.is_ok() {
        if interrupts.deliver() {
            debug!("interrupt delivered to active watch");
        } else {
            println!();
            std::process::exit(130);
        }
    }
}
