use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info};

use super::observer::{dispatch, TaskObserver};
use super::state::{PollerCore, PollerState};
use crate::client::TaskApi;
use crate::config::PollerConfig;
use crate::error::FetchError;
use crate::task::Task;

/// Polls one task at a time on a fixed interval until it settles or is stopped.
///
/// Fetches never overlap: the next timer tick is scheduled one interval after
/// the previous fetch returns. Dropping the poller stops it.
pub struct TaskPoller {
    api: Arc<dyn TaskApi>,
    config: PollerConfig,
    observer: Arc<dyn TaskObserver>,
    shared: Arc<Shared>,
}

struct Shared {
    core: Mutex<PollerCore>,
    state_tx: watch::Sender<PollerState>,
    control: Mutex<Option<Control>>,
}

struct Control {
    refresh_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Shared {
    fn core(&self) -> MutexGuard<'_, PollerCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn control(&self) -> MutexGuard<'_, Option<Control>> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Reads the state under the core lock so a late publish can never
    // overwrite a newer transition.
    fn publish(&self) {
        let core = self.core();
        self.state_tx.send_replace(core.state());
    }
}

impl TaskPoller {
    pub fn new(api: Arc<dyn TaskApi>, config: PollerConfig, observer: Arc<dyn TaskObserver>) -> Self {
        let (state_tx, _) = watch::channel(PollerState::Idle);
        Self {
            api,
            config,
            observer,
            shared: Arc::new(Shared {
                core: Mutex::new(PollerCore::new()),
                state_tx,
                control: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> PollerConfig {
        self.config
    }

    pub fn state(&self) -> PollerState {
        self.shared.core().state()
    }

    pub fn task_id(&self) -> Option<String> {
        self.shared.core().task_id().map(str::to_string)
    }

    /// Latest applied snapshot, with progress as displayed (never lower than before).
    pub fn snapshot(&self) -> Option<Task> {
        self.shared.core().snapshot().cloned()
    }

    /// Most recent fetch failure; cleared by the next successful snapshot.
    pub fn last_error(&self) -> Option<FetchError> {
        self.shared.core().last_error().cloned()
    }

    /// Starts polling `task_id`, fetching immediately.
    ///
    /// Returns `false` and does nothing while a task is still being tracked;
    /// call [`stop`](Self::stop) first to switch tasks. Must be called from
    /// within a tokio runtime.
    pub fn start(&self, task_id: &str) -> bool {
        let generation = {
            let mut core = self.shared.core();
            if !core.start(task_id) {
                return false;
            }
            core.generation()
        };
        self.shared.publish();
        info!(task_id, "polling started");

        // One slot: refreshes requested while one is already queued coalesce.
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let handle = tokio::spawn(drive(
            self.shared.clone(),
            self.api.clone(),
            self.observer.clone(),
            self.config,
            generation,
            refresh_rx,
        ));
        if let Some(previous) = self.shared.control().replace(Control { refresh_tx, handle }) {
            previous.handle.abort();
        }
        true
    }

    /// Fetches out of band without moving the next timer tick.
    ///
    /// Only an active observation can be refreshed; after settling the
    /// terminal snapshot is kept and no request is made.
    pub fn refresh(&self) -> bool {
        if !self.state().is_active() {
            return false;
        }
        match self.shared.control().as_ref() {
            Some(control) => match control.refresh_tx.try_send(()) {
                Ok(()) | Err(TrySendError::Full(())) => true,
                Err(TrySendError::Closed(())) => false,
            },
            None => false,
        }
    }

    /// Halts polling immediately. Idempotent. The backend job is not cancelled.
    pub fn stop(&self) -> bool {
        let stopped = self.shared.core().stop();
        if !stopped {
            return false;
        }
        self.shared.publish();
        if let Some(control) = self.shared.control().take() {
            control.handle.abort();
        }
        info!(task_id = %self.task_id().unwrap_or_default(), "polling stopped");
        true
    }

    /// Resolves once the poller is no longer loading or polling.
    pub async fn wait(&self) -> PollerState {
        let mut rx = self.shared.state_tx.subscribe();
        let finished = rx.wait_for(|state| !state.is_active()).await.map(|state| *state);
        finished.unwrap_or_else(|_| self.state())
    }
}

impl Drop for TaskPoller {
    fn drop(&mut self) {
        if let Some(control) = self.shared.control().take() {
            control.handle.abort();
        }
    }
}

async fn drive(
    shared: Arc<Shared>,
    api: Arc<dyn TaskApi>,
    observer: Arc<dyn TaskObserver>,
    config: PollerConfig,
    generation: u64,
    mut refresh_rx: mpsc::Receiver<()>,
) {
    let mut deadline = Instant::now();
    loop {
        tokio::select! {
            () = sleep_until(deadline) => {
                if !poll_once(&shared, api.as_ref(), observer.as_ref(), &config, generation).await {
                    break;
                }
                deadline = Instant::now() + config.interval;
            }
            Some(()) = refresh_rx.recv() => {
                debug!("out-of-band refresh");
                if !poll_once(&shared, api.as_ref(), observer.as_ref(), &config, generation).await {
                    break;
                }
            }
        }
    }
    debug!(generation, "poll loop finished");
}

/// One fetch-apply-notify round. Returns whether polling should continue.
async fn poll_once(
    shared: &Shared,
    api: &dyn TaskApi,
    observer: &dyn TaskObserver,
    config: &PollerConfig,
    generation: u64,
) -> bool {
    let ticket = {
        let mut core = shared.core();
        if core.generation() != generation {
            return false;
        }
        match core.begin_fetch() {
            Some(ticket) => ticket,
            None => return false,
        }
    };

    let outcome = match timeout(config.fetch_timeout, api.fetch(&ticket.task_id)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(FetchError::Timeout(config.fetch_timeout)),
    };

    let events = shared.core().apply(&ticket, outcome);
    dispatch(observer, &ticket.task_id, events);
    shared.publish();

    let core = shared.core();
    core.generation() == generation && core.state().is_active()
}
