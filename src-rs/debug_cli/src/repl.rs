use std::io;
use std::sync::Arc;

use menuchat_tasks::{track_job, TaskApi, TaskClient, TaskPoller};
use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::models::{analysis_payload, CLIConfig, Command};
use crate::render::{self, ConsoleObserver};
use crate::signals::{self, Interrupts};

pub struct REPL {
    pub config: CLIConfig,
    pub client: Arc<TaskClient>,
    runtime: Runtime,
    interrupts: Arc<Interrupts>,
}

impl REPL {
    pub fn new(config: CLIConfig, runtime: Runtime) -> Result<Self, String> {
        let client = build_client(&config)?;
        let interrupts = Arc::new(Interrupts::default());
        runtime.spawn(signals::listen(interrupts.clone()));
        Ok(Self {
            config,
            client,
            runtime,
            interrupts,
        })
    }

    pub fn run(&mut self) {
        render::banner(&self.config);
        loop {
            render::prompt();
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match Command::parse(line) {
                Ok(command) => {
                    if self.handle_command(command) {
                        break;
                    }
                }
                Err(err) => render::error(&err),
            }
        }
    }

    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Exit => return true,
            Command::Help => render::help(),
            Command::Submit { kind, payload } => self.submit_and_watch(&kind, payload),
            Command::Analyze { images } => {
                let (kind, payload) = analysis_payload(&images);
                self.submit_and_watch(&kind, payload);
            }
            Command::Watch(task_id) => self.watch(&task_id),
            Command::Status(task_id) => self.status(&task_id),
            Command::Tasks(limit) => self.list_tasks(limit),
            Command::Interval(None) => render::info(&format!("interval: {}ms", self.config.interval_ms)),
            Command::Interval(Some(ms)) => {
                self.config.interval_ms = ms;
                render::info("interval updated");
            }
            Command::Debug(flag) => {
                self.config.debug = flag.unwrap_or(!self.config.debug);
                render::info(&format!("debug: {}", self.config.debug));
            }
            Command::Config => render::config(&self.config),
            Command::Base(None) => render::info(&format!("base: {}", self.config.base_url)),
            Command::Base(Some(url)) => {
                let previous = std::mem::replace(&mut self.config.base_url, url);
                match self.rebuild_client() {
                    Ok(()) => render::info("base url updated"),
                    Err(err) => {
                        warn!(base_url = %self.config.base_url, "rejected base url");
                        self.config.base_url = previous;
                        render::error(&err);
                    }
                }
            }
            Command::Token(token) => {
                self.config.token = token;
                match self.rebuild_client() {
                    Ok(()) if self.config.token.is_some() => render::info("token updated"),
                    Ok(()) => render::info("token cleared"),
                    Err(err) => {
                        warn!("failed to rebuild client after token change");
                        render::error(&err);
                    }
                }
            }
            Command::Unknown(_) => render::info("unknown command, type /help"),
        }
        false
    }

    fn rebuild_client(&mut self) -> Result<(), String> {
        self.client = build_client(&self.config)?;
        Ok(())
    }

    fn submit_and_watch(&self, kind: &str, payload: Value) {
        let poller_config = match self.config.poller_config() {
            Ok(cfg) => cfg,
            Err(err) => return render::error(&err.to_string()),
        };
        let observer = Arc::new(ConsoleObserver::new(self.config.debug));
        let api: Arc<dyn TaskApi> = self.client.clone();
        let interrupts = self.interrupts.as_ref();
        self.runtime.block_on(async move {
            match track_job(api, kind, payload, poller_config, observer).await {
                Ok(poller) => {
                    let task_id = poller.task_id().unwrap_or_default();
                    render::info(&format!("submitted {} as {}", kind, task_id));
                    follow(&poller, &task_id, interrupts).await;
                }
                Err(err) => render::error(&err.to_string()),
            }
        });
    }

    fn watch(&self, task_id: &str) {
        let poller_config = match self.config.poller_config() {
            Ok(cfg) => cfg,
            Err(err) => return render::error(&err.to_string()),
        };
        let observer = Arc::new(ConsoleObserver::new(self.config.debug));
        let poller = TaskPoller::new(self.client.clone(), poller_config, observer);
        let interrupts = self.interrupts.as_ref();
        self.runtime.block_on(async move {
            poller.start(task_id);
            follow(&poller, task_id, interrupts).await;
        });
    }

    fn status(&self, task_id: &str) {
        match self.runtime.block_on(self.client.fetch(task_id)) {
            Ok(task) => render::task(&task, self.config.debug),
            Err(err) => render::error(&err.to_string()),
        }
    }

    fn list_tasks(&self, limit: usize) {
        match self.runtime.block_on(self.client.list_tasks(limit)) {
            Ok(tasks) => render::tasks(&tasks),
            Err(err) => render::error(&err.to_string()),
        }
    }
}

/// Waits for the poller to settle; Ctrl-C stops it instead.
async fn follow(poller: &TaskPoller, task_id: &str, interrupts: &Interrupts) {
    interrupts.begin_watch();
    let state = tokio::select! {
        state = poller.wait() => state,
        () = interrupts.interrupted() => {
            poller.stop();
            poller.state()
        }
    };
    interrupts.end_watch();
    info!(task_id, ?state, "watch finished");
    if let Some(err) = poller.last_error() {
        render::error(&format!("last fetch error: {}", err));
    }
    render::finished(task_id, state);
}

fn build_client(config: &CLIConfig) -> Result<Arc<TaskClient>, String> {
    TaskClient::new(&config.client_config())
        .map(Arc::new)
        .map_err(|err| format!("failed to build http client: {err}"))
}
