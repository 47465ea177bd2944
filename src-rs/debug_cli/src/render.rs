use std::io::{self, Write};

use menuchat_tasks::{FetchError, PollerState, Task, TaskError, TaskObserver};
use serde_json::Value;

use crate::models::CLIConfig;

pub fn banner(cfg: &CLIConfig) {
    println!("MenuChat Tasks CLI");
    println!("API: {}", cfg.base_url);
    println!(
        "Interval: {}ms  Fetch timeout: {}ms",
        cfg.interval_ms, cfg.fetch_timeout_ms
    );
    println!("Type image names to analyze a menu, or /help for commands.");
}

pub fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

pub fn help() {
    println!("Commands:");
    println!("  <image> [image...]     Submit a menu-analysis job and watch it");
    println!("  /submit <kind> [json]  Submit a job and watch it");
    println!("  /watch <taskId>        Poll an existing task until it settles");
    println!("  /status <taskId>       Fetch a task once");
    println!("  /tasks [limit]         List recent tasks");
    println!("  /interval <ms>         Set the poll interval");
    println!("  /debug [on|off]        Toggle debug output");
    println!("  /config                Show current config");
    println!("  /base <url>            Update base URL");
    println!("  /token <token>         Update bearer token");
    println!("  /help                  Show commands");
    println!("  /exit | /quit          Exit");
    println!("Ctrl-C while watching stops polling (the job keeps running); at the prompt it exits.");
}

pub fn task(task: &Task, debug: bool) {
    println!(
        "[{}] {} {} {}% {}",
        task.status, task.task_id, task.kind, task.progress, task.progress_message
    );
    if let Some(err) = &task.error {
        println!("  error: {}", err);
    }
    if debug {
        if let Some(result) = &task.result {
            println!("  result: {}", result);
        }
    }
}

pub fn tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("no tasks");
        return;
    }
    for item in tasks {
        println!(
            "[{}] {} {} {}% {}",
            item.status,
            item.task_id,
            item.kind,
            item.progress,
            item.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

pub fn config(cfg: &CLIConfig) {
    println!("config:");
    println!("  base: {}", cfg.base_url);
    println!("  token: {}", if cfg.token.is_some() { "set" } else { "unset" });
    println!("  interval: {}ms", cfg.interval_ms);
    println!("  fetch timeout: {}ms", cfg.fetch_timeout_ms);
    println!("  debug: {}", cfg.debug);
}

pub fn finished(task_id: &str, state: PollerState) {
    match state {
        PollerState::Settled => println!("task {} settled", task_id),
        PollerState::Stopped => println!("stopped watching {}; the job keeps running on the server", task_id),
        other => println!("task {} ended in state {:?}", task_id, other),
    }
}

pub fn info(msg: &str) {
    println!("{}", msg);
}

pub fn error(msg: &str) {
    eprintln!("error: {}", msg);
}

/// Prints poller callbacks as they arrive.
pub struct ConsoleObserver {
    debug: bool,
}

impl ConsoleObserver {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl TaskObserver for ConsoleObserver {
    fn on_progress(&self, progress: u8, message: &str) {
        println!("  {:>3}% {}", progress, message);
    }

    fn on_complete(&self, result: &Value) {
        match serde_json::to_string_pretty(result) {
            Ok(pretty) => println!("completed:\n{}", pretty),
            Err(_) => println!("completed: {}", result),
        }
    }

    fn on_error(&self, error: &TaskError) {
        eprintln!("failed: {}", error);
    }

    fn on_transient_error(&self, error: &FetchError) {
        if self.debug {
            eprintln!("  (retrying) {}", error);
        }
    }
}
