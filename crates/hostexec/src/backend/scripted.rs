//! Scripted transport for tests.
//!
//! Records every dispatched command and answers from a list of canned
//! results, making higher-level orchestration deterministic to test.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backend::Transport;
use crate::error::{Error, Result};
use crate::types::{CancelToken, ExecutionResult, TransportKind};

/// What a scripted transport has been asked to do.
#[derive(Debug, Default)]
pub struct ScriptLog {
    commands: Mutex<Vec<String>>,
    closes: AtomicUsize,
    dropped: AtomicBool,
}

impl ScriptLog {
    /// Commands in dispatch order, exactly as the transport received them.
    pub fn commands(&self) -> Vec<String> {
        match self.commands.lock() {
            Ok(commands) => commands.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// How many times `close` was called.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Whether the transport has been closed or dropped.
    pub fn released(&self) -> bool {
        self.close_count() > 0 || self.dropped.load(Ordering::SeqCst)
    }

    fn record(&self, command: &str) {
        match self.commands.lock() {
            Ok(mut commands) => commands.push(command.to_string()),
            Err(poisoned) => poisoned.into_inner().push(command.to_string()),
        }
    }
}

/// A transport answering from canned results.
///
/// Rules are matched in insertion order against a substring of the command;
/// unmatched commands succeed with empty output.
pub struct ScriptedTransport {
    kind: TransportKind,
    host: String,
    rules: Vec<(String, ExecutionResult)>,
    log: Arc<ScriptLog>,
}

impl ScriptedTransport {
    /// A scripted transport posing as `kind`.
    pub fn new(kind: TransportKind, host: impl Into<String>) -> Self {
        Self {
            kind,
            host: host.into(),
            rules: Vec::new(),
            log: Arc::new(ScriptLog::default()),
        }
    }

    /// Answer commands containing `pattern` with `result`.
    pub fn on(mut self, pattern: impl Into<String>, result: ExecutionResult) -> Self {
        self.rules.push((pattern.into(), result));
        self
    }

    /// Shorthand for a successful answer with `stdout`.
    pub fn on_stdout(self, pattern: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.on(pattern, ExecutionResult::exited(0, stdout, ""))
    }

    /// Handle for inspecting the transport after it has been moved.
    pub fn log(&self) -> Arc<ScriptLog> {
        Arc::clone(&self.log)
    }
}

impl Transport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn run(
        &mut self,
        command: &str,
        _timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<ExecutionResult> {
        if cancel.is_cancelled() {
            return Err(Error::Interrupted {
                command: command.to_string(),
                host: self.host.clone(),
            });
        }
        self.log.record(command);
        Ok(self
            .rules
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| ExecutionResult::exited(0, "", "")))
    }

    fn close(&mut self) -> Result<()> {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        self.log.dropped.store(true, Ordering::SeqCst);
    }
}
