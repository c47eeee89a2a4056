//! Events, handlers, and run results for the [`Agent`](super::harness::Agent).
//!
//! The agent reports what it is doing through [`AgentEvent`] variants that
//! cover one task from start to finish: tool execution, unknown tools,
//! failed argument decoding, retries, and the final text. Callers implement
//! [`EventHandler`] to observe these events for logging, printing a
//! transcript, or any other side effects.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`ConsoleHandler`] | Human-readable transcript on stdout |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::api::{RetryCause, ServiceError};
use crate::{ToolArguments, Turn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted while the agent works on a task.
#[derive(Debug)]
pub enum AgentEvent<'a> {
    /// A task is about to be sent to the model.
    TaskStarted { task: &'a str },
    /// A tool is about to be executed.
    ToolExecuting {
        name: &'a str,
        args: &'a ToolArguments,
    },
    /// A tool finished executing. `result` is what the model will see.
    ToolResult { name: &'a str, result: &'a str },
    /// The model invoked a tool that does not exist.
    UnknownTool { name: &'a str },
    /// A tool could not run, e.g. its arguments failed to decode.
    ToolFailed {
        name: &'a str,
        args: &'a ToolArguments,
        error: &'a str,
    },
    /// A model call failed and will be retried after `wait`.
    RetryScheduled {
        attempt: u32,
        wait: Duration,
        cause: RetryCause,
        error: &'a ServiceError,
    },
    /// The model kept asking for tools past the configured turn limit.
    TurnLimitReached { max_turns: u32 },
    /// The model returned a final turn.
    Finished { turns_used: u32 },
    /// One text part of the final turn.
    Text(&'a str),
}

/// Handler for agent events.
///
/// The default implementation does nothing, so implementors only match the
/// variants they care about.
///
/// ```ignore
/// struct PrintText;
///
/// impl EventHandler for PrintText {
///     fn on_event(&self, event: &AgentEvent<'_>) {
///         if let AgentEvent::Text(text) = event {
///             println!("{text}");
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &AgentEvent<'_>) {
        let _ = event;
    }
}

/// An event handler that ignores everything.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let AgentEvent::ToolResult { name, result } = event {
///         println!("[{name}] {} bytes", result.len());
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&AgentEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &AgentEvent<'_>) {
        (self.0)(event);
    }
}

/// An event handler that delegates to multiple inner handlers, in
/// registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with(ConsoleHandler);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Conditionally add a handler to the chain.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        match event {
            AgentEvent::TaskStarted { task } => {
                let preview: String = task.chars().take(200).collect();
                info!("Task started: {preview}");
            }
            AgentEvent::ToolExecuting { name, args } => {
                debug!("Executing tool: {name} {}", args_display(args));
            }
            AgentEvent::ToolResult { name, result } => {
                debug!("Tool {name} result: {} bytes", result.len());
            }
            AgentEvent::UnknownTool { name } => {
                warn!("Model called unknown tool: {name}");
            }
            AgentEvent::ToolFailed { name, error, .. } => {
                warn!("Tool {name} failed: {error}");
            }
            AgentEvent::RetryScheduled {
                attempt,
                wait,
                cause,
                error,
            } => {
                warn!(
                    "Model call failed ({cause}, attempt {attempt}): {error}. Retrying in {}s",
                    wait.as_secs()
                );
            }
            AgentEvent::TurnLimitReached { max_turns } => {
                warn!("Agent hit turn limit ({max_turns})");
            }
            AgentEvent::Finished { turns_used } => {
                info!("Agent finished after {turns_used} model turn(s)");
            }
            AgentEvent::Text(text) => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "Model text: {preview}{}",
                    if text.chars().count() > 200 { "..." } else { "" }
                );
            }
        }
    }
}

/// An event handler that prints the human-readable transcript to stdout.
pub struct ConsoleHandler;

impl ConsoleHandler {
    /// The transcript line for `event`, if it has one.
    pub fn render(event: &AgentEvent<'_>) -> Option<String> {
        let line = match event {
            AgentEvent::TaskStarted { task } => format!("Executing task: {task}"),
            AgentEvent::ToolExecuting { name, args } => {
                format!("Executing tool: {name}({})", args_display(args))
            }
            AgentEvent::UnknownTool { name } => format!("Warning: Unknown tool called: {name}"),
            AgentEvent::ToolFailed { name, args, error } => format!(
                "Error executing tool '{name}' with args {}: {error}",
                args_display(args)
            ),
            AgentEvent::RetryScheduled {
                wait,
                cause: RetryCause::QuotaExceeded,
                ..
            } => format!("\nQuota exceeded, retrying in {}s...\n", wait.as_secs()),
            AgentEvent::RetryScheduled {
                wait,
                cause: RetryCause::Unexpected,
                error,
                ..
            } => format!("Unexpected error, retrying in {}s: {error}", wait.as_secs()),
            AgentEvent::TurnLimitReached { max_turns } => {
                format!("Turn limit reached ({max_turns}), stopping.")
            }
            AgentEvent::Finished { .. } => "Task finished.\n".to_string(),
            AgentEvent::Text(text) => (*text).to_string(),
            AgentEvent::ToolResult { .. } => return None,
        };
        Some(line)
    }
}

impl EventHandler for ConsoleHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        if let Some(line) = Self::render(event) {
            println!("{line}");
        }
    }
}

fn args_display(args: &ToolArguments) -> String {
    serde_json::Value::Object(args.clone()).to_string()
}

// ── Run result ─────────────────────────────────────────────────────

/// The result of a completed [`Agent::run_task`](super::harness::Agent::run_task).
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Text parts of the final model turn, in order.
    pub text_output: Vec<String>,
    /// The full conversation, starting with the task.
    pub conversation: Vec<Turn>,
    /// Number of model turns received.
    pub turns_used: u32,
    /// Number of tool invocations dispatched (unknown names included).
    pub tool_calls: u32,
}

impl TaskOutcome {
    /// Final text parts joined by newlines.
    pub fn text(&self) -> String {
        self.text_output.join("\n")
    }
}
