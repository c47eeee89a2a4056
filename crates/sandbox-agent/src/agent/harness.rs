//! The agent loop: send the task, run tools, feed results back, repeat.
//!
//! [`Agent::run_task`] moves between two states. While awaiting the model it
//! sends the conversation through the
//! [`ResilientTransport`](crate::api::ResilientTransport). When the reply
//! contains tool invocations it runs each one, in order, through the
//! [`ToolSet`] and sends all results back as a single batch. A reply with no
//! invocations ends the task; its text parts are the output.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::config::AgentConfig;
use super::events::{AgentEvent, EventHandler, NoopHandler, TaskOutcome};
use crate::api::{Cancelled, GenerateRequest, ModelService, ResilientTransport};
use crate::tools::core::ToolSet;
use crate::{ToolOutput, Turn};

/// Why a task ended without a final model turn.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// The cancellation token fired while waiting on the model.
    #[error("task cancelled")]
    Cancelled,
    /// The model was still asking for tools after `max_turns` turns.
    #[error("model still requested tools after {max_turns} turn(s)")]
    TurnLimitExceeded { max_turns: u32 },
}

impl From<Cancelled> for AgentError {
    fn from(_: Cancelled) -> Self {
        AgentError::Cancelled
    }
}

// ── Agent ──────────────────────────────────────────────────────────

/// The tool-use loop.
///
/// ```ignore
/// let client = GeminiClient::new(api_key, DEFAULT_MODEL)?;
/// let tools = ToolSet::new(PathSandbox::new(".")?);
///
/// let outcome = Agent::new(&client, &tools, AgentConfig::default())
///     .with_event_handler(&ConsoleHandler)
///     .run_task("List the files here")
///     .await?;
/// ```
///
/// # Lifetimes
///
/// `Agent<'a>` borrows the service, tools, and event handler. Bind them to
/// `let` bindings before building the agent so they outlive `run_task`.
pub struct Agent<'a> {
    service: &'a dyn ModelService,
    tools: &'a ToolSet,
    config: AgentConfig,
    event_handler: &'a dyn EventHandler,
    cancel: CancellationToken,
}

impl<'a> Agent<'a> {
    pub fn new(service: &'a dyn ModelService, tools: &'a ToolSet, config: AgentConfig) -> Self {
        Self {
            service,
            tools,
            config,
            event_handler: &NoopHandler,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach an event handler.
    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    /// Attach a cancellation token. Without one the agent retries model
    /// calls forever.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run one task to completion on a fresh conversation.
    pub async fn run_task(&self, task: &str) -> Result<TaskOutcome, AgentError> {
        let events = self.event_handler;
        let transport = ResilientTransport::new(self.service, self.config.retry.clone(), events);
        let declarations = self.tools.declarations();

        events.on_event(&AgentEvent::TaskStarted { task });

        let mut conversation = vec![Turn::Task(task.to_string())];
        let mut turns_used: u32 = 0;
        let mut tool_calls: u32 = 0;

        loop {
            let turn = transport
                .send(
                    GenerateRequest::new(&conversation, &declarations),
                    &self.cancel,
                )
                .await?;
            turns_used += 1;

            if turn.is_final() {
                let text_output: Vec<String> =
                    turn.texts().into_iter().map(str::to_string).collect();
                conversation.push(Turn::Model(turn));

                info!("Task finished after {turns_used} model turn(s), {tool_calls} tool call(s)");
                events.on_event(&AgentEvent::Finished { turns_used });
                for text in &text_output {
                    events.on_event(&AgentEvent::Text(text));
                }
                return Ok(TaskOutcome {
                    text_output,
                    conversation,
                    turns_used,
                    tool_calls,
                });
            }

            if let Some(max_turns) = self.config.max_turns
                && turns_used >= max_turns
            {
                events.on_event(&AgentEvent::TurnLimitReached { max_turns });
                return Err(AgentError::TurnLimitExceeded { max_turns });
            }

            let invocations = turn.invocations();
            debug!("Turn {turns_used}: {} tool invocation(s)", invocations.len());
            let mut results = Vec::with_capacity(invocations.len());
            for invocation in invocations {
                let output = self.tools.dispatch(invocation, events).await;
                results.push(ToolOutput::new(invocation.name.clone(), output));
                tool_calls += 1;
            }

            conversation.push(Turn::Model(turn));
            conversation.push(Turn::ToolResults(results));
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
