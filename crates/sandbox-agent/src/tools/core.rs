//! Tool declarations and closed-variant dispatch.
//!
//! [`ToolSet`] owns the [`PathSandbox`] and turns a [`ToolInvocation`] from
//! the model into exactly one of the three operations in
//! [`common`](super::common). Names are matched against the closed
//! [`ToolName`] set; arguments are decoded into typed structs. Neither an
//! unknown name nor a bad argument stops the agent: both come back as
//! result strings the model can read.

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, trace};

use super::common;
use super::names::{ToolName, UnknownToolName};
use crate::agent::events::{AgentEvent, EventHandler};
use crate::sandbox::PathSandbox;
use crate::{FunctionDeclaration, ToolInvocation, json_schema_for};

// ── Typed argument structs ──────────────────────────────────────────

/// Typed arguments for `read_file`.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct ReadFileArgs {
    /// Path of the file to read, relative to the working directory.
    pub file_path: String,
}

/// Typed arguments for `write_file`.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct WriteFileArgs {
    /// Path of the file to write, relative to the working directory.
    pub file_path: String,
    /// Full text to write. Replaces any existing content.
    pub content: String,
}

/// Typed arguments for `execute_command`.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct ExecuteCommandArgs {
    /// Shell command to run in the working directory (e.g. 'ls -la').
    pub command: String,
}

// ── Dispatch ───────────────────────────────────────────────────────

/// A decoded tool invocation: one variant per tool.
#[derive(Debug)]
pub enum ToolCall {
    ReadFile(ReadFileArgs),
    WriteFile(WriteFileArgs),
    ExecuteCommand(ExecuteCommandArgs),
}

/// Why an invocation could not be turned into a [`ToolCall`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    UnknownTool(#[from] UnknownToolName),
    #[error("{0}")]
    InvalidArguments(#[from] serde_json::Error),
}

impl ToolCall {
    /// Match the name against [`ToolName`] and decode the arguments.
    pub fn parse(invocation: &ToolInvocation) -> Result<Self, DispatchError> {
        let name: ToolName = invocation.name.parse()?;
        let args = serde_json::Value::Object(invocation.args.clone());
        let call = match name {
            ToolName::ReadFile => ToolCall::ReadFile(serde_json::from_value(args)?),
            ToolName::WriteFile => ToolCall::WriteFile(serde_json::from_value(args)?),
            ToolName::ExecuteCommand => ToolCall::ExecuteCommand(serde_json::from_value(args)?),
        };
        Ok(call)
    }

    pub fn name(&self) -> ToolName {
        match self {
            ToolCall::ReadFile(_) => ToolName::ReadFile,
            ToolCall::WriteFile(_) => ToolName::WriteFile,
            ToolCall::ExecuteCommand(_) => ToolName::ExecuteCommand,
        }
    }
}

// ── ToolSet ────────────────────────────────────────────────────────

/// The agent's tools, bound to one sandbox root.
#[derive(Debug, Clone)]
pub struct ToolSet {
    sandbox: PathSandbox,
}

impl ToolSet {
    pub fn new(sandbox: PathSandbox) -> Self {
        Self { sandbox }
    }

    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    /// Declarations for every tool, in [`ToolName::ALL`] order.
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        ToolName::ALL.into_iter().map(declaration).collect()
    }

    /// Run one decoded call.
    pub async fn execute(&self, call: &ToolCall) -> String {
        match call {
            ToolCall::ReadFile(args) => common::read_file(&self.sandbox, &args.file_path).await,
            ToolCall::WriteFile(args) => {
                common::write_file(&self.sandbox, &args.file_path, &args.content).await
            }
            ToolCall::ExecuteCommand(args) => {
                common::execute_command(&self.sandbox, &args.command).await
            }
        }
    }

    /// Decode and run one invocation, reporting progress to `events`.
    ///
    /// Always returns the string the model should see:
    /// - unknown name: `Error: Unknown tool: <name>`
    /// - undecodable arguments: `Error executing tool '<name>': <reason>`
    /// - otherwise the operation's own result
    pub async fn dispatch(&self, invocation: &ToolInvocation, events: &dyn EventHandler) -> String {
        let name = invocation.name.as_str();
        events.on_event(&AgentEvent::ToolExecuting {
            name,
            args: &invocation.args,
        });

        let result = match ToolCall::parse(invocation) {
            Ok(call) => {
                let start = std::time::Instant::now();
                let result = self.execute(&call).await;
                debug!(
                    "Tool {name} completed in {:.0}ms ({} bytes)",
                    start.elapsed().as_secs_f64() * 1000.0,
                    result.len()
                );
                result
            }
            Err(DispatchError::UnknownTool(e)) => {
                events.on_event(&AgentEvent::UnknownTool { name });
                format!("Error: {e}")
            }
            Err(e @ DispatchError::InvalidArguments(_)) => {
                let error = e.to_string();
                events.on_event(&AgentEvent::ToolFailed {
                    name,
                    args: &invocation.args,
                    error: &error,
                });
                format!("Error executing tool '{name}': {error}")
            }
        };

        trace!(
            "Tool {name} result preview: {}",
            result.chars().take(300).collect::<String>()
        );
        events.on_event(&AgentEvent::ToolResult {
            name,
            result: &result,
        });
        result
    }
}

fn declaration(tool: ToolName) -> FunctionDeclaration {
    match tool {
        ToolName::ReadFile => FunctionDeclaration::new(
            tool.as_str(),
            "Reads the content of a file inside the working directory. \
             Returns the file content, or an error message if it cannot be read.",
            json_schema_for::<ReadFileArgs>(),
        ),
        ToolName::WriteFile => FunctionDeclaration::new(
            tool.as_str(),
            "Writes content to a file inside the working directory, replacing it if it \
             exists. Parent directories must already exist. Returns a confirmation or an \
             error message.",
            json_schema_for::<WriteFileArgs>(),
        ),
        ToolName::ExecuteCommand => FunctionDeclaration::new(
            tool.as_str(),
            "Executes a shell command inside the working directory. Paths must stay inside \
             it. Returns the captured stdout and stderr, or an error message.",
            json_schema_for::<ExecuteCommandArgs>(),
        ),
    }
}

// ── Tests ──────────────────────────────────────────────────────────
