//! Convenience re-exports for common `sandbox-agent` types.
//!
//! Meant to be glob-imported when embedding the agent:
//!
//! ```ignore
//! use sandbox_agent::prelude::*;
//! ```
//!
//! This pulls in the conversation types, the [`Agent`] loop and its config,
//! event handlers, the [`ToolSet`] and [`PathSandbox`], and the model
//! services. Wire-level details (Gemini request mapping, error
//! classification, backoff state) stay in their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{
    ContentPart, FunctionDeclaration, ModelTurn, ToolInvocation, ToolOutput, Turn,
    json_schema_for,
};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    Agent, AgentConfig, AgentError, AgentEvent, CompositeEventHandler, ConsoleHandler,
    EventHandler, FnEventHandler, LoggingHandler, NoopHandler, TaskOutcome,
};

// ── Model services ──────────────────────────────────────────────────
pub use crate::api::{
    DEFAULT_MODEL, GeminiClient, GenerateRequest, ModelService, RetryConfig, ScriptedService,
    ServiceError, ServiceFuture,
};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::sandbox::{PathSandbox, SandboxError};
pub use crate::tools::{ToolName, ToolSet};
