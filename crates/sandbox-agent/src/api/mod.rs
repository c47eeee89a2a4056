//! Model service layer: the service boundary, the Gemini client, and retry.
//!
//! These modules handle everything between the
//! [`Agent`](crate::agent::harness::Agent) loop and the model service:
//!
//! - [`ModelService`]: the dyn-compatible boundary the agent talks to.
//! - [`gemini`]: [`GeminiClient`], a `generateContent` client over `reqwest`.
//! - [`scripted`]: [`ScriptedService`], canned turns for tests and offline runs.
//! - [`retry`]: backoff policy ([`RetryConfig`]) and retry causes.
//! - [`transport`]: [`ResilientTransport`], which retries a service until it
//!   answers or the cancellation token fires.

pub mod gemini;
pub mod retry;
pub mod scripted;
pub mod transport;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::{FunctionDeclaration, ModelTurn, Turn};

// Re-export commonly used items at the module level.
pub use gemini::{DEFAULT_MODEL, GeminiClient};
pub use retry::{RetryCause, RetryConfig};
pub use scripted::ScriptedService;
pub use transport::{Cancelled, ResilientTransport};

/// Errors a model service can report for one call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Rate limit or quota exhaustion, with the server's suggested delay
    /// when it gave one.
    #[error("resource exhausted: {message}")]
    ResourceExhausted {
        message: String,
        retry_after: Option<Duration>,
    },
    /// Any other failure: network, HTTP status, malformed response.
    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, ServiceError::ResourceExhausted { .. })
    }
}

/// Everything the service needs for one call.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    /// The conversation so far, starting with the task.
    pub conversation: &'a [Turn],
    /// Tools the model may invoke.
    pub tools: &'a [FunctionDeclaration],
}

impl<'a> GenerateRequest<'a> {
    pub fn new(conversation: &'a [Turn], tools: &'a [FunctionDeclaration]) -> Self {
        Self {
            conversation,
            tools,
        }
    }
}

/// Boxed future returned by [`ModelService::generate`].
pub type ServiceFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ModelTurn, ServiceError>> + Send + 'a>>;

/// A remote (or simulated) model that turns a conversation into the next
/// model turn.
///
/// Returns a boxed future so the trait stays dyn-compatible and services can
/// be swapped at runtime.
///
/// ```ignore
/// struct Echo;
///
/// impl ModelService for Echo {
///     fn generate<'a>(&'a self, request: GenerateRequest<'a>) -> ServiceFuture<'a> {
///         Box::pin(async move {
///             Ok(ModelTurn::text(format!("{} turns so far", request.conversation.len())))
///         })
///     }
/// }
/// ```
pub trait ModelService: Send + Sync {
    fn generate<'a>(&'a self, request: GenerateRequest<'a>) -> ServiceFuture<'a>;
}
