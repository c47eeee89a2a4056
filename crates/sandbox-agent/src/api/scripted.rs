//! A model service that replays a fixed script.
//!
//! [`ScriptedService`] answers each call with the next queued result and
//! records the conversation it was shown. It backs the test suites and lets
//! the agent loop run without network access.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{GenerateRequest, ModelService, ServiceError, ServiceFuture};
use crate::{ModelTurn, ToolInvocation, Turn};

/// Error returned once the script has run out.
pub const SCRIPT_EXHAUSTED: &str = "scripted service has no more responses";

#[derive(Debug, Default)]
pub struct ScriptedService {
    script: Mutex<VecDeque<Result<ModelTurn, ServiceError>>>,
    requests: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful model turn.
    pub fn then_turn(self, turn: ModelTurn) -> Self {
        lock(&self.script).push_back(Ok(turn));
        self
    }

    /// Queue a final turn with one text part.
    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.then_turn(ModelTurn::text(text))
    }

    /// Queue a tool-call turn.
    pub fn then_tool_calls(self, invocations: Vec<ToolInvocation>) -> Self {
        self.then_turn(ModelTurn::tool_calls(invocations))
    }

    /// Queue a failed call.
    pub fn then_error(self, error: ServiceError) -> Self {
        lock(&self.script).push_back(Err(error));
        self
    }

    /// Number of queued results not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }

    /// Snapshot of every conversation the service was called with.
    pub fn requests(&self) -> Vec<Vec<Turn>> {
        lock(&self.requests).clone()
    }

    /// Number of calls made so far, failed ones included.
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

impl ModelService for ScriptedService {
    fn generate<'a>(&'a self, request: GenerateRequest<'a>) -> ServiceFuture<'a> {
        Box::pin(async move {
            lock(&self.requests).push(request.conversation.to_vec());
            lock(&self.script)
                .pop_front()
                .unwrap_or_else(|| Err(ServiceError::Other(SCRIPT_EXHAUSTED.to_string())))
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
