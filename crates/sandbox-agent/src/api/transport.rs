//! Resilient transport: keep calling the model service until it answers.
//!
//! [`ResilientTransport::send`] never reports a service error to its caller.
//! Failures are classified by [`Backoff`](super::retry::Backoff), announced
//! through [`AgentEvent::RetryScheduled`], and retried after the chosen
//! wait. The only way out without a model turn is the cancellation token,
//! which is observed both while the call is in flight and while sleeping.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::retry::RetryConfig;
use super::{GenerateRequest, ModelService};
use crate::ModelTurn;
use crate::agent::events::{AgentEvent, EventHandler};

/// The caller cancelled the token before the service answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("request cancelled")]
pub struct Cancelled;

/// A model service wrapped with unbounded retry.
pub struct ResilientTransport<'a> {
    service: &'a dyn ModelService,
    retry: RetryConfig,
    events: &'a dyn EventHandler,
}

impl<'a> ResilientTransport<'a> {
    pub fn new(
        service: &'a dyn ModelService,
        retry: RetryConfig,
        events: &'a dyn EventHandler,
    ) -> Self {
        Self {
            service,
            retry,
            events,
        }
    }

    /// Send `request` until the service returns a turn.
    ///
    /// Backoff state is local to this call; the next `send` starts again at
    /// the initial delay.
    pub async fn send(
        &self,
        request: GenerateRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<ModelTurn, Cancelled> {
        let mut backoff = self.retry.backoff();
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
            attempt = attempt.saturating_add(1);
            debug!(
                "Model call attempt {attempt} ({} turns in conversation)",
                request.conversation.len()
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Cancelled),
                result = self.service.generate(request) => result,
            };
            let error = match result {
                Ok(turn) => return Ok(turn),
                Err(e) => e,
            };

            let delay = backoff.delay_for(&error);
            self.events.on_event(&AgentEvent::RetryScheduled {
                attempt,
                wait: delay.wait,
                cause: delay.cause,
                error: &error,
            });

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Cancelled),
                _ = tokio::time::sleep(delay.wait) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Turn;
    use crate::agent::events::{FnEventHandler, NoopHandler};
    use crate::api::retry::RetryCause;
    use crate::api::{ScriptedService, ServiceError};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    fn quota(retry_after: Option<u64>) -> ServiceError {
        ServiceError::ResourceExhausted {
            message: "RESOURCE_EXHAUSTED".into(),
            retry_after: retry_after.map(Duration::from_secs),
        }
    }

    type Notices = Arc<Mutex<Vec<(u32, u64, RetryCause)>>>;

    fn recorder() -> (Notices, FnEventHandler<impl Fn(&AgentEvent<'_>) + Send + Sync>) {
        let notices: Notices = Arc::default();
        let sink = notices.clone();
        let handler = FnEventHandler::new(move |event| {
            if let AgentEvent::RetryScheduled {
                attempt,
                wait,
                cause,
                ..
            } = event
            {
                sink.lock().unwrap().push((*attempt, wait.as_secs(), *cause));
            }
        });
        (notices, handler)
    }

    fn task() -> Vec<Turn> {
        vec![Turn::Task("do it".into())]
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_returns_immediately() {
        let service = ScriptedService::new().then_text("hi");
        let transport = ResilientTransport::new(&service, RetryConfig::default(), &NoopHandler);
        let conversation = task();
        let start = Instant::now();

        let turn = transport
            .send(GenerateRequest::new(&conversation, &[]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(turn, ModelTurn::text("hi"));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(service.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_errors_back_off_exponentially() {
        let service = ScriptedService::new()
            .then_error(quota(None))
            .then_error(quota(None))
            .then_error(quota(None))
            .then_text("finally");
        let (notices, handler) = recorder();
        let transport = ResilientTransport::new(&service, RetryConfig::default(), &handler);
        let conversation = task();
        let start = Instant::now();

        let turn = transport
            .send(GenerateRequest::new(&conversation, &[]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(turn.texts(), vec!["finally"]);
        assert_eq!(start.elapsed(), Duration::from_secs(5 + 8 + 13));
        assert_eq!(
            *notices.lock().unwrap(),
            vec![
                (1, 5, RetryCause::QuotaExceeded),
                (2, 8, RetryCause::QuotaExceeded),
                (3, 13, RetryCause::QuotaExceeded),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn server_delay_wins_and_keeps_backoff() {
        let service = ScriptedService::new()
            .then_error(quota(Some(34)))
            .then_error(quota(None))
            .then_text("ok");
        let (notices, handler) = recorder();
        let transport = ResilientTransport::new(&service, RetryConfig::default(), &handler);
        let conversation = task();
        let start = Instant::now();

        transport
            .send(GenerateRequest::new(&conversation, &[]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(34 + 5));
        let waits: Vec<u64> = notices.lock().unwrap().iter().map(|n| n.1).collect();
        assert_eq!(waits, vec![34, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_wait_fixed_delay() {
        let service = ScriptedService::new()
            .then_error(ServiceError::Other("connection reset".into()))
            .then_error(ServiceError::Other("HTTP 500".into()))
            .then_text("ok");
        let (notices, handler) = recorder();
        let transport = ResilientTransport::new(&service, RetryConfig::default(), &handler);
        let conversation = task();
        let start = Instant::now();

        transport
            .send(GenerateRequest::new(&conversation, &[]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert!(
            notices
                .lock()
                .unwrap()
                .iter()
                .all(|n| n.1 == 10 && n.2 == RetryCause::Unexpected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn every_attempt_sees_the_same_request() {
        let service = ScriptedService::new()
            .then_error(quota(None))
            .then_text("ok");
        let transport = ResilientTransport::new(&service, RetryConfig::default(), &NoopHandler);
        let conversation = task();

        transport
            .send(GenerateRequest::new(&conversation, &[]), &CancellationToken::new())
            .await
            .unwrap();

        let requests = service.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff_sleep() {
        // An empty script fails forever.
        let service = ScriptedService::new();
        let transport = ResilientTransport::new(&service, RetryConfig::default(), &NoopHandler);
        let conversation = task();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            trigger.cancel();
        });
        let start = Instant::now();

        let result = transport
            .send(GenerateRequest::new(&conversation, &[]), &cancel)
            .await;

        assert_eq!(result, Err(Cancelled));
        assert_eq!(start.elapsed(), Duration::from_secs(25));
        assert_eq!(service.call_count(), 3);
    }

    #[tokio::test]
    async fn already_cancelled_token_skips_the_call() {
        let service = ScriptedService::new().then_text("never");
        let transport = ResilientTransport::new(&service, RetryConfig::default(), &NoopHandler);
        let conversation = task();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = transport
            .send(GenerateRequest::new(&conversation, &[]), &cancel)
            .await;

        assert_eq!(result, Err(Cancelled));
        assert_eq!(service.call_count(), 0);
        assert_eq!(service.remaining(), 1);
    }
}
