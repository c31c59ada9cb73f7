//! In-process effect queue and its worker.
//!
//! The queue is a bounded tokio channel. The worker applies each effect,
//! schedules a delayed re-delivery with jittered exponential backoff after a
//! retryable failure, and dead-letters the effect (logs and drops it) once
//! the attempt budget is spent or the failure is permanent.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::domain::ports::{EffectHandler, EffectQueue, EffectQueueError};
use crate::domain::{BackoffJitter, DeferredEffect, RandomJitter, RetryPolicy, Sleeper, TokioSleeper};

/// Default channel capacity.
pub const DEFAULT_EFFECT_QUEUE_CAPACITY: usize = 1024;

/// An effect together with the attempt it is queued for.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEffect {
    pub effect: DeferredEffect,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Producer side of the effect channel.
#[derive(Debug, Clone)]
pub struct TokioEffectQueue {
    sender: mpsc::Sender<QueuedEffect>,
}

/// Consumer side handed to an [`EffectWorker`].
#[derive(Debug)]
pub struct EffectReceiver {
    receiver: mpsc::Receiver<QueuedEffect>,
    retries: mpsc::WeakSender<QueuedEffect>,
}

impl TokioEffectQueue {
    /// Create a queue holding at most `capacity` pending effects.
    ///
    /// Producers wait for room once the queue is full.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, EffectReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let retries = sender.downgrade();
        (
            Self { sender },
            EffectReceiver { receiver, retries },
        )
    }
}

#[async_trait]
impl EffectQueue for TokioEffectQueue {
    async fn enqueue(&self, effect: DeferredEffect) -> Result<(), EffectQueueError> {
        self.sender
            .send(QueuedEffect { effect, attempt: 1 })
            .await
            .map_err(|_| EffectQueueError::closed())
    }
}

/// Applies queued effects with bounded retries.
pub struct EffectWorker {
    handler: Arc<dyn EffectHandler>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    jitter: Arc<dyn BackoffJitter>,
}

impl EffectWorker {
    /// Create a worker using tokio sleeps and random jitter.
    pub fn new(handler: Arc<dyn EffectHandler>, policy: RetryPolicy) -> Self {
        Self {
            handler,
            policy,
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(RandomJitter),
        }
    }

    /// Replace the sleeping and jitter strategies.
    #[must_use]
    pub fn with_runtime(mut self, sleeper: Arc<dyn Sleeper>, jitter: Arc<dyn BackoffJitter>) -> Self {
        self.sleeper = sleeper;
        self.jitter = jitter;
        self
    }

    /// Run on the current runtime until every producer is gone.
    pub fn spawn(self, receiver: EffectReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }

    /// Drain the channel until every producer is gone.
    pub async fn run(self, mut receiver: EffectReceiver) {
        info!(max_attempts = self.policy.max_attempts(), "effect worker started");
        while let Some(job) = receiver.receiver.recv().await {
            self.process(job, &receiver.retries).await;
        }
        info!("effect worker stopped");
    }

    async fn process(&self, job: QueuedEffect, retries: &mpsc::WeakSender<QueuedEffect>) {
        let user_id = job.effect.user_id();
        let error = match self.handler.apply(&job.effect).await {
            Ok(()) => {
                debug!(user_id = %user_id, attempt = job.attempt, "effect applied");
                return;
            }
            Err(error) => error,
        };

        if error.code().is_client_error() {
            error!(
                user_id = %user_id,
                attempt = job.attempt,
                error = %error,
                "effect failed permanently; dead-lettered"
            );
            return;
        }
        if !self.policy.allows_retry_after(job.attempt) {
            error!(
                user_id = %user_id,
                attempts = job.attempt,
                error = %error,
                effect = ?job.effect,
                "effect exhausted its retries; dead-lettered"
            );
            return;
        }

        let delay = self
            .jitter
            .jittered_delay(self.policy.base_delay(job.attempt));
        debug!(
            user_id = %user_id,
            attempt = job.attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "effect failed; scheduling retry"
        );
        let sleeper = Arc::clone(&self.sleeper);
        let retries = retries.clone();
        let next = QueuedEffect {
            effect: job.effect,
            attempt: job.attempt.saturating_add(1),
        };
        tokio::spawn(async move {
            sleeper.sleep(delay).await;
            let Some(sender) = retries.upgrade() else {
                error!(user_id = %user_id, "effect queue closed before retry; dead-lettered");
                return;
            };
            if sender.send(next).await.is_err() {
                error!(user_id = %user_id, "effect worker gone before retry; dead-lettered");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::MockEffectHandler;
    use crate::domain::{Error, Metadata, NoJitter, UserId};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().expect("delays mutex").push(duration);
        }
    }

    fn grant() -> DeferredEffect {
        DeferredEffect::GrantXp {
            user_id: UserId::random(),
            event_type: "badge_unlocked".to_owned(),
            amount: 25,
            metadata: Metadata::new(),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(200), Duration::from_secs(5))
    }

    /// Handler reporting each attempt on a channel.
    fn reporting_handler(
        outcomes: Vec<Result<(), Error>>,
    ) -> (MockEffectHandler, mpsc::UnboundedReceiver<usize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let outcomes = Mutex::new(outcomes.into_iter());
        let mut calls = 0;
        let mut handler = MockEffectHandler::new();
        handler.expect_apply().returning(move |_| {
            calls += 1;
            tx.send(calls).expect("report attempt");
            outcomes
                .lock()
                .expect("outcomes mutex")
                .next()
                .unwrap_or(Ok(()))
        });
        (handler, rx)
    }

    async fn attempts_seen(rx: &mut mpsc::UnboundedReceiver<usize>) -> usize {
        let mut seen = 0;
        while let Ok(Some(attempt)) = timeout(Duration::from_millis(200), rx.recv()).await {
            seen = attempt;
        }
        seen
    }

    #[tokio::test]
    async fn retries_with_backoff_until_success() {
        let (handler, mut rx) = reporting_handler(vec![
            Err(Error::transient_store_failure("down")),
            Err(Error::transient_store_failure("down")),
        ]);
        let sleeper = Arc::new(RecordingSleeper::default());
        let (queue, receiver) = TokioEffectQueue::channel(8);
        let worker = EffectWorker::new(Arc::new(handler), policy())
            .with_runtime(sleeper.clone(), Arc::new(NoJitter))
            .spawn(receiver);

        queue.enqueue(grant()).await.expect("enqueued");

        assert_eq!(attempts_seen(&mut rx).await, 3);
        let delays = sleeper.delays.lock().expect("delays mutex").clone();
        assert_eq!(delays, vec![Duration::from_millis(200), Duration::from_millis(400)]);
        drop(queue);
        worker.await.expect("worker stops");
    }

    #[tokio::test]
    async fn dead_letters_after_budget() {
        let (handler, mut rx) = reporting_handler(vec![
            Err(Error::internal("boom")),
            Err(Error::internal("boom")),
            Err(Error::internal("boom")),
            Err(Error::internal("boom")),
        ]);
        let (queue, receiver) = TokioEffectQueue::channel(8);
        let _worker = EffectWorker::new(Arc::new(handler), policy())
            .with_runtime(Arc::new(RecordingSleeper::default()), Arc::new(NoJitter))
            .spawn(receiver);

        queue.enqueue(grant()).await.expect("enqueued");

        assert_eq!(attempts_seen(&mut rx).await, 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (handler, mut rx) =
            reporting_handler(vec![Err(Error::invalid_amount("negative"))]);
        let (queue, receiver) = TokioEffectQueue::channel(8);
        let _worker = EffectWorker::new(Arc::new(handler), policy())
            .with_runtime(Arc::new(RecordingSleeper::default()), Arc::new(NoJitter))
            .spawn(receiver);

        queue.enqueue(grant()).await.expect("enqueued");

        assert_eq!(attempts_seen(&mut rx).await, 1);
    }

    #[tokio::test]
    async fn full_queue_waits_for_room_instead_of_dropping() {
        let (queue, mut receiver) = TokioEffectQueue::channel(1);
        queue.enqueue(grant()).await.expect("first fits");

        let waiting = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.enqueue(grant()).await })
        };
        tokio::task::yield_now().await;
        assert!(!waiting.is_finished(), "second effect should wait for room");

        let first = receiver.receiver.recv().await.expect("first effect");
        assert_eq!(first.attempt, 1);
        timeout(Duration::from_secs(1), waiting)
            .await
            .expect("producer resumes once drained")
            .expect("task joins")
            .expect("second effect accepted");
        assert!(receiver.receiver.recv().await.is_some());
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (queue, receiver) = TokioEffectQueue::channel(1);
        drop(receiver);

        let error = queue.enqueue(grant()).await.expect_err("queue closed");
        assert!(matches!(error, EffectQueueError::Closed));
    }
}
