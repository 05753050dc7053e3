//! Polling delivery worker.
//!
//! Once a minute the worker claims a bounded batch of due messages with
//! `FOR UPDATE SKIP LOCKED`, fans the HTTP sends out concurrently, and
//! records each outcome on the claiming transaction before committing.
//! Database-level row locking is the only cross-process coordination;
//! multiple worker instances can run side by side without double delivery.
//!
//! The poll step is guarded by a linear resilience retry for transient
//! database failures. Per-message delivery failures never abort the batch
//! or the loop; they are recorded on the row and rescheduled per the
//! backoff table until the schedule is exhausted.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use trs_db::{DueWebhookMessage, WebhookMessage};

use crate::backoff;
use crate::error::WebhookError;
use crate::sender::WebhookSender;

/// Failures with at least this many prior attempts log at `error`.
const ERROR_LOG_THRESHOLD: usize = 5;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often to poll for due messages.
    pub poll_interval: Duration,

    /// Maximum messages dispatched per tick. One extra row is claimed to
    /// detect whether more work remains.
    pub batch_size: usize,

    /// Attempts for the outer resilience retry around the poll step.
    pub poll_retry_attempts: u32,

    /// Delay between outer resilience retries.
    pub poll_retry_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            batch_size: 20,
            poll_retry_attempts: 10,
            poll_retry_delay: Duration::from_secs(30),
        }
    }
}

/// Result of processing one claimed batch.
#[derive(Debug)]
struct BatchOutcome {
    /// An extra claimed row indicated more due messages remain.
    more_records: bool,
    /// Soonest rescheduled retry among this batch's failures.
    earliest_retry: Option<DateTime<Utc>>,
}

/// Background worker delivering due webhook messages.
pub struct DeliveryWorker {
    pool: PgPool,
    sender: Arc<WebhookSender>,
    config: WorkerConfig,
    cancel: CancellationToken,
}

impl DeliveryWorker {
    /// Create a new worker.
    #[must_use]
    pub fn new(
        pool: PgPool,
        sender: WebhookSender,
        config: WorkerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pool,
            sender: Arc::new(sender),
            config,
            cancel,
        }
    }

    /// Run the delivery loop until cancelled.
    pub async fn run(self) {
        info!(
            target: "webhook_delivery",
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            "Delivery worker started"
        );

        let mut tick = tokio::time::interval(self.config.poll_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    info!(target: "webhook_delivery", "Delivery worker shutting down");
                    break;
                }
                _ = tick.tick() => {}
            }

            // Keep polling within the tick while work remains or a retry is
            // due before the next tick would fire.
            loop {
                let outcome = match self.process_batch_with_retry().await {
                    Ok(o) => o,
                    Err(e) => {
                        error!(
                            target: "webhook_delivery",
                            error = %e,
                            "Polling failed after exhausting resilience retries"
                        );
                        break;
                    }
                };

                if self.cancel.is_cancelled() {
                    break;
                }

                match next_poll_delay(&outcome, self.config.poll_interval, Utc::now()) {
                    Some(delay) if delay.is_zero() => continue,
                    Some(delay) => {
                        tokio::select! {
                            () = self.cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => continue,
                        }
                    }
                    None => break,
                }
            }

            if self.cancel.is_cancelled() {
                info!(target: "webhook_delivery", "Delivery worker shutting down");
                break;
            }
        }

        info!(target: "webhook_delivery", "Delivery worker stopped");
    }

    /// Process one batch, retrying transient poll failures linearly.
    async fn process_batch_with_retry(&self) -> Result<BatchOutcome, WebhookError> {
        let mut attempt = 1;
        loop {
            match self.process_batch().await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt < self.config.poll_retry_attempts => {
                    warn!(
                        target: "webhook_delivery",
                        error = %e,
                        attempt,
                        "Batch poll failed; retrying"
                    );
                    attempt += 1;
                    tokio::select! {
                        () = self.cancel.cancelled() => return Err(e),
                        () = tokio::time::sleep(self.config.poll_retry_delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Claim and process one batch of due messages.
    ///
    /// The claiming transaction stays open across the concurrent fan-out so
    /// the `FOR UPDATE` locks hold until every row's outcome is written;
    /// all updates commit together.
    async fn process_batch(&self) -> Result<BatchOutcome, WebhookError> {
        let mut tx = self.pool.begin().await?;

        let claim_limit = (self.config.batch_size + 1) as i64;
        let mut claimed = WebhookMessage::claim_due(&mut tx, claim_limit).await?;

        let more_records = claimed.len() > self.config.batch_size;
        claimed.truncate(self.config.batch_size);

        if claimed.is_empty() {
            tx.commit().await?;
            return Ok(BatchOutcome {
                more_records: false,
                earliest_retry: None,
            });
        }

        debug!(
            target: "webhook_delivery",
            count = claimed.len(),
            more_records,
            "Claimed due webhook messages"
        );

        let sends = claimed.into_iter().map(|message| {
            let sender = self.sender.clone();
            let cancel = self.cancel.clone();
            async move {
                let outcome = attempt_send(&sender, &message, &cancel).await;
                (message, outcome)
            }
        });
        let results = join_all(sends).await;

        let mut earliest_retry: Option<DateTime<Utc>> = None;

        for (message, outcome) in results {
            let Some((attempted_at, result)) = outcome else {
                debug!(
                    target: "webhook_delivery",
                    message_id = %message.id,
                    "Send cancelled by shutdown; message stays due"
                );
                continue;
            };
            match result {
                Ok(()) => {
                    info!(
                        target: "webhook_delivery",
                        message_id = %message.id,
                        endpoint_id = %message.webhook_endpoint_id,
                        cloud_event_id = %message.cloud_event_id,
                        cloud_event_type = %message.cloud_event_type,
                        attempt_number = message.delivery_attempts.len() + 1,
                        "Webhook message delivered"
                    );
                    WebhookMessage::mark_delivered(&mut *tx, message.id, attempted_at).await?;
                }
                Err(e) => {
                    let prior_attempts = message.delivery_attempts.len();
                    let attempt_number = prior_attempts + 1;
                    let next = backoff::next_delivery_attempt(attempt_number, attempted_at);

                    if prior_attempts < ERROR_LOG_THRESHOLD {
                        warn!(
                            target: "webhook_delivery",
                            message_id = %message.id,
                            endpoint_id = %message.webhook_endpoint_id,
                            error = %e,
                            attempt_number,
                            has_next_retry = next.is_some(),
                            "Webhook delivery failed"
                        );
                    } else {
                        error!(
                            target: "webhook_delivery",
                            message_id = %message.id,
                            endpoint_id = %message.webhook_endpoint_id,
                            error = %e,
                            attempt_number,
                            has_next_retry = next.is_some(),
                            "Webhook delivery failed"
                        );
                    }

                    if next.is_none() {
                        error!(
                            target: "webhook_delivery",
                            message_id = %message.id,
                            endpoint_id = %message.webhook_endpoint_id,
                            attempt_number,
                            "Retry schedule exhausted; abandoning message"
                        );
                    }

                    if let Some(at) = next {
                        earliest_retry = Some(match earliest_retry {
                            Some(current) => current.min(at),
                            None => at,
                        });
                    }

                    WebhookMessage::mark_failed(
                        &mut *tx,
                        message.id,
                        attempted_at,
                        &e.to_string(),
                        next,
                    )
                    .await?;
                }
            }
        }

        tx.commit().await?;

        Ok(BatchOutcome {
            more_records,
            earliest_retry,
        })
    }
}

/// Race one send against shutdown.
///
/// Returns `None` when cancellation wins; the row is then left untouched,
/// so it stays due and is picked up by the next poller. A row without an
/// attempt recorded can at worst be delivered again, never lost.
async fn attempt_send(
    sender: &WebhookSender,
    message: &DueWebhookMessage,
    cancel: &CancellationToken,
) -> Option<(DateTime<Utc>, Result<(), WebhookError>)> {
    let attempted_at = Utc::now();
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        result = sender.send(message) => Some((attempted_at, result)),
    }
}

/// Decide how soon to poll again after a batch.
///
/// `Some(ZERO)` means more due work remains, poll immediately. `Some(d)`
/// means a rescheduled retry falls before the next tick would fire, so wait
/// `d` and poll again rather than letting it sit a full interval. `None`
/// means wait for the regular tick.
fn next_poll_delay(
    outcome: &BatchOutcome,
    poll_interval: Duration,
    now: DateTime<Utc>,
) -> Option<Duration> {
    if outcome.more_records {
        return Some(Duration::ZERO);
    }

    let at = outcome.earliest_retry?;
    let wait = (at - now).to_std().unwrap_or(Duration::ZERO);
    (wait < poll_interval).then_some(wait)
}
