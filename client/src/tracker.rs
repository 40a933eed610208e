// client/src/tracker.rs
//! Follows a submitted transaction until the BFF reports it confirmed or
//! failed, or the polling budget runs out.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

use common::{TrackTxRequest, TrackedTransaction, TrackerConfig, TxKind, TxStatusResponse};

use crate::api::ApiClient;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&TrackerConfig::default())
    }
}

impl From<&TrackerConfig> for PollPolicy {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            max_attempts: config.max_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome<T> {
    /// Last probed value; `None` only when the budget allowed no attempts
    pub value: Option<T>,
    pub attempts: u32,
    /// Budget ran out before a terminal value was seen
    pub exhausted: bool,
}

/// Sleep, probe, repeat until `is_terminal` accepts a value or the attempt
/// budget is spent. Probe errors end the loop immediately.
pub async fn poll_until<T, E, F, Fut, P>(policy: &PollPolicy, mut probe: F, is_terminal: P) -> Result<PollOutcome<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    let mut value = None;

    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;
        let current = probe(attempt).await?;
        let done = is_terminal(&current);
        value = Some(current);

        if done {
            return Ok(PollOutcome {
                value,
                attempts: attempt,
                exhausted: false,
            });
        }
    }

    Ok(PollOutcome {
        value,
        attempts: policy.max_attempts,
        exhausted: true,
    })
}

fn apply(tracked: &mut TrackedTransaction, status: TxStatusResponse) {
    tracked.kind = status.kind;
    tracked.status = status.status;
    tracked.confirmed_round = status.confirmed_round.or(tracked.confirmed_round);
}

#[derive(Clone)]
pub struct TxTracker {
    api: ApiClient,
    policy: PollPolicy,
}

impl TxTracker {
    pub fn new(api: ApiClient, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub async fn track(&self, tx_id: &str, kind: TxKind) -> Result<TrackedTransaction> {
        self.track_with(TrackTxRequest::new(tx_id, kind)).await
    }

    /// Register the transaction, then poll its status. Running out of
    /// attempts is not an error: the result carries `timed_out`.
    pub async fn track_with(&self, request: TrackTxRequest) -> Result<TrackedTransaction> {
        let tx_id = request.tx_id.clone();
        let mut tracked = TrackedTransaction::pending(&tx_id, request.kind);

        let registered = self.api.register_tx(&request).await?;
        tracing::info!("Tracking {} transaction {}", request.kind, tx_id);
        apply(&mut tracked, registered);
        if tracked.status.is_terminal() {
            tracing::info!("{}", tracked.summary());
            return Ok(tracked);
        }

        let outcome = poll_until(
            &self.policy,
            |attempt| {
                let api = self.api.clone();
                let tx_id = tx_id.clone();
                async move {
                    tracing::debug!("Polling {} (attempt {})", tx_id, attempt);
                    api.tx_status(&tx_id).await
                }
            },
            |status: &TxStatusResponse| status.status.is_terminal(),
        )
        .await?;

        if let Some(status) = outcome.value {
            apply(&mut tracked, status);
        }
        tracked.attempts = outcome.attempts;
        tracked.timed_out = outcome.exhausted;

        if tracked.timed_out {
            tracing::warn!("{} after {} attempts", tracked.summary(), tracked.attempts);
        } else if tracked.is_confirmed() {
            tracing::info!("{}", tracked.summary());
        } else {
            tracing::error!("{}", tracked.summary());
        }
        Ok(tracked)
    }

    /// Track on a separate task. Dropping the handle leaves the loop to
    /// finish within its attempt budget; abort it to stop polling early.
    pub fn spawn(&self, request: TrackTxRequest) -> JoinHandle<Result<TrackedTransaction>> {
        let tracker = self.clone();
        tokio::spawn(async move { tracker.track_with(request).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use common::TxState;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    const TX: &str = "TXID42";

    fn tracker(transport: ScriptedTransport) -> (Arc<ScriptedTransport>, TxTracker) {
        let transport = Arc::new(transport);
        let api = ApiClient::new("http://bff.test", transport.clone(), Arc::new(|| Some("tok".to_string()))).unwrap();
        (transport, TxTracker::new(api, PollPolicy::default()))
    }

    fn status_body(status: &str, round: Option<u64>) -> String {
        serde_json::json!({
            "tx_id": TX,
            "kind": "vote",
            "status": status,
            "confirmed_round": round,
        })
        .to_string()
    }

    // pending for `pending_reads` status reads, then `last`
    fn scripted(pending_reads: u32, last: &'static str) -> ScriptedTransport {
        let reads = AtomicU32::new(0);
        ScriptedTransport::with_responder(move |req| {
            if req.url.ends_with("/tx/track") {
                return (200, status_body("pending", None));
            }
            let n = reads.fetch_add(1, Ordering::SeqCst);
            if n < pending_reads {
                (200, status_body("pending", None))
            } else {
                (200, status_body(last, Some(1234)))
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_after_pending_polls() {
        let (transport, tracker) = tracker(scripted(3, "confirmed"));
        let started = tokio::time::Instant::now();

        let tracked = tracker.track(TX, TxKind::Vote).await.unwrap();

        assert_eq!(tracked.status, TxState::Confirmed);
        assert_eq!(tracked.confirmed_round, Some(1234));
        assert_eq!(tracked.attempts, 4);
        assert!(!tracked.timed_out);
        assert_eq!(transport.count_path("/tx/track"), 1);
        assert_eq!(transport.count_path(&format!("/tx/track/{}", TX)), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(8));
        assert_eq!(tracked.summary(), "Transaction confirmed: TXID42 (round 1234)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_stops_polling() {
        let (transport, tracker) = tracker(scripted(0, "failed"));
        let tracked = tracker.track(TX, TxKind::Vote).await.unwrap();

        assert_eq!(tracked.status, TxState::Failed);
        assert_eq!(tracked.attempts, 1);
        assert_eq!(transport.count_path(&format!("/tx/track/{}", TX)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_returns_pending_with_timeout() {
        let (transport, tracker) = tracker(scripted(u32::MAX, "confirmed"));

        let tracked = tracker.track(TX, TxKind::Vote).await.unwrap();

        assert_eq!(tracked.status, TxState::Pending);
        assert!(tracked.timed_out);
        assert_eq!(tracked.attempts, 20);
        assert_eq!(transport.count_path(&format!("/tx/track/{}", TX)), 20);
        assert_eq!(tracked.summary(), "Transaction still pending: TXID42");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_propagate() {
        let transport = ScriptedTransport::new();
        transport.push(200, &status_body("pending", None));
        transport.push(503, r#"{"detail":"indexer unavailable"}"#);
        let (_, tracker) = tracker(transport);

        let err = tracker.track(TX, TxKind::Vote).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_tracking_runs_independently() {
        let (_, tracker) = tracker(scripted(1, "confirmed"));
        let request = TrackTxRequest::new(TX, TxKind::Checkin).for_checkin(7, "CS101", "STUDENT");

        let tracked = tracker.spawn(request).await.unwrap().unwrap();
        assert!(tracked.is_confirmed());
        assert_eq!(tracked.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_with_zero_budget() {
        let policy = PollPolicy {
            interval: Duration::from_millis(10),
            max_attempts: 0,
        };
        let outcome = poll_until(&policy, |_| async { Ok::<_, ()>(1) }, |_| true).await.unwrap();
        assert_eq!(
            outcome,
            PollOutcome {
                value: None,
                attempts: 0,
                exhausted: true
            }
        );
    }
}
